//! Translation of list filters and sorters into the bracketed query
//! vocabulary of a Hydra collection endpoint.
//!
//! Every operator maps to a pure function from a resolved field and a value
//! to a list of `(key, value)` pairs. `map_filters` folds those pairs into a
//! [`QueryParams`] map and `build_query_string` serializes it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unsupported filter operator: {0}")]
    UnknownOperator(String),
    #[error("invalid filter expression '{0}', expected field[:operator]=value")]
    InvalidFilter(String),
    #[error("invalid sort expression '{0}', expected field[:asc|desc]")]
    InvalidSorter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    In,
    Contains,
    Between,
    After,
    Before,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Operator::Eq => "eq",
                Operator::Ne => "ne",
                Operator::Lt => "lt",
                Operator::Gt => "gt",
                Operator::Lte => "lte",
                Operator::Gte => "gte",
                Operator::In => "in",
                Operator::Contains => "contains",
                Operator::Between => "between",
                Operator::After => "after",
                Operator::Before => "before",
            }
        )
    }
}

impl FromStr for Operator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "lt" => Ok(Operator::Lt),
            "gt" => Ok(Operator::Gt),
            "lte" => Ok(Operator::Lte),
            "gte" => Ok(Operator::Gte),
            "in" => Ok(Operator::In),
            "contains" => Ok(Operator::Contains),
            "between" => Ok(Operator::Between),
            "after" => Ok(Operator::After),
            "before" => Ok(Operator::Before),
            _ => Err(ParseError::UnknownOperator(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Filter {
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Filter {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }
}

/// Parses `field[:operator]=value`. The operator defaults to `eq`. For `in`
/// and `between` the value is split on commas; other operators keep the raw
/// string, so `visScore=10,50` stays a range string.
impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lhs, raw_value) = s
            .split_once('=')
            .ok_or_else(|| ParseError::InvalidFilter(s.to_string()))?;
        let (field, operator) = match lhs.split_once(':') {
            Some((field, op)) => (field.trim(), op.trim().parse::<Operator>()?),
            None => (lhs.trim(), Operator::Eq),
        };
        if field.is_empty() {
            return Err(ParseError::InvalidFilter(s.to_string()));
        }

        let value = match operator {
            Operator::In | Operator::Between => Value::Array(
                raw_value
                    .split(',')
                    .map(|part| parse_scalar(part.trim()))
                    .collect(),
            ),
            _ => Value::String(raw_value.to_string()),
        };
        Ok(Filter::new(field, operator, value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sorter {
    pub field: String,
    pub order: SortOrder,
}

impl Sorter {
    pub fn new(field: &str, order: SortOrder) -> Self {
        Sorter {
            field: field.to_string(),
            order,
        }
    }
}

impl FromStr for Sorter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = match s.split_once(':') {
            Some((field, "asc")) => (field, SortOrder::Asc),
            Some((field, "desc")) => (field, SortOrder::Desc),
            Some(_) => return Err(ParseError::InvalidSorter(s.to_string())),
            None => (s, SortOrder::Asc),
        };
        if field.is_empty() {
            return Err(ParseError::InvalidSorter(s.to_string()));
        }
        Ok(Sorter::new(field, order))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    /// Sent as `metric[field]`.
    Metric,
    /// Sent as `indicator[field]`.
    Indicator,
    /// Unprefixed, but `eq` carries a `min,max` range.
    Range,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Static membership lists deciding how each filter field is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCatalog {
    pub metric_fields: Vec<String>,
    pub indicator_fields: Vec<String>,
    pub range_fields: Vec<String>,
    pub date_fields: Vec<String>,
    /// Per-field ceiling meaning "no upper bound" (e.g. price 50000 is "50k+").
    pub sentinels: BTreeMap<String, f64>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        FieldCatalog {
            metric_fields: strings(&[
                "visScore",
                "globalStars",
                "zonebourseInvestisseur",
                "fintelScore",
                "zonebourseScore",
                "piotrosBeneishSloanScore",
            ]),
            indicator_fields: strings(&["adx", "atrPercent"]),
            range_fields: strings(&["marketcap", "lassoScore"]),
            date_fields: strings(&["dateEnquiry", "arrival", "departure"]),
            sentinels: [
                ("adults", 30.0),
                ("children", 13.0),
                ("babies", 6.0),
                ("pets", 3.0),
                ("person", 40.0),
                ("price", 50000.0),
                ("duration", 49.0),
                ("flexibility", 35.0),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }
}

impl FieldCatalog {
    pub fn kind(&self, field: &str) -> FieldKind {
        let contains = |list: &[String]| list.iter().any(|f| f == field);
        if contains(&self.metric_fields) {
            FieldKind::Metric
        } else if contains(&self.indicator_fields) {
            FieldKind::Indicator
        } else if contains(&self.range_fields) {
            FieldKind::Range
        } else {
            FieldKind::Plain
        }
    }

    pub fn is_date(&self, field: &str) -> bool {
        self.date_fields.iter().any(|f| f == field)
    }

    pub fn sentinel(&self, field: &str) -> Option<f64> {
        self.sentinels.get(field).copied()
    }

    fn resolve(&self, field: &str) -> ResolvedField {
        let kind = self.kind(field);
        let key = match kind {
            FieldKind::Metric => format!("metric[{field}]"),
            FieldKind::Indicator => format!("indicator[{field}]"),
            FieldKind::Plain | FieldKind::Range => field.to_string(),
        };
        ResolvedField {
            key,
            kind,
            is_date: self.is_date(field),
            sentinel: self.sentinel(field),
        }
    }
}

/// A filter field with its outgoing key prefix already applied.
#[derive(Debug, Clone)]
struct ResolvedField {
    key: String,
    kind: FieldKind,
    is_date: bool,
    sentinel: Option<f64>,
}

impl ResolvedField {
    fn bracket(&self, suffix: &str) -> String {
        format!("{}[{}]", self.key, suffix)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Value),
    /// Serialized as one repeated parameter per element.
    List(Vec<Value>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(Value::String(value.to_string()))
    }
}

pub type QueryParams = BTreeMap<String, ParamValue>;

type Pairs = Vec<(String, ParamValue)>;

impl Operator {
    fn params(self, field: &ResolvedField, value: &Value) -> Pairs {
        match self {
            Operator::Eq => eq_params(field, value),
            Operator::Ne => vec![(field.bracket("not"), scalar(value))],
            Operator::Lt | Operator::Before => comparison_params(field, value, "lt", "before"),
            Operator::Lte => comparison_params(field, value, "lte", "before"),
            Operator::Gt | Operator::After => comparison_params(field, value, "gt", "after"),
            Operator::Gte => comparison_params(field, value, "gte", "after"),
            Operator::In => in_params(field, value),
            Operator::Contains => vec![(field.key.clone(), scalar(value))],
            Operator::Between => between_params(field, value),
        }
    }
}

fn scalar(value: &Value) -> ParamValue {
    ParamValue::Scalar(value.clone())
}

/// Numbers stay numbers, anything else is kept as a string.
fn parse_scalar(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .or_else(|_| raw.parse::<f64>().map(Value::from))
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Numeric reading of a value, accepting numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether an upper bound should be sent, given the field's sentinel ceiling.
fn upper_bound_applies(field: &ResolvedField, max: &Value) -> bool {
    match field.sentinel {
        None => true,
        Some(sentinel) => as_number(max).is_some_and(|m| m < sentinel),
    }
}

fn eq_params(field: &ResolvedField, value: &Value) -> Pairs {
    match field.kind {
        FieldKind::Plain => vec![(field.key.clone(), scalar(value))],
        FieldKind::Metric | FieldKind::Indicator | FieldKind::Range => {
            range_eq_params(field, value)
        }
    }
}

/// `"min,max"` becomes a `[gte]`/`[lte]` pair with empty sides omitted; a
/// bare scalar is a lower bound.
fn range_eq_params(field: &ResolvedField, value: &Value) -> Pairs {
    let Some((min, max)) = value.as_str().and_then(|s| s.split_once(',')) else {
        return vec![(field.bracket("gte"), scalar(value))];
    };

    let mut pairs = Vec::new();
    let (min, max) = (min.trim(), max.trim());
    if !min.is_empty() {
        pairs.push((field.bracket("gte"), ParamValue::Scalar(parse_scalar(min))));
    }
    if !max.is_empty() {
        let max = parse_scalar(max);
        if upper_bound_applies(field, &max) {
            pairs.push((field.bracket("lte"), ParamValue::Scalar(max)));
        }
    }
    pairs
}

fn comparison_params(
    field: &ResolvedField,
    value: &Value,
    suffix: &str,
    date_suffix: &str,
) -> Pairs {
    let suffix = if field.is_date { date_suffix } else { suffix };
    vec![(field.bracket(suffix), scalar(value))]
}

fn in_params(field: &ResolvedField, value: &Value) -> Pairs {
    let values = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    vec![(format!("{}[]", field.key), ParamValue::List(values))]
}

fn between_params(field: &ResolvedField, value: &Value) -> Pairs {
    let [min, max] = match value.as_array().map(Vec::as_slice) {
        Some([min, max]) => [min, max],
        _ => {
            debug!(key = %field.key, "Ignoring between filter without a [min, max] pair");
            return Vec::new();
        }
    };

    if field.is_date {
        return vec![
            (field.bracket("after"), scalar(min)),
            (field.bracket("before"), scalar(max)),
        ];
    }

    let mut pairs = Vec::new();
    if as_number(min).is_some_and(|m| m > 0.0) {
        pairs.push((field.bracket("gte"), scalar(min)));
    }
    if upper_bound_applies(field, max) {
        pairs.push((field.bracket("lte"), scalar(max)));
    }
    pairs
}

/// Fields whose `in` lists accumulate across filters. A scalar `in` value
/// still replaces what was collected so far.
const ACCUMULATING_FIELDS: &[&str] = &["tags"];

pub fn map_filters(filters: &[Filter], catalog: &FieldCatalog) -> QueryParams {
    let mut params = QueryParams::new();

    for filter in filters {
        let field = catalog.resolve(&filter.field);
        let accumulate = filter.operator == Operator::In
            && filter.value.is_array()
            && ACCUMULATING_FIELDS.contains(&filter.field.as_str());

        for (key, value) in filter.operator.params(&field, &filter.value) {
            if accumulate {
                if let (Some(ParamValue::List(existing)), ParamValue::List(values)) =
                    (params.get_mut(&key), &value)
                {
                    existing.extend(values.iter().cloned());
                    continue;
                }
            }
            params.insert(key, value);
        }
    }

    params
}

pub fn map_sorters(sorters: &[Sorter]) -> QueryParams {
    sorters
        .iter()
        .map(|sorter| {
            let field = match sorter.field.as_str() {
                "childs" => "children",
                other => other,
            };
            (
                format!("order[{field}]"),
                ParamValue::from(sorter.order.as_str()),
            )
        })
        .collect()
}

/// String form of a query value; `None` for null.
fn value_to_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        }),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| value_to_param(v).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Serializes `params` as `?k=v&...`, or `""` when nothing is left.
pub fn build_query_string(params: &QueryParams) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut empty = true;

    for (key, value) in params {
        let values: Vec<String> = match value {
            ParamValue::Scalar(Value::Array(items)) | ParamValue::List(items) => {
                items.iter().filter_map(value_to_param).collect()
            }
            ParamValue::Scalar(v) => value_to_param(v).into_iter().collect(),
        };
        for v in values {
            serializer.append_pair(key, &v);
            empty = false;
        }
    }

    if empty {
        String::new()
    } else {
        format!("?{}", serializer.finish())
    }
}
