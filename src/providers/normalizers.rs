//! Adapters from Hydra/JSON-LD payloads to plain records.

use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Last non-empty path segment of an IRI: `"/api/assets/42"` gives `"42"`.
pub fn iri_to_id(iri: &str) -> Option<&str> {
    iri.split('/').rev().find(|segment| !segment.is_empty())
}

fn explicit_id(item: &Record) -> Option<Value> {
    item.get("id").filter(|id| !id.is_null()).cloned()
}

fn id_from_iri(item: &Record) -> Option<Value> {
    item.get("@id")
        .and_then(Value::as_str)
        .and_then(iri_to_id)
        .map(|id| Value::String(id.to_string()))
}

/// Guarantees an `id` on an object payload. An explicit non-null `id` wins
/// over the one parsed from `@id`. Non-object values pass through.
pub fn normalize(item: Value) -> Value {
    match item {
        Value::Object(mut record) => {
            if let Some(id) = explicit_id(&record).or_else(|| id_from_iri(&record)) {
                record.insert("id".to_string(), id);
            }
            Value::Object(record)
        }
        other => other,
    }
}

/// Normalizes an enquiry and decodes its `internalMemo`, which the API
/// ships as a JSON string. Undecodable memos become an empty list.
pub fn process_enquiry_data(item: Value) -> Value {
    let mut normalized = normalize(item);
    let memo = match normalized.get("internalMemo") {
        Some(Value::String(raw)) => {
            Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::Array(Vec::new())))
        }
        _ => None,
    };
    if let (Some(memo), Some(record)) = (memo, normalized.as_object_mut()) {
        record.insert("internalMemo".to_string(), memo);
    }
    normalized
}

fn member_array(data: &Value) -> Option<&Vec<Value>> {
    data.get("member").and_then(Value::as_array)
}

fn bare_array(data: &Value) -> Option<&Vec<Value>> {
    data.as_array()
}

/// `data.member`, else `data` itself when it is an array, else nothing.
pub fn extract_items_from_hydra_response(data: &Value) -> Vec<Value> {
    member_array(data)
        .or_else(|| bare_array(data))
        .cloned()
        .unwrap_or_default()
}

fn count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

/// `data.totalItems` when it is a whole non-negative number, else `fallback`.
///
/// Callers usually pass the page length as the fallback, which under-counts
/// when a paginated response omits `totalItems`.
pub fn extract_total_from_hydra_response(data: &Value, fallback: u64) -> u64 {
    data.get("totalItems").and_then(count).unwrap_or(fallback)
}
