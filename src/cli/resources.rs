use super::{api_error, authorize, ui};
use crate::providers::data_provider::{ListParams, Pagination};
use crate::providers::filter_mapping::{FieldCatalog, FieldKind, Filter, ParseError, Sorter};
use crate::{App, ListArgs};
use anyhow::{Context, Result};
use comfy_table::Cell;
use serde_json::Value;
use tracing::{debug, warn};

const MAX_DEFAULT_COLUMNS: usize = 8;

/// Parses filter expressions. Unknown operators are dropped with a warning,
/// malformed expressions are errors.
pub fn parse_filters(expressions: &[String]) -> Result<Vec<Filter>> {
    let mut filters = Vec::with_capacity(expressions.len());
    for expression in expressions {
        match expression.parse::<Filter>() {
            Ok(filter) => filters.push(filter),
            Err(ParseError::UnknownOperator(op)) => {
                warn!(%expression, operator = %op, "Ignoring filter with unknown operator");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filters)
}

pub fn parse_sorters(expressions: &[String]) -> Result<Vec<Sorter>> {
    expressions
        .iter()
        .map(|s| s.parse::<Sorter>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_body(data: &str) -> Result<Value> {
    serde_json::from_str(data).with_context(|| format!("Invalid JSON payload: {data}"))
}

/// Follows a dotted path such as `indicators.adx` into a record.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, key| value.get(key))
}

fn is_scalar(value: &Value) -> bool {
    !value.is_object() && !value.is_array()
}

fn columns_for(items: &[Value], requested: &[String]) -> Vec<String> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    let mut columns = vec!["id".to_string()];
    if let Some(Value::Object(first)) = items.first() {
        columns.extend(
            first
                .iter()
                .filter(|(key, value)| !key.starts_with('@') && *key != "id" && is_scalar(value))
                .map(|(key, _)| key.clone())
                .take(MAX_DEFAULT_COLUMNS - 1),
        );
    }
    columns
}

fn column_kind(catalog: &FieldCatalog, column: &str) -> FieldKind {
    let field = column.rsplit('.').next().unwrap_or(column);
    catalog.kind(field)
}

fn records_table(items: &[Value], columns: &[String], catalog: &FieldCatalog) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(columns.iter().map(|c| ui::header_cell(c)).collect::<Vec<_>>());
    for item in items {
        table.add_row(
            columns
                .iter()
                .map(|column| {
                    let value = lookup(item, column);
                    match column_kind(catalog, column) {
                        FieldKind::Indicator => ui::indicator_cell(value),
                        _ => ui::value_cell(value),
                    }
                })
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn record_table(record: &Value) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    if let Value::Object(fields) = record {
        for (key, value) in fields {
            let text = if is_scalar(value) {
                ui::value_text(value)
            } else {
                serde_json::to_string_pretty(value).unwrap_or_default()
            };
            table.add_row(vec![Cell::new(key), Cell::new(text)]);
        }
    }
    table
}

fn print_record(resource: &str, record: &Value) {
    let id = record.get("id").map(ui::value_text).unwrap_or_default();
    println!(
        "\n{}",
        ui::style_text(&format!("{resource} {id}"), ui::StyleType::Title)
    );
    println!("{}", record_table(record));
}

pub async fn list(app: &App, args: &ListArgs) -> Result<()> {
    authorize(app, &args.resource).await?;

    let pagination = match (args.page, args.per_page) {
        (None, None) => None,
        (page, per_page) => Some(Pagination {
            current_page: page.unwrap_or(1),
            page_size: per_page.unwrap_or(app.config.list.items_per_page),
        }),
    };
    let params = ListParams {
        filters: parse_filters(&args.filters)?,
        sorters: parse_sorters(&args.sort)?,
        pagination,
    };
    debug!(?params, "List parameters");

    let pb = ui::new_spinner(&format!("Fetching {}", args.resource));
    let result = app.data.get_list(&args.resource, &params).await;
    pb.finish_and_clear();
    let result = result.map_err(|e| api_error(app, e))?;

    if result.data.is_empty() {
        println!("No {} found.", args.resource);
        return Ok(());
    }

    let columns = columns_for(&result.data, &args.columns);
    println!(
        "{}",
        ui::style_text(&args.resource, ui::StyleType::Title)
    );
    println!("{}", records_table(&result.data, &columns, &app.config.filters));

    let page = pagination.map_or(1, |p| p.current_page);
    println!(
        "{}",
        ui::style_text(
            &format!("Showing {} of {} (page {page})", result.data.len(), result.total),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}

pub async fn show(app: &App, resource: &str, ids: &[String]) -> Result<()> {
    authorize(app, resource).await?;

    let records = match ids {
        [id] => vec![app.data.get_one(resource, id).await.map_err(|e| api_error(app, e))?],
        ids => {
            let pb = ui::new_spinner(&format!("Fetching {} {resource}", ids.len()));
            let records = app.data.get_many(resource, ids).await;
            pb.finish_and_clear();
            records.map_err(|e| api_error(app, e))?
        }
    };

    for record in &records {
        print_record(resource, record);
    }
    Ok(())
}

pub async fn create(app: &App, resource: &str, data: &str) -> Result<()> {
    authorize(app, resource).await?;
    let body = parse_body(data)?;
    let record = app
        .data
        .create(resource, body)
        .await
        .map_err(|e| api_error(app, e))?;
    println!("{}", ui::style_text("Created", ui::StyleType::Success));
    print_record(resource, &record);
    Ok(())
}

pub async fn update(app: &App, resource: &str, id: &str, data: &str) -> Result<()> {
    authorize(app, resource).await?;
    let body = parse_body(data)?;
    let record = app
        .data
        .update(resource, id, body)
        .await
        .map_err(|e| api_error(app, e))?;
    println!("{}", ui::style_text("Updated", ui::StyleType::Success));
    print_record(resource, &record);
    Ok(())
}

pub async fn delete(app: &App, resource: &str, id: &str) -> Result<()> {
    authorize(app, resource).await?;
    app.data
        .delete_one(resource, id)
        .await
        .map_err(|e| api_error(app, e))?;
    println!(
        "{} {resource} {id}",
        ui::style_text("Deleted", ui::StyleType::Success)
    );
    Ok(())
}
