use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Label,
    Success,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Label => style(text).bold(),
        StyleType::Success => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Plain-text rendering of a record field. Strings are unquoted, null is empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.2}"),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Creates a cell for a record field. Numbers are right-aligned, missing values dimmed.
pub fn value_cell(value: Option<&Value>) -> Cell {
    match value {
        None | Some(Value::Null) => Cell::new("N/A").fg(Color::DarkGrey),
        Some(v) if v.is_number() => Cell::new(value_text(v)).set_alignment(CellAlignment::Right),
        Some(v) => Cell::new(value_text(v)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreStyle {
    Highest,
    Higher,
    Lower,
    Lowest,
    Neutral,
}

/// Badge style of a trend-strength indicator, judged on its magnitude.
pub fn adx_style(adx: f64) -> ScoreStyle {
    let strength = adx.abs();
    if strength > 30.0 {
        if adx > 0.0 {
            ScoreStyle::Highest
        } else {
            ScoreStyle::Lowest
        }
    } else if strength > 15.0 {
        if adx > 0.0 {
            ScoreStyle::Higher
        } else {
            ScoreStyle::Lower
        }
    } else {
        ScoreStyle::Neutral
    }
}

pub fn score_cell(text: String, score: ScoreStyle) -> Cell {
    let cell = Cell::new(text).set_alignment(CellAlignment::Right);
    match score {
        ScoreStyle::Highest => cell.fg(Color::Green).add_attribute(Attribute::Bold),
        ScoreStyle::Higher => cell.fg(Color::Green),
        ScoreStyle::Lower => cell.fg(Color::Red),
        ScoreStyle::Lowest => cell.fg(Color::DarkRed).add_attribute(Attribute::Bold),
        ScoreStyle::Neutral => cell,
    }
}

/// Indicator column cell; non-numeric values fall back to [`value_cell`].
pub fn indicator_cell(value: Option<&Value>) -> Cell {
    match value.and_then(Value::as_f64) {
        Some(v) => score_cell(format!("{v:.2}"), adx_style(v)),
        None => value_cell(value),
    }
}

/// Creates a spinner shown while a request is in flight.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
