/*!
 * Terminal output for the CLI
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::Value;

use crate::query::Record;
use odoo_core_dispatch::QueueStats;

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(false)) => "-".to_string(),
        Some(v) => v.to_string(),
    }
}

/// One row per record, one column per field (`id` first)
pub fn records_table(records: &[Record], fields: &[String]) -> Table {
    let mut columns: Vec<&str> = vec!["id"];
    columns.extend(fields.iter().map(String::as_str).filter(|f| *f != "id"));

    let mut table = create_table();
    table.set_header(
        columns
            .iter()
            .map(|c| Cell::new(c).fg(Color::Cyan).add_attribute(Attribute::Bold)),
    );

    for record in records {
        table.add_row(columns.iter().map(|c| Cell::new(cell_text(record.get(*c)))));
    }

    table
}

/// Key-value table of queue counters
pub fn stats_table(stats: &QueueStats, handshakes: u64) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("Executed", stats.executed.to_string()),
        ("Failed", stats.failed.to_string()),
        ("Queued", stats.queued.to_string()),
        ("Handshakes", handshakes.to_string()),
    ];
    for (key, value) in rows {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(value).add_attribute(Attribute::Bold),
        ]);
    }

    table
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!("{} {}", style("✗ Error:").red(), message);
    if let Some(hint) = suggestion {
        eprintln!("  {} {}", style("→").dim(), style(hint).dim());
    }
}

/// Print a styled success message to stderr, keeping stdout for data
pub fn print_success(message: &str) {
    eprintln!("{} {}", style("✓").green(), style(message).green());
}
