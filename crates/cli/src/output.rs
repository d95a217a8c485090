//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    Json,
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Render a list of items as a table
pub fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Render a list of items in the requested format
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table if items.is_empty() => "No items found.".to_string(),
        OutputFormat::Table => table(items).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(items).unwrap_or_default(),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    println!("{}", render_list(items, format));
}

/// Icon for a test result
pub fn result_icon(passed: bool) -> &'static str {
    if passed {
        "✅"
    } else {
        "❌"
    }
}

/// Print the outcome of one test
pub fn print_result(passed: bool, label: &str) {
    if passed {
        println!("{} {} {}", result_icon(true), "PASSED".green().bold(), label);
    } else {
        println!("{} {} {}", result_icon(false), "FAILED".red().bold(), label);
    }
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message.red());
}
