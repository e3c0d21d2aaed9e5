//! Rendering helpers for list and status output.

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

/// Render rows as a compact table, or a dimmed placeholder when empty.
pub fn print_table<R: Tabled>(rows: Vec<R>, empty_message: &str) {
    if rows.is_empty() {
        eprintln!("{}", empty_message.dimmed());
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

/// Print a record as pretty JSON (status subcommands).
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
