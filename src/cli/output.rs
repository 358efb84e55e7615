//! Console output helpers.
//!
//! All user-facing text goes through these so the command modules stay
//! consistent: a success checkmark, a red cross, dim hints, and a simple
//! two-column key/value rendering with sensitive values masked.

use std::collections::HashMap;

use console::style;

use crate::core::secrets::display_value;

pub fn success(msg: &str) {
    println!("{} {msg}", style("✓").green());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", style("✗").red());
}

pub fn warn(msg: &str) {
    println!("{} {msg}", style("!").yellow());
}

pub fn step(msg: &str) {
    println!("{} {msg}", style("▶").blue());
}

/// Indented follow-up line, usually a command the user should run.
pub fn hint(msg: &str) {
    println!("  {msg}");
}

/// Like [`hint`], but on stderr so it stays with the error it follows.
pub fn error_hint(msg: &str) {
    eprintln!("  {msg}");
}

pub fn dimmed(msg: &str) {
    println!("{}", style(msg).dim());
}

pub fn section(title: &str) {
    println!("{}", style(title).bold());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {value}", style(key).dim());
}

pub fn list_item(item: &str) {
    println!("  {item}");
}

/// Print a secret's key/value pairs sorted by key, masking sensitive values.
pub fn kv_table(title: &str, data: &HashMap<String, String>) {
    section(title);
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    let width = keys.iter().map(|k| k.len()).max().unwrap_or(0);
    for key in keys {
        println!(
            "  {:width$}  {}",
            style(key).green(),
            display_value(key, &data[key.as_str()])
        );
    }
}

/// Same as [`kv_table`] but without masking, for explicit raw output.
pub fn kv_table_raw(title: &str, data: &HashMap<String, String>) {
    section(title);
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    let width = keys.iter().map(|k| k.len()).max().unwrap_or(0);
    for key in keys {
        println!("  {:width$}  {}", style(key).green(), data[key.as_str()]);
    }
}
