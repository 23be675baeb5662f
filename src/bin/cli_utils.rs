use anyhow::{Context, Result};
use mmdb_reader::{DataValue, Database};
use std::path::Path;

/// Every address was found
pub const EXIT_FOUND: u8 = 0;
/// At least one address had no record
pub const EXIT_NOT_FOUND: u8 = 1;
/// The database or an address could not be processed
pub const EXIT_ERROR: u8 = 2;

pub fn open_database(path: &Path) -> Result<Database> {
    Database::from(path)
        .open()
        .with_context(|| format!("Failed to load database: {}", path.display()))
}

/// Split a comma-separated address list, dropping blanks
pub fn split_addresses(input: &str) -> Vec<&str> {
    input
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .collect()
}

/// Indented human-readable rendering of a decoded value
pub fn format_data_value(data: &DataValue, indent: &str) -> String {
    match data {
        DataValue::Map(map) => {
            let mut lines = Vec::new();
            let nested = format!("{}  ", indent);
            for (key, value) in map {
                match value {
                    DataValue::Map(_) | DataValue::Array(_) => {
                        lines.push(format!("{}{}:", indent, key));
                        lines.push(format_data_value(value, &nested));
                    }
                    _ => lines.push(format!("{}{}: {}", indent, key, format_scalar(value))),
                }
            }
            lines.join("\n")
        }
        DataValue::Array(items) => items
            .iter()
            .map(|item| match item {
                DataValue::Map(_) | DataValue::Array(_) => {
                    format!("{}-\n{}", indent, format_data_value(item, &format!("{}  ", indent)))
                }
                _ => format!("{}- {}", indent, format_scalar(item)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => format!("{}{}", indent, format_scalar(other)),
    }
}

fn format_scalar(data: &DataValue) -> String {
    match data {
        DataValue::String(s) => s.clone(),
        DataValue::Double(d) => d.to_string(),
        DataValue::Uint16(n) => n.to_string(),
        DataValue::Uint32(n) => n.to_string(),
        DataValue::Uint128(n) => n.to_string(),
        DataValue::Bool(b) => b.to_string(),
        DataValue::Pointer(offset) => format!("<pointer {}>", offset),
        DataValue::Map(map) => format!("{{{} entries}}", map.len()),
        DataValue::Array(items) => format!("[{} items]", items.len()),
    }
}
