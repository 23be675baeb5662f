use anyhow::Result;
use mmdb_reader::DataValue;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli_utils::{format_data_value, open_database, EXIT_FOUND};

/// Keys already shown in the summary
const SUMMARY_KEYS: &[&str] = &[
    "database_type",
    "description",
    "build_epoch",
    "languages",
    "ip_version",
    "node_count",
    "record_size",
    "binary_format_major_version",
    "binary_format_minor_version",
];

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<ExitCode> {
    let db = open_database(&database)?;
    let meta = db.metadata()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&meta.raw)?);
        return Ok(ExitCode::from(EXIT_FOUND));
    }

    println!("Database: {}", database.display());
    println!();
    println!("Metadata:");
    if !meta.database_type.is_empty() {
        println!("  Database type:   {}", meta.database_type);
    }

    if !meta.description.is_empty() {
        println!("  Description:");
        for (lang, desc) in &meta.description {
            println!("    {}: {}", lang, desc);
        }
    }

    println!("  Build date:      {} ({})", meta.build_date(), meta.build_epoch);
    if !meta.languages.is_empty() {
        println!("  Languages:       {}", meta.languages.join(", "));
    }
    println!("  IP version:      {}", meta.ip_version);
    println!("  Node count:      {}", meta.node_count);
    println!("  Record size:     {} bits", meta.record_size.bits());
    println!(
        "  Format version:  {}.{}",
        meta.binary_format_major_version, meta.binary_format_minor_version
    );

    if let DataValue::Map(map) = &meta.raw {
        let extra: indexmap::IndexMap<String, DataValue> = map
            .iter()
            .filter(|(key, _)| !SUMMARY_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !extra.is_empty() {
            println!();
            println!("Other metadata:");
            println!("{}", format_data_value(&DataValue::Map(extra), "  "));
        }
    }

    Ok(ExitCode::from(EXIT_FOUND))
}
