use anyhow::{bail, Context, Result};
use mmdb_reader::names::localize_names;
use mmdb_reader::{pack, DataValue};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli_utils::{open_database, split_addresses, EXIT_ERROR, EXIT_FOUND, EXIT_NOT_FOUND};

/// One entry of the JSON output array
#[derive(Serialize)]
struct QueryOutput<'a> {
    address: &'a str,
    network: Option<String>,
    prefix_len: Option<u32>,
    data: Option<DataValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> QueryOutput<'a> {
    fn empty(address: &'a str) -> Self {
        Self {
            address,
            network: None,
            prefix_len: None,
            data: None,
            error: None,
        }
    }
}

pub fn cmd_query(
    database: PathBuf,
    addresses: String,
    lang: Option<String>,
    quiet: bool,
) -> Result<ExitCode> {
    let db = open_database(&database)?;

    let addrs = split_addresses(&addresses);
    if addrs.is_empty() {
        bail!("No addresses given");
    }

    if let Some(lang) = &lang {
        let languages = &db.metadata()?.languages;
        if !languages.is_empty() && !languages.contains(lang) {
            tracing::warn!(
                lang = lang.as_str(),
                available = languages.join(",").as_str(),
                "database does not list this language, falling back to en"
            );
        }
    }

    let mut outputs = Vec::with_capacity(addrs.len());
    let mut all_found = true;
    let mut invalid = false;

    for addr in addrs {
        let packed = match pack(addr) {
            Ok(packed) => packed,
            Err(e) => {
                invalid = true;
                outputs.push(QueryOutput {
                    error: Some(e.to_string()),
                    ..QueryOutput::empty(addr)
                });
                continue;
            }
        };

        let result = db
            .lookup_packed(&packed)
            .with_context(|| format!("Query failed for: {}", addr))?;

        match result {
            Some(result) => {
                let network = result.network(&packed);
                let data = match lang.as_deref() {
                    Some(lang) => localize_names(&result.data, lang),
                    None => result.data,
                };
                outputs.push(QueryOutput {
                    network: Some(network),
                    prefix_len: Some(result.matched_bits),
                    data: Some(data),
                    ..QueryOutput::empty(addr)
                });
            }
            None => {
                all_found = false;
                outputs.push(QueryOutput::empty(addr));
            }
        }
    }

    if !quiet {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    let code = if invalid {
        EXIT_ERROR
    } else if all_found {
        EXIT_FOUND
    } else {
        EXIT_NOT_FOUND
    };
    Ok(ExitCode::from(code))
}
