use anyhow::{Context, Result};
use mmdb_reader::expand;
use std::process::ExitCode;

use crate::cli_utils::EXIT_FOUND;

pub fn cmd_expand(address: String) -> Result<ExitCode> {
    let expanded = expand(address.trim()).with_context(|| format!("Cannot expand: {}", address))?;
    println!("{}", expanded);
    Ok(ExitCode::from(EXIT_FOUND))
}
