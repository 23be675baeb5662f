mod cli_utils;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::{cmd_expand, cmd_inspect, cmd_query};

#[derive(Parser)]
#[command(name = "mmdb")]
#[command(
    about = "Query MaxMind DB (MMDB) IP databases",
    long_about = "mmdb - Read-only lookups against MaxMind DB files\n\n\
    Looks up IPv4 and IPv6 addresses in GeoIP2, GeoLite2 and other MMDB-format\n\
    databases and prints the matched record as JSON.\n\n\
    Examples:\n\
      mmdb query GeoLite2-Country.mmdb 1.1.1.1\n\
      mmdb query GeoLite2-City.mmdb '1.1.1.1, 2001:db8::1' --lang de\n\
      mmdb inspect GeoLite2-City.mmdb\n\
      mmdb expand 2001:db8::1"
)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more IP addresses
    Query {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Address to look up, or a comma-separated list of addresses
        #[arg(value_name = "ADDRS")]
        addresses: String,

        /// Replace `names` maps with a single `name` in this language
        #[arg(short, long, value_name = "LANG")]
        lang: Option<String>,

        /// Quiet mode - no output, only exit code (0 = all found, 1 = not found, 2 = error)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show database metadata
    Inspect {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Print the raw metadata map as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print an address in fully expanded form
    Expand {
        /// IPv4 or IPv6 address
        #[arg(value_name = "ADDR")]
        address: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Query {
            database,
            addresses,
            lang,
            quiet,
        } => cmd_query(database, addresses, lang, quiet),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Expand { address } => cmd_expand(address),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cli_utils::EXIT_ERROR)
        }
    }
}
