//! `inspect` CLI: encode object-graph fixtures and summarize wire payloads.
//!
//! ## Usage
//!
//! ```sh
//! # Shallow-encode a fixture (stdin → stdout)
//! echo '{"a":1,"b":[1,2]}' | inspect encode
//!
//! # Deep-encode from file to file, pretty-printed
//! inspect encode --deep --pretty -i state.json -o state.wire.json
//!
//! # Deep-encode and report discovered stores alongside the payload
//! inspect encode --deep --stores -i app.json
//!
//! # Summarize a wire payload
//! inspect stats -i state.wire.json
//!
//! # More logging on stderr (RUST_LOG overrides)
//! inspect -vv encode --deep -i app.json
//! ```
//!
//! Fixture documents are JSON extended with `$`-directives; see
//! `inspect_core::loader` for the full list.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inspect_core::{Fixture, InspectSession, SnapshotStats};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inspect", version, about = "Live value inspection snapshot CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a fixture document into a wire payload
    Encode {
        /// Input fixture file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Recurse into arrays and objects
        #[arg(long)]
        deep: bool,
        /// Pretty-print the payload
        #[arg(long)]
        pretty: bool,
        /// Intercept `$store` objects and list their handles (deep encodes only)
        #[arg(long)]
        stores: bool,
    },
    /// Show statistics for a wire payload (node count, depth, handles, types)
    Stats {
        /// Input payload file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Encode {
            input,
            output,
            deep,
            pretty,
            stores,
        } => {
            let doc = read_input(input.as_deref())?;
            let fixture = Fixture::parse(&doc).context("Failed to load fixture")?;
            let mut session = InspectSession::new();

            let payload = if stores {
                let mut log = fixture.store_log();
                let encoded = session
                    .encode_with_stores(fixture.root(), deep, &mut log)
                    .context("Failed to encode fixture")?;
                tracing::info!(found = log.found().len(), "store interception finished");
                let handles: Vec<String> = log.handles().iter().map(ToString::to_string).collect();
                let mut envelope = serde_json::Map::new();
                envelope.insert("value".to_string(), serde_json::to_value(&encoded)?);
                envelope.insert("stores".to_string(), handles.into());
                serde_json::Value::Object(envelope)
            } else {
                let encoded = session
                    .encode(fixture.root(), deep)
                    .context("Failed to encode fixture")?;
                serde_json::to_value(&encoded)?
            };
            tracing::info!(handles = session.registry().len(), deep, "encoded fixture");

            let text = if pretty {
                serde_json::to_string_pretty(&payload)?
            } else {
                serde_json::to_string(&payload)?
            };
            write_output(output.as_deref(), &text)?;
        }
        Commands::Stats { input } => {
            let payload = read_input(input.as_deref())?;
            let root = inspect_core::decode(&payload).context("Failed to parse wire payload")?;
            let stats = SnapshotStats::of(&root);
            println!("Nodes:      {}", stats.nodes);
            println!("Max depth:  {}", stats.max_depth);
            println!("Handles:    {}", stats.handles);
            for (tag, count) in &stats.by_type {
                println!("  {:<10} {}", tag, count);
            }
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
