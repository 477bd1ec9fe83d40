//! Fulfillment sync CLI - Split orders and push them to the CRM.
//!
//! # Usage
//!
//! ```bash
//! # Show how an order would be split and numbered
//! fsync plan demos/orders/mixed.yaml
//!
//! # Run the full pipeline against an in-memory CRM
//! fsync simulate demos/orders/mixed.yaml --fail-deal 0001234BZ
//!
//! # Sync an order to Zoho CRM
//! fsync sync demos/orders/mixed.yaml --format json
//!
//! # Verify Zoho credentials
//! fsync check
//! ```
//!
//! # Commands
//!
//! - `plan` - Partition and number an order (no CRM calls)
//! - `simulate` - Full pipeline against an in-memory CRM
//! - `sync` - Full pipeline against Zoho CRM
//! - `check` - Test the Zoho connection
//!
//! Set `LOG_FORMAT=json` for JSON log lines. `RUST_LOG` overrides the
//! default filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::report::OutputFormat;
use commands::sync::SimulationOptions;

#[derive(Parser)]
#[command(name = "fsync")]
#[command(author, version, about = "Order fulfillment splitting and CRM deal sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition an order and allocate order numbers
    Plan {
        /// Order file (YAML, or JSON with a .json extension)
        order: PathBuf,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Process an order against an in-memory CRM
    Simulate {
        /// Order file (YAML, or JSON with a .json extension)
        order: PathBuf,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// SKU already present in the CRM (repeatable)
        #[arg(long = "existing-sku")]
        existing_skus: Vec<String>,

        /// Order number whose deal creation fails (repeatable)
        #[arg(long = "fail-deal")]
        failing_deals: Vec<String>,

        /// SKU whose product lookup fails (repeatable)
        #[arg(long = "fail-sku")]
        failing_skus: Vec<String>,
    },
    /// Process an order against Zoho CRM
    Sync {
        /// Order file (YAML, or JSON with a .json extension)
        order: PathBuf,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Verify Zoho CRM credentials
    Check,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fulfillment_sync=info,fsync=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Plan { order, format } => commands::plan::run(&order, format).await?,
        Commands::Simulate {
            order,
            format,
            existing_skus,
            failing_deals,
            failing_skus,
        } => {
            let options = SimulationOptions {
                existing_skus,
                failing_deals,
                failing_skus,
            };
            commands::sync::simulate(&order, format, options).await?;
        }
        Commands::Sync { order, format } => commands::sync::sync(&order, format).await?,
        Commands::Check => commands::check::run().await?,
    }
    Ok(())
}
