//! Convertly CLI
//!
//! Currency converter backed by cached live exchange rates.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convertly_fx::FxConfig;

mod controller;
mod display;

use controller::ConverterController;

/// Convertly CLI
#[derive(Parser, Debug)]
#[command(name = "convertly")]
#[command(about = "Convert between currencies using cached exchange rates")]
struct Args {
    /// Directory holding the rate cache and session state
    #[arg(long, env = "CONVERTLY_DATA_DIR", default_value = ".convertly", global = true)]
    data_dir: PathBuf,

    /// Currency catalog location (URL or file path)
    #[arg(long, global = true)]
    currencies: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available currencies
    Currencies,

    /// Show the current exchange rates
    Rates {
        /// Bypass a fresh cache and fetch from the provider
        #[arg(long)]
        refresh: bool,

        /// Drop the cached rates before loading
        #[arg(long)]
        clear_cache: bool,
    },

    /// Convert an amount, remembering the selection for next time
    Convert {
        /// Amount to convert (defaults to the last one used)
        amount: Option<String>,

        /// Source currency code
        #[arg(short, long)]
        from: Option<String>,

        /// Target currency code
        #[arg(short, long)]
        to: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Swap the remembered source and target currencies
    Swap,

    /// Keep converting, refreshing rates automatically every five minutes
    Watch,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(args.json_logs);
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let mut config = FxConfig::from_env();
    if let Some(source) = args.currencies.clone() {
        config.currencies_source = source;
    }
    config.validate()?;

    info!(
        data_dir = %args.data_dir.display(),
        currencies = %config.currencies_source,
        cache_key = config.cache_key.as_deref().unwrap_or("<none>"),
        "Starting Convertly"
    );

    let controller = ConverterController::new(config, &args.data_dir)?;

    match args.command {
        Command::Currencies => {
            let catalog = controller.currencies().await;
            display::print_currencies(&catalog);
        }
        Command::Rates {
            refresh,
            clear_cache,
        } => {
            if clear_cache {
                controller.clear_cache()?;
            }
            let report = controller.rates(refresh).await?;
            display::print_report(&report);
            display::print_rates(&report.table);
        }
        Command::Convert {
            amount,
            from,
            to,
            json,
        } => {
            let view = controller.convert(amount, from, to).await?;
            if json {
                display::print_conversion_json(&view)?;
            } else {
                display::print_report(&view.report);
                display::print_conversion(&view);
            }
        }
        Command::Swap => {
            let session = controller.swap().await?;
            display::print_pair(&session);
        }
        Command::Watch => {
            controller.watch().await?;
        }
    }

    Ok(())
}
