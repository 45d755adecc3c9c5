//! Event histogramming daemon (histd)
//!
//! Standalone service that:
//! - Consumes control envelopes from a config topic
//! - Runs one supervised worker per histogramming job
//! - Publishes hs00 histogram snapshots and JSON statistics

use anyhow::Result;
use clap::Parser;
use histd::config::{DEFAULT_CONFIG_TOPIC, DEFAULT_STATUS_TOPIC};
use histd::coordinator::Coordinator;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "histd", version, about = "Event histogramming daemon")]
struct Args {
    /// Broker addresses (e.g. mem://local or file:///var/lib/histd)
    #[arg(
        short,
        long,
        env = "HISTD_BROKERS",
        value_delimiter = ',',
        num_args = 1..,
        required = true
    )]
    brokers: Vec<String>,

    /// Topic carrying JSON control envelopes
    #[arg(long, env = "HISTD_CONFIG_TOPIC", default_value = DEFAULT_CONFIG_TOPIC)]
    config_topic: String,

    /// Topic receiving JSON statistics records
    #[arg(long, env = "HISTD_STATUS_TOPIC", default_value = DEFAULT_STATUS_TOPIC)]
    status_topic: String,

    /// Tracing filter directives, used when RUST_LOG is not set
    #[arg(long, env = "HISTD_LOG_FILTER", default_value = "info,histd=debug")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&args.log_filter)),
        )
        .init();

    info!("Starting event histogramming daemon (histd)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Brokers: {:?}", args.brokers);

    let mut coordinator = Coordinator::new(args.brokers, args.config_topic, args.status_topic);
    coordinator.run().await
}
