use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use truenas_ntfy::{config::Config, metrics, relay, sinks::{NotificationSink, StdoutSink}};

#[derive(Parser)]
#[command(author, version, about = "Forward recent TrueNAS alerts to ntfy", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Read variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print the notifications as JSON instead of publishing them
    #[arg(long)]
    dry_run: bool,

    /// Pretty-print dry-run output
    #[arg(long, requires = "dry_run")]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.env_file {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Loaded configuration: {:?}", config);

    metrics::register_metrics();

    let sink: Option<Arc<dyn NotificationSink>> = if cli.dry_run {
        info!("Dry run, notifications will be printed instead of published");
        Some(Arc::new(StdoutSink::new(cli.pretty)))
    } else {
        None
    };

    let result = relay::run_with_sink(&config, sink).await;

    // the run timestamp and fetch failure counter cover failed runs too
    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            error!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    let report = result.context("Relay run failed")?;
    debug!(
        in_scope = report.in_scope,
        delivered = report.delivered,
        failed = report.failed,
        "Run finished"
    );

    Ok(())
}
