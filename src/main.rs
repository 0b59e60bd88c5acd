use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use release_watch::{ConsoleNotifier, Cycle, Notifier, SnapshotSource, TelegramNotifier, WatchConfig};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Announce new theater listings since the last run",
    long_about = None
)]
struct Cli {
    /// Echo messages to the console instead of sending them
    #[arg(long, alias = "testing")]
    dry_run: bool,

    /// TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listing snapshot to read (overrides config)
    #[arg(long)]
    listing: Option<PathBuf>,

    /// Ledger file (overrides config)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RELEASE_WATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "release_watch=debug,info"
        } else {
            "release_watch=info,warn"
        })
    });

    let format = env::var("RELEASE_WATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so dry-run output on stdout stays clean
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = WatchConfig::load(cli.config.as_deref())?;
    if let Some(listing) = cli.listing {
        config.listing_path = listing;
    }
    if let Some(ledger) = cli.ledger {
        config.ledger_path = ledger;
    }

    let cycle = Cycle::from_config(&config)?;
    let source = SnapshotSource::new(&config.listing_path);
    let today = Local::now().date_naive();

    // The delivery handle lives for this cycle only
    let notifier: Box<dyn Notifier> = if cli.dry_run {
        Box::new(ConsoleNotifier)
    } else {
        let (token, channel) = config.telegram_credentials()?;
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Box::new(TelegramNotifier::new(client, &config.telegram.api_base, token, channel))
    };

    let report = cycle.run(&source, notifier.as_ref(), today).await?;

    info!(
        version = release_watch::VERSION,
        new_items = report.new_items,
        messages = report.messages_sent,
        evicted = report.evicted,
        "cycle complete"
    );
    if cli.dry_run {
        println!("Console output for testing completed.");
    }

    Ok(())
}
