//! Coin ticker entry point
//!
//! 1. Loads options (.env, YAML from TICKER_CONFIG, environment)
//! 2. Connects to the configured exchange
//! 3. Resolves pairs from the command line, topping up with volume leaders
//! 4. Runs the board until Ctrl+C or a fatal condition
//! 5. Unsubscribes, restores the cursor and reports the outcome

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use coin_ticker::adapters::{create_client, ExchangeClient};
use coin_ticker::config::{self, CliArgs};
use coin_ticker::core::{TerminalSize, TickerSession};
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::style::{Attribute, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    let logfile = std::env::var_os("LOGFILE").map(PathBuf::from);
    config::init_logging(logfile.as_deref()).context("failed to initialize logging")?;

    let options = config::load_options()?;
    let args = CliArgs::from_env()?;
    let terminal = TerminalSize::detect().context("failed to read terminal size")?;
    let session = TickerSession::new(options.clone(), terminal);

    let mut client = create_client(&options);
    client.connect().await?;

    let mut pairs = args.pairs.clone();
    let leaders = match args.count {
        Some(count) => Some(count),
        None if pairs.is_empty() => Some(session.max_rows().min(options.show_first)),
        None => None,
    };
    if let Some(count) = leaders {
        pairs.extend(client.volume_leaders(count).await?);
    }
    if pairs.is_empty() {
        anyhow::bail!("Could not determine trading pairs to display");
    }
    info!(exchange = client.exchange_name(), pairs = ?pairs, "Starting ticker");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Interrupt received");
                shutdown_signal.cancel();
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C signal");
            }
        }
    });

    let mut stdout = io::stdout();
    execute!(stdout, Hide)?;
    let summary = session.run(&client, &pairs, io::stdout(), shutdown).await;
    execute!(
        stdout,
        Show,
        SetAttribute(Attribute::Reset),
        Clear(ClearType::UntilNewLine)
    )?;
    writeln!(stdout)?;

    if let Err(e) = client.close().await {
        error!(error = %e, "Failed to close connection");
    }

    info!(stop = ?summary.stop, rows = ?summary.rows, "[SHUTDOWN] Ticker stopped");
    for (symbol, e) in &summary.unsubscribe_errors {
        eprintln!("Failed to unsubscribe {symbol}: {e}");
    }
    match summary.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
