//! Ticker session orchestration
//!
//! Drives one board from resolved pairs to teardown:
//! canonicalize, check height, subscribe, wait for data, size the columns,
//! print the heading, then run one task per row plus the staleness
//! watchdog until something stops the session. Whatever the stop reason,
//! every symbol subscribed here is unsubscribed before returning, and
//! unsubscribe failures are collected without replacing the stop error.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::errors::ExchangeError;
use crate::adapters::traits::ExchangeClient;
use crate::config::TickerOptions;
use crate::core::conversion::VolumeConverter;
use crate::core::registry::SymbolRegistry;
use crate::core::watchdog::{StalenessPolicy, StalenessWatchdog};
use crate::error::AppError;
use crate::tui::layout::price_decimals;
use crate::tui::{render_heading, Layout, Palette, RowPainter, RowSeed, RowState, TerminalGate};

/// Checks for a first snapshot of every row before giving up
pub const READINESS_TRIES: u32 = 3;
pub const READINESS_DELAY: Duration = Duration::from_secs(1);

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn detect() -> std::io::Result<Self> {
        let (columns, rows) = crossterm::terminal::size()?;
        Ok(Self { columns, rows })
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// User interrupt
    Interrupted,
    StalenessExceeded,
    ConnectionLost,
    /// A row task could not write to the terminal
    RenderFailed,
    /// The board never started
    StartupFailed,
}

/// Outcome of a session, for the caller to report
#[derive(Debug)]
pub struct TickerSummary {
    pub stop: StopReason,
    pub error: Option<AppError>,
    /// Displayed symbols, top row first
    pub rows: Vec<String>,
    pub unsubscribe_errors: Vec<(String, ExchangeError)>,
}

impl TickerSummary {
    fn startup_failed(error: AppError, unsubscribe_errors: Vec<(String, ExchangeError)>) -> Self {
        Self {
            stop: StopReason::StartupFailed,
            error: Some(error),
            rows: Vec::new(),
            unsubscribe_errors,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.unsubscribe_errors.is_empty()
    }
}

// =============================================================================
// Session
// =============================================================================

/// One ticker board over an already connected client
pub struct TickerSession {
    options: TickerOptions,
    terminal: TerminalSize,
    readiness_tries: u32,
    readiness_delay: Duration,
}

impl TickerSession {
    pub fn new(options: TickerOptions, terminal: TerminalSize) -> Self {
        Self {
            options,
            terminal,
            readiness_tries: READINESS_TRIES,
            readiness_delay: READINESS_DELAY,
        }
    }

    pub fn with_readiness(mut self, tries: u32, delay: Duration) -> Self {
        self.readiness_tries = tries;
        self.readiness_delay = delay;
        self
    }

    /// Rows available below the heading
    pub fn max_rows(&self) -> usize {
        usize::from(self.terminal.rows.saturating_sub(self.options.heading.rows()))
    }

    /// Run the board until `shutdown` fires or the session fails
    pub async fn run<C, W>(
        &self,
        client: &C,
        pairs: &[String],
        out: W,
        shutdown: CancellationToken,
    ) -> TickerSummary
    where
        C: ExchangeClient,
        W: Write + Send + 'static,
    {
        let registry = match client.get_symbols().await {
            Ok(registry) => registry,
            Err(e) => return TickerSummary::startup_failed(e.into(), Vec::new()),
        };

        let mut ranked = canonicalize_all(&registry, pairs);
        if ranked.is_empty() {
            return TickerSummary::startup_failed(
                AppError::NoTickerData("no valid trading pairs".into()),
                Vec::new(),
            );
        }
        if ranked.len() > self.max_rows() {
            return TickerSummary::startup_failed(
                AppError::TooManyRows {
                    over: ranked.len() - self.max_rows(),
                },
                Vec::new(),
            );
        }

        let converter = self
            .options
            .volume_unit()
            .map(|unit| VolumeConverter::new(unit, Arc::clone(&registry)));
        let wanted = subscription_list(&registry, &ranked, converter.as_ref());

        // Subscribe
        let mut subscribed = Vec::with_capacity(wanted.len());
        for symbol in &wanted {
            match client.subscribe_ticker(symbol).await {
                Ok(()) => subscribed.push(symbol.clone()),
                Err(e) if e.is_fatal() => {
                    let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
                    return TickerSummary::startup_failed(e.into(), unsubscribe_errors);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "[SESSION] Subscribe failed, dropping symbol");
                    ranked.retain(|s| s != symbol);
                }
            }
        }
        if ranked.is_empty() {
            let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
            return TickerSummary::startup_failed(
                AppError::NoTickerData("every subscription was rejected".into()),
                unsubscribe_errors,
            );
        }

        // Wait for a first snapshot of every row
        let cache = client.ticker_cache();
        let mut ready = false;
        for _ in 0..self.readiness_tries {
            if cache.contains_all(&ranked).await {
                ready = true;
                break;
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.readiness_delay) => {}
            }
        }
        if !ready {
            let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
            let error = if shutdown.is_cancelled() {
                None
            } else {
                Some(AppError::NoTickerData(
                    "problem subscribing to remote service".into(),
                ))
            };
            return TickerSummary {
                stop: if error.is_some() {
                    StopReason::StartupFailed
                } else {
                    StopReason::Interrupted
                },
                error,
                rows: Vec::new(),
                unsubscribe_errors,
            };
        }

        // Seed rows and size columns before anything is printed
        let mut seeds = Vec::with_capacity(ranked.len());
        for id in &ranked {
            let (Some(symbol), Some(entry)) = (registry.get(id), cache.get(id).await) else {
                continue;
            };
            let volume = match &converter {
                Some(c) => c.convert_cached(symbol, entry.volume_quote, &cache).await,
                None => None,
            };
            seeds.push(RowSeed {
                symbol: symbol.clone(),
                entry,
                volume,
            });
        }
        if seeds.is_empty() {
            let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
            return TickerSummary::startup_failed(
                AppError::NoTickerData("no row could be seeded".into()),
                unsubscribe_errors,
            );
        }
        if self.options.vol_sorted && converter.is_some() {
            // Largest on top; unconvertible volumes sink to the bottom
            seeds.sort_by(|a, b| b.volume.cmp(&a.volume));
        }

        let layout = Layout::compute(client.exchange_name(), &seeds, converter.as_ref());
        if let Err(e) = layout.ensure_fits(usize::from(self.terminal.columns)) {
            let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
            return TickerSummary::startup_failed(e, unsubscribe_errors);
        }

        let rows: Vec<String> = seeds.iter().map(|s| s.symbol.id.clone()).collect();
        info!(
            exchange = client.exchange_name(),
            rows = ?rows,
            extra_subscriptions = subscribed.len().saturating_sub(rows.len()),
            width = layout.total_width(),
            "[SESSION] Starting board"
        );

        let palette = Arc::new(Palette::new(self.options.truecolor));
        let gate = TerminalGate::new(out);
        let heading = render_heading(self.options.heading, &layout, &palette, seeds.len());
        if let Err(e) = gate.write_raw(&heading).await {
            let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
            return TickerSummary {
                stop: StopReason::RenderFailed,
                error: Some(e.into()),
                rows,
                unsubscribe_errors,
            };
        }

        // Row tasks and watchdog
        let cancel = CancellationToken::new();
        let layout = Arc::new(layout);
        let interval = self.options.render_interval(seeds.len());
        let pulse_frame = self.options.pulse.frame_duration();
        let threshold = self.options.pulse_threshold();
        let bottom = seeds.len() - 1;

        let mut row_tasks = JoinSet::new();
        for (index, seed) in seeds.into_iter().enumerate() {
            let painter = RowPainter {
                decimals: price_decimals(&seed.symbol, seed.entry.last),
                symbol: seed.symbol,
                offset: u16::try_from(bottom - index).unwrap_or(u16::MAX),
                layout: Arc::clone(&layout),
                palette: Arc::clone(&palette),
                cache: Arc::clone(&cache),
                converter: converter.clone(),
                gate: gate.clone(),
                interval,
                pulse_frame,
                state: RowState::new(threshold),
            };
            row_tasks.spawn(painter.run(cancel.clone()));
        }

        let (kill_tx, mut kill_rx) = oneshot::channel::<AppError>();
        let watchdog = StalenessWatchdog::new(
            StalenessPolicy::from_options(&self.options),
            Arc::clone(&cache),
            client.subscriptions(),
        );
        let watchdog_task = tokio::spawn(watchdog.run(cancel.clone(), move |error| {
            let _ = kill_tx.send(error);
        }));

        let lost = client.connection_lost();
        let (stop, error) = tokio::select! {
            _ = shutdown.cancelled() => (StopReason::Interrupted, None),
            Ok(error) = &mut kill_rx => (StopReason::StalenessExceeded, Some(error)),
            _ = lost.cancelled() => {
                let reason = client
                    .connection_failure()
                    .unwrap_or_else(|| "connection closed".to_string());
                (
                    StopReason::ConnectionLost,
                    Some(AppError::Exchange(ExchangeError::ConnectionFailed(reason))),
                )
            }
            Some(finished) = row_tasks.join_next() => {
                let error = match finished {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(join) => Some(AppError::Io(std::io::Error::other(join.to_string()))),
                };
                (StopReason::RenderFailed, error)
            }
        };
        info!(stop = ?stop, "[SESSION] Stopping board");

        cancel.cancel();
        while let Some(finished) = row_tasks.join_next().await {
            if let Ok(Err(e)) = finished {
                debug!(error = %e, "[SESSION] Row task failed during teardown");
            }
        }
        if let Err(e) = watchdog_task.await {
            debug!(error = %e, "[SESSION] Watchdog task aborted");
        }

        let unsubscribe_errors = unsubscribe_all(client, &subscribed).await;
        TickerSummary {
            stop,
            error,
            rows,
            unsubscribe_errors,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Canonical symbols in request order, unknown and duplicate pairs dropped
fn canonicalize_all(registry: &SymbolRegistry, pairs: &[String]) -> Vec<String> {
    let mut ranked: Vec<String> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match registry.canonicalize(pair) {
            Ok(symbol) if !ranked.contains(&symbol) => ranked.push(symbol),
            Ok(_) => {}
            Err(e) => warn!(pair = %pair, error = %e, "[SESSION] Removing unknown pair"),
        }
    }
    ranked
}

/// Displayed symbols followed by the rates needed for volume conversion
fn subscription_list(
    registry: &SymbolRegistry,
    ranked: &[String],
    converter: Option<&VolumeConverter>,
) -> Vec<String> {
    let mut wanted = ranked.to_vec();
    let Some(converter) = converter else {
        return wanted;
    };

    let mut extra: Vec<String> = registry
        .conversion_pairs(Some(converter.target()))
        .into_iter()
        .collect();
    for id in ranked {
        if let Some(symbol) = registry.get(id) {
            extra.extend(converter.rate_symbols(symbol));
        }
    }
    for id in extra {
        if !wanted.contains(&id) {
            wanted.push(id);
        }
    }
    wanted
}

async fn unsubscribe_all<C: ExchangeClient>(
    client: &C,
    symbols: &[String],
) -> Vec<(String, ExchangeError)> {
    info!(count = symbols.len(), "[SESSION] Unsubscribing");
    let mut errors = Vec::new();
    for symbol in symbols {
        if let Err(e) = client.unsubscribe_ticker(symbol).await {
            warn!(symbol = %symbol, error = %e, "[SESSION] Unsubscribe failed");
            errors.push((symbol.clone(), e));
        }
    }
    errors
}
