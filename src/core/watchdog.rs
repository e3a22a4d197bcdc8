//! Staleness watchdog
//!
//! Periodically sweeps every subscribed symbol, nulls the timestamp of any
//! cache entry older than the staleness threshold, and fires a one-shot kill
//! callback when the stale fraction crosses the configured ratio.
//!
//! Entries heal on their own: the next notification for a symbol overwrites
//! the whole entry with a fresh timestamp.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TickerOptions;
use crate::core::cache::{SubscriptionSet, TickerCache};
use crate::error::AppError;

// =============================================================================
// Policy
// =============================================================================

/// Thresholds the watchdog enforces
#[derive(Debug, Clone, PartialEq)]
pub struct StalenessPolicy {
    /// Age after which an entry is marked stale
    pub stale_after: Duration,
    /// Time between sweeps
    pub poll_interval: Duration,
    /// Stale fraction that must be exceeded to kill the session
    pub max_stale_ratio: f64,
    /// When false, staleness only dims rows and never kills
    pub strict: bool,
}

impl StalenessPolicy {
    pub fn from_options(options: &TickerOptions) -> Self {
        Self {
            stale_after: options.stale_after(),
            poll_interval: options.poll_interval(),
            max_stale_ratio: options.max_stale,
            strict: options.strict_time,
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    /// Some symbols are stale, but not enough to stop
    Degraded { stale: usize, total: usize },
    Exceeded { stale: usize, total: usize },
}

// =============================================================================
// Watchdog
// =============================================================================

pub struct StalenessWatchdog {
    policy: StalenessPolicy,
    cache: Arc<TickerCache>,
    subscriptions: Arc<SubscriptionSet>,
    stale: BTreeSet<String>,
}

impl StalenessWatchdog {
    pub fn new(
        policy: StalenessPolicy,
        cache: Arc<TickerCache>,
        subscriptions: Arc<SubscriptionSet>,
    ) -> Self {
        Self {
            policy,
            cache,
            subscriptions,
            stale: BTreeSet::new(),
        }
    }

    /// Symbols found stale by the latest sweep
    pub fn stale_symbols(&self) -> &BTreeSet<String> {
        &self.stale
    }

    /// Check every subscribed symbol against `now`
    pub async fn sweep(&mut self, now: DateTime<Utc>) -> Verdict {
        let symbols = self.subscriptions.snapshot();
        let total = symbols.len();
        let max_age = chrono::Duration::from_std(self.policy.stale_after)
            .unwrap_or(chrono::Duration::MAX);

        // No cutoff means nothing can be old enough
        let cutoff = now.checked_sub_signed(max_age);

        self.stale.clear();
        for symbol in symbols {
            let Some(entry) = self.cache.get(&symbol).await else {
                continue;
            };
            let Some(ts) = entry.timestamp else {
                self.stale.insert(symbol);
                continue;
            };
            let Some(cutoff) = cutoff.filter(|cutoff| ts < *cutoff) else {
                continue;
            };
            // A notification may land between the read and the write
            if self.cache.mark_stale(&symbol, cutoff).await {
                debug!(symbol = %symbol, age_ms = (now - ts).num_milliseconds(), "[WATCHDOG] Marked stale");
                self.stale.insert(symbol);
            }
        }

        let stale = self.stale.len();
        if total == 0 || stale == 0 {
            return Verdict::Healthy;
        }
        let ratio = stale as f64 / total as f64;
        if self.policy.strict && ratio > self.policy.max_stale_ratio {
            Verdict::Exceeded { stale, total }
        } else {
            Verdict::Degraded { stale, total }
        }
    }

    /// Sweep every `poll_interval` until cancelled or the ratio is exceeded.
    ///
    /// `kill` runs at most once, with `StalenessExceeded`, and ends the loop.
    pub async fn run<F>(mut self, cancel: CancellationToken, kill: F)
    where
        F: FnOnce(AppError) + Send,
    {
        info!(
            stale_after_ms = self.policy.stale_after.as_millis() as u64,
            poll_interval_ms = self.policy.poll_interval.as_millis() as u64,
            max_ratio = self.policy.max_stale_ratio,
            strict = self.policy.strict,
            "[WATCHDOG] Started"
        );

        let mut interval = tokio::time::interval(self.policy.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("[WATCHDOG] Cancelled");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.sweep(Utc::now()).await {
                Verdict::Healthy => {}
                Verdict::Degraded { stale, total } => {
                    debug!(stale, total, "[WATCHDOG] Some symbols are stale");
                }
                Verdict::Exceeded { stale, total } => {
                    warn!(
                        stale,
                        total,
                        symbols = ?self.stale,
                        "[WATCHDOG] Stale ratio exceeded, stopping"
                    );
                    kill(AppError::StalenessExceeded { stale, total });
                    return;
                }
            }
        }
    }
}
