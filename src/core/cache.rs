//! Ticker cache and subscription set
//!
//! The cache maps symbol ids to their latest [`TickerEntry`]. It is written
//! only by [`TickerConsumer`] (plus staleness marking by the watchdog) and read
//! concurrently by the render rows.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapters::rpc::consumer::{Consumer, Dispatch, Handled};
use crate::adapters::types::{TickerEntry, WireFormat};

// =============================================================================
// Ticker cache
// =============================================================================

/// Latest snapshot per symbol
#[derive(Debug, Default)]
pub struct TickerCache {
    entries: RwLock<HashMap<String, TickerEntry>>,
}

impl TickerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot, replacing whatever was there
    pub async fn insert(&self, entry: TickerEntry) {
        self.entries
            .write()
            .await
            .insert(entry.symbol.clone(), entry);
    }

    pub async fn get(&self, symbol: &str) -> Option<TickerEntry> {
        self.entries.read().await.get(symbol).cloned()
    }

    pub async fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.entries.read().await.get(symbol).map(|e| e.last)
    }

    /// Latest prices for several symbols under one read lock
    pub async fn last_prices(&self, symbols: &[String]) -> HashMap<String, Decimal> {
        let entries = self.entries.read().await;
        symbols
            .iter()
            .filter_map(|s| entries.get(s).map(|e| (s.clone(), e.last)))
            .collect()
    }

    /// Null the timestamp of `symbol` if it is older than `cutoff`, keeping its values.
    ///
    /// The age is checked under the write lock, so a snapshot stored after
    /// the caller's read is never marked. Returns true if the entry was marked.
    pub async fn mark_stale(&self, symbol: &str, cutoff: DateTime<Utc>) -> bool {
        match self.entries.write().await.get_mut(symbol) {
            Some(entry) if entry.timestamp.is_some_and(|ts| ts < cutoff) => {
                entry.timestamp = None;
                true
            }
            _ => false,
        }
    }

    pub async fn remove(&self, symbol: &str) -> Option<TickerEntry> {
        self.entries.write().await.remove(symbol)
    }

    /// Whether every symbol in `symbols` has a snapshot
    pub async fn contains_all(&self, symbols: &[String]) -> bool {
        let entries = self.entries.read().await;
        symbols.iter().all(|s| entries.contains_key(s))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =============================================================================
// Subscription set
// =============================================================================

/// Symbols currently subscribed on a connection.
///
/// Uses a blocking lock: every access is a short, synchronous set operation
/// and consumers need to query it from non-async contexts.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    symbols: StdRwLock<BTreeSet<String>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol, returning false if it was already present
    pub fn insert(&self, symbol: &str) -> bool {
        self.symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.to_string())
    }

    pub fn remove(&self, symbol: &str) -> bool {
        self.symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the current set
    pub fn snapshot(&self) -> Vec<String> {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

// =============================================================================
// Ticker notification consumer
// =============================================================================

/// Turns ticker notifications into fresh cache entries
pub struct TickerConsumer {
    wire: &'static WireFormat,
    cache: Arc<TickerCache>,
    subscriptions: Arc<SubscriptionSet>,
}

impl TickerConsumer {
    pub fn new(
        wire: &'static WireFormat,
        cache: Arc<TickerCache>,
        subscriptions: Arc<SubscriptionSet>,
    ) -> Self {
        Self {
            wire,
            cache,
            subscriptions,
        }
    }
}

#[async_trait]
impl Consumer for TickerConsumer {
    fn name(&self) -> &'static str {
        "ticker"
    }

    fn is_idle(&self) -> bool {
        self.subscriptions.is_empty()
    }

    async fn consume(&self, frame: &Value) -> Dispatch {
        let Some(payload) = self.wire.ticker_payload(frame) else {
            return Dispatch::NotHandled;
        };

        let entry = match self.wire.decode_ticker(payload, Utc::now()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(exchange = self.wire.exchange, error = %e, "Discarding ticker notification");
                return Dispatch::NotHandled;
            }
        };

        let symbol = entry.symbol.clone();
        if self.subscriptions.contains(&symbol) {
            self.cache.insert(entry).await;
        } else {
            tracing::trace!(exchange = self.wire.exchange, symbol = %symbol, "Ticker for unsubscribed symbol");
        }
        Dispatch::Handled(Handled::Ticker { symbol })
    }
}
