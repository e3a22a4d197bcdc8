//! Exchange client trait definition
//!
//! `ExchangeClient` is the capability surface the ticker session depends on.
//! Each exchange implements it on top of its own wire table; adding an
//! exchange means adding an implementation, not branching in the core.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::types::ConnectionState;
use crate::core::cache::{SubscriptionSet, TickerCache};
use crate::core::registry::SymbolRegistry;

/// Live ticker feed from one exchange
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Open the streaming connection
    async fn connect(&mut self) -> ExchangeResult<()>;

    /// Close the connection; in-flight requests fail with `ConnectionLost`
    async fn close(&mut self) -> ExchangeResult<()>;

    /// All listed symbols, fetched once on first use
    async fn get_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>>;

    /// Subscribe to ticker notifications for a canonical symbol.
    ///
    /// No-op when already subscribed.
    async fn subscribe_ticker(&self, symbol: &str) -> ExchangeResult<()>;

    /// Unsubscribe a canonical symbol; no-op when not subscribed
    async fn unsubscribe_ticker(&self, symbol: &str) -> ExchangeResult<()>;

    /// Up to `limit` symbols with the highest 24h volume in USD, largest first
    async fn volume_leaders(&self, limit: usize) -> ExchangeResult<Vec<String>>;

    /// Resolve user pair notation to a canonical symbol
    async fn canonicalize(&self, pair: &str) -> ExchangeResult<String> {
        self.get_symbols().await?.canonicalize(pair)
    }

    fn ticker_cache(&self) -> Arc<TickerCache>;

    fn subscriptions(&self) -> Arc<SubscriptionSet>;

    /// Cancelled once the connection's receive loop has ended
    fn connection_lost(&self) -> CancellationToken;

    /// Reason the connection ended on its own, if it did
    fn connection_failure(&self) -> Option<String>;

    fn connection_state(&self) -> ConnectionState;

    fn exchange_name(&self) -> &'static str;
}
