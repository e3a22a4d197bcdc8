//! Client factory for exchange selection
//!
//! Creates `ExchangeClient` instances from the configured exchange.
//! Uses enum-based dispatch (no `Box<dyn>`) so the session stays generic.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::adapters::binance::{BinanceClient, BinanceConfig};
use crate::adapters::errors::ExchangeResult;
use crate::adapters::hitbtc::{HitBtcClient, HitBtcConfig};
use crate::adapters::traits::ExchangeClient;
use crate::adapters::types::ConnectionState;
use crate::config::{Exchange, TickerOptions};
use crate::core::cache::{SubscriptionSet, TickerCache};
use crate::core::registry::SymbolRegistry;

// =============================================================================
// AnyClient
// =============================================================================

/// Enum wrapping all concrete client types for runtime dispatch.
pub enum AnyClient {
    HitBtc(HitBtcClient),
    Binance(BinanceClient),
}

/// Delegate a trait method to the wrapped client
macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyClient::HitBtc(c) => c.$method($($arg),*),
            AnyClient::Binance(c) => c.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyClient::HitBtc(c) => c.$method($($arg),*).await,
            AnyClient::Binance(c) => c.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl ExchangeClient for AnyClient {
    async fn connect(&mut self) -> ExchangeResult<()> {
        delegate!(await self, connect())
    }

    async fn close(&mut self) -> ExchangeResult<()> {
        delegate!(await self, close())
    }

    async fn get_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>> {
        delegate!(await self, get_symbols())
    }

    async fn subscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        delegate!(await self, subscribe_ticker(symbol))
    }

    async fn unsubscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        delegate!(await self, unsubscribe_ticker(symbol))
    }

    async fn volume_leaders(&self, limit: usize) -> ExchangeResult<Vec<String>> {
        delegate!(await self, volume_leaders(limit))
    }

    fn ticker_cache(&self) -> Arc<TickerCache> {
        delegate!(self, ticker_cache())
    }

    fn subscriptions(&self) -> Arc<SubscriptionSet> {
        delegate!(self, subscriptions())
    }

    fn connection_lost(&self) -> CancellationToken {
        delegate!(self, connection_lost())
    }

    fn connection_failure(&self) -> Option<String> {
        delegate!(self, connection_failure())
    }

    fn connection_state(&self) -> ConnectionState {
        delegate!(self, connection_state())
    }

    fn exchange_name(&self) -> &'static str {
        delegate!(self, exchange_name())
    }
}

// =============================================================================
// Factory Functions
// =============================================================================

/// Create a client for the configured exchange.
///
/// The client is created but NOT connected; call `connect()` after.
pub fn create_client(options: &TickerOptions) -> AnyClient {
    let reply_timeout = options.reply_timeout();
    match options.exchange {
        Exchange::Hitbtc => AnyClient::HitBtc(HitBtcClient::new(HitBtcConfig::from_env(), reply_timeout)),
        Exchange::Binance => {
            AnyClient::Binance(BinanceClient::new(BinanceConfig::from_env(), reply_timeout))
        }
    }
}
