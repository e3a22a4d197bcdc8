//! HitBTC Client Implementation
//!
//! JSON-RPC over one WebSocket: symbol listing, currency lookup and ticker
//! subscriptions all go through the request/reply engine. Volume ranking uses
//! the REST 24h ticker listing.
//!
//! Docs: https://api.hitbtc.com

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::rpc::RpcConnection;
use crate::adapters::shared::get_json;
use crate::adapters::traits::ExchangeClient;
use crate::adapters::types::{create_http_client, ConnectionState};
use crate::core::cache::{SubscriptionSet, TickerCache};
use crate::core::ranking::rank_by_volume;
use crate::core::registry::SymbolRegistry;

use super::config::HitBtcConfig;
use super::types::{
    Currency, RestTicker, HITBTC_WIRE, METHOD_GET_CURRENCY, METHOD_GET_SYMBOLS,
    METHOD_SUBSCRIBE_TICKER, METHOD_UNSUBSCRIBE_TICKER,
};

const EXCHANGE_NAME: &str = "HitBTC";

// =============================================================================
// HitBtcClient
// =============================================================================

/// HitBTC market data client implementing `ExchangeClient`
pub struct HitBtcClient {
    config: HitBtcConfig,
    connection: RpcConnection,
    http_client: reqwest::Client,
    registry: OnceCell<Arc<SymbolRegistry>>,
}

impl HitBtcClient {
    pub fn new(config: HitBtcConfig, reply_timeout: std::time::Duration) -> Self {
        let connection = RpcConnection::new(config.ws_url(), &HITBTC_WIRE, reply_timeout);
        Self {
            config,
            connection,
            http_client: create_http_client(EXCHANGE_NAME),
            registry: OnceCell::new(),
        }
    }

    /// Underlying request/reply connection
    pub fn connection(&self) -> &RpcConnection {
        &self.connection
    }

    /// Look up one currency's descriptor
    pub async fn get_currency(&self, currency: &str) -> ExchangeResult<Currency> {
        let result = self
            .connection
            .request(METHOD_GET_CURRENCY, json!({ "currency": currency.to_uppercase() }))
            .await?;
        serde_json::from_value(result).map_err(|e| {
            ExchangeError::InvalidResponse(format!("getCurrency({}): {}", currency, e))
        })
    }

    async fn fetch_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>> {
        let result = self.connection.request(METHOD_GET_SYMBOLS, json!({})).await?;
        let listing = result.as_array().ok_or_else(|| {
            ExchangeError::InvalidResponse("getSymbols result is not an array".into())
        })?;

        let symbols: Vec<_> = listing
            .iter()
            .filter_map(|raw| match HITBTC_WIRE.decode_symbol(raw) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    tracing::warn!(exchange = EXCHANGE_NAME, error = %e, "Skipping malformed symbol");
                    None
                }
            })
            .collect();

        if symbols.is_empty() {
            return Err(ExchangeError::InvalidResponse("getSymbols returned no symbols".into()));
        }
        tracing::info!(exchange = EXCHANGE_NAME, count = symbols.len(), "Symbols loaded");
        Ok(Arc::new(SymbolRegistry::new(symbols)))
    }
}

#[async_trait]
impl ExchangeClient for HitBtcClient {
    async fn connect(&mut self) -> ExchangeResult<()> {
        tracing::info!(exchange = EXCHANGE_NAME, url = %self.config.ws_url(), "Connecting");
        self.connection.connect().await
    }

    async fn close(&mut self) -> ExchangeResult<()> {
        self.connection.close().await
    }

    async fn get_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>> {
        self.registry
            .get_or_try_init(|| self.fetch_symbols())
            .await
            .map(Arc::clone)
    }

    async fn subscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        self.connection
            .subscribe(symbol, METHOD_SUBSCRIBE_TICKER, json!({ "symbol": symbol }))
            .await
    }

    async fn unsubscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        self.connection
            .unsubscribe(symbol, METHOD_UNSUBSCRIBE_TICKER, json!({ "symbol": symbol }))
            .await
    }

    async fn volume_leaders(&self, limit: usize) -> ExchangeResult<Vec<String>> {
        let registry = self.get_symbols().await?;
        let rows: Vec<RestTicker> = get_json(&self.http_client, &self.config.ticker_url()).await?;
        let records: Vec<_> = rows.iter().filter_map(RestTicker::to_volume_record).collect();
        Ok(rank_by_volume(&records, registry, limit))
    }

    fn ticker_cache(&self) -> Arc<TickerCache> {
        self.connection.cache()
    }

    fn subscriptions(&self) -> Arc<SubscriptionSet> {
        self.connection.subscriptions()
    }

    fn connection_lost(&self) -> CancellationToken {
        self.connection.connection_lost()
    }

    fn connection_failure(&self) -> Option<String> {
        self.connection.failure()
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    fn exchange_name(&self) -> &'static str {
        EXCHANGE_NAME
    }
}

/// Result frames for the scripted HitBTC server used in tests
#[cfg(test)]
pub(crate) fn scripted_reply(request: &Value) -> Vec<Value> {
    use crate::adapters::test_utils::{hitbtc_symbol_listing, ticker_notification};

    let id = request["id"].clone();
    match request["method"].as_str() {
        Some(METHOD_GET_SYMBOLS) => vec![json!({"jsonrpc": "2.0", "id": id, "result": hitbtc_symbol_listing()})],
        Some(METHOD_GET_CURRENCY) => vec![json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"id": request["params"]["currency"], "fullName": "Ethereum", "crypto": true}
        })],
        Some(METHOD_SUBSCRIBE_TICKER) => {
            let symbol = request["params"]["symbol"].as_str().unwrap_or_default();
            vec![
                json!({"jsonrpc": "2.0", "id": id, "result": true}),
                ticker_notification(symbol, "100", "99"),
            ]
        }
        _ => vec![json!({"jsonrpc": "2.0", "id": id, "result": true})],
    }
}
