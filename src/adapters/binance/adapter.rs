//! Binance Client Implementation
//!
//! Symbols and volume ranking come from the REST API; ticker streams are
//! added and removed on a single raw-stream WebSocket with `SUBSCRIBE` /
//! `UNSUBSCRIBE` requests, which reply `{"result": null, "id": n}`.
//!
//! Docs: https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
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

use super::config::BinanceConfig;
use super::types::{
    ticker_stream, ExchangeInfo, RestTicker, BINANCE_WIRE, METHOD_SUBSCRIBE, METHOD_UNSUBSCRIBE,
};

const EXCHANGE_NAME: &str = "Binance";

/// Binance market data client implementing `ExchangeClient`
pub struct BinanceClient {
    config: BinanceConfig,
    connection: RpcConnection,
    http_client: reqwest::Client,
    registry: OnceCell<Arc<SymbolRegistry>>,
}

impl BinanceClient {
    pub fn new(config: BinanceConfig, reply_timeout: std::time::Duration) -> Self {
        let connection = RpcConnection::new(config.ws_url(), &BINANCE_WIRE, reply_timeout);
        Self {
            config,
            connection,
            http_client: create_http_client(EXCHANGE_NAME),
            registry: OnceCell::new(),
        }
    }

    async fn fetch_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>> {
        let info: ExchangeInfo =
            get_json(&self.http_client, &self.config.exchange_info_url()).await?;
        let listed = info.symbols.len();
        let symbols: Vec<_> = info.symbols.iter().filter_map(|s| s.to_symbol()).collect();

        if symbols.is_empty() {
            return Err(ExchangeError::InvalidResponse(
                "exchangeInfo returned no tradable symbols".into(),
            ));
        }
        tracing::info!(
            exchange = EXCHANGE_NAME,
            count = symbols.len(),
            skipped = listed - symbols.len(),
            "Symbols loaded"
        );
        Ok(Arc::new(SymbolRegistry::new(symbols)))
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
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
            .subscribe(symbol, METHOD_SUBSCRIBE, json!([ticker_stream(symbol)]))
            .await
    }

    async fn unsubscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        self.connection
            .unsubscribe(symbol, METHOD_UNSUBSCRIBE, json!([ticker_stream(symbol)]))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::MockExchangeServer;
    use serde_json::Value;
    use std::time::Duration;

    const EXCHANGE_INFO: &str = r#"{
        "timezone": "UTC",
        "symbols": [
            {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.00000100"}]},
            {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.01000000"}]},
            {"symbol": "ETHUSDT", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "USDT",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.01000000"}]},
            {"symbol": "123456", "status": "TRADING", "baseAsset": "123", "quoteAsset": "456",
             "filters": [{"filterType": "PRICE_FILTER", "tickSize": "0.01000000"}]}
        ]
    }"#;

    fn binance_reply(request: &Value) -> Vec<Value> {
        let id = request["id"].clone();
        let mut frames = vec![json!({"result": null, "id": id})];
        if request["method"] == METHOD_SUBSCRIBE {
            let stream = request["params"][0].as_str().unwrap_or_default();
            let symbol = stream.trim_end_matches("@ticker").to_uppercase();
            frames.push(json!({
                "e": "24hrTicker", "E": 1672515782136u64, "s": symbol,
                "o": "0.05", "c": "0.051", "b": "0.0509", "a": "0.0511",
                "v": "1200", "q": "61"
            }));
        }
        frames
    }

    fn client_for(ws_url: String, rest_url: String) -> BinanceClient {
        BinanceClient::new(BinanceConfig { ws_url, rest_url }, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_symbols_from_exchange_info() {
        let mut rest = mockito::Server::new_async().await;
        let mock = rest
            .mock("GET", "/exchangeInfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(EXCHANGE_INFO)
            .expect(1)
            .create_async()
            .await;

        let client = client_for("ws://127.0.0.1:1".into(), rest.url());
        let registry = client.get_symbols().await.unwrap();
        assert_eq!(registry.len(), 3);
        assert!(!registry.markets().contains("456"));
        assert_eq!(client.canonicalize("eth/usd").await.unwrap(), "ETHUSDT");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_volume_leaders_ranked_in_usd() {
        let mut rest = mockito::Server::new_async().await;
        rest.mock("GET", "/exchangeInfo")
            .with_status(200)
            .with_body(EXCHANGE_INFO)
            .create_async()
            .await;
        rest.mock("GET", "/ticker/24hr")
            .with_status(200)
            .with_body(
                r#"[
                    {"symbol": "ETHBTC", "lastPrice": "0.05", "quoteVolume": "200"},
                    {"symbol": "BTCUSDT", "lastPrice": "20000", "quoteVolume": "1000000"},
                    {"symbol": "ETHUSDT", "lastPrice": "1000", "quoteVolume": "5000000"}
                ]"#,
            )
            .create_async()
            .await;

        let client = client_for("ws://127.0.0.1:1".into(), rest.url());
        let leaders = client.volume_leaders(3).await.unwrap();
        // ETHBTC: 200 BTC * 20000 = 4M
        assert_eq!(leaders, vec!["ETHUSDT", "ETHBTC", "BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_subscribe_uses_stream_names() {
        let mut server = MockExchangeServer::start(binance_reply).await;
        let mut client = client_for(server.url(), "http://127.0.0.1:1".into());
        client.connect().await.unwrap();

        client.subscribe_ticker("ETHBTC").await.unwrap();
        let sent = server.next_request().await.unwrap();
        assert_eq!(sent["method"], "SUBSCRIBE");
        assert_eq!(sent["params"], json!(["ethbtc@ticker"]));

        let cache = client.ticker_cache();
        tokio::time::timeout(Duration::from_secs(2), async {
            while cache.get("ETHBTC").await.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        client.unsubscribe_ticker("ETHBTC").await.unwrap();
        assert_eq!(server.next_request().await.unwrap()["method"], "UNSUBSCRIBE");
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_subscribe_maps_error_table() {
        let server = MockExchangeServer::start(|request: &Value| {
            vec![json!({"error": {"code": 2, "msg": "Invalid request: unknown stream"}, "id": request["id"]})]
        })
        .await;
        let mut client = client_for(server.url(), "http://127.0.0.1:1".into());
        client.connect().await.unwrap();

        match client.subscribe_ticker("NOPE").await.unwrap_err() {
            ExchangeError::Remote(remote) => {
                assert_eq!(remote.status, Some(400));
                assert_eq!(remote.message, "Invalid request");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.subscriptions().is_empty());
    }
}
