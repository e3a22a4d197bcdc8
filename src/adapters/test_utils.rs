//! Shared test utilities for client testing
//!
//! Provides a scripted local WebSocket server (`MockExchangeServer`), an
//! in-memory `TestMockClient`, and sample symbols and ticker frames in the
//! HitBTC wire format.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::ExchangeClient;
use crate::adapters::types::{percent_change, ConnectionState, Symbol, TickerEntry};
use crate::core::cache::{SubscriptionSet, TickerCache};
use crate::core::registry::SymbolRegistry;

pub use crate::adapters::hitbtc::types::HITBTC_WIRE as TEST_WIRE;

// =============================================================================
// Sample data
// =============================================================================

/// (id, base, quote, tick size)
const SAMPLE_SYMBOLS: &[(&str, &str, &str, &str)] = &[
    ("ETHBTC", "ETH", "BTC", "0.000001"),
    ("BCHBTC", "BCH", "BTC", "0.000001"),
    ("BTCUSD", "BTC", "USD", "0.01"),
    ("BTCUSDT", "BTC", "USDT", "0.01"),
    ("ETHUSD", "ETH", "USD", "0.01"),
    ("BCHUSDT", "BCH", "USDT", "0.01"),
    ("BCHETH", "BCH", "ETH", "0.00001"),
];

/// Registry over BTC, ETH, USD and USDT markets
pub fn sample_registry() -> SymbolRegistry {
    SymbolRegistry::new(SAMPLE_SYMBOLS.iter().map(|(id, base, quote, tick)| Symbol {
        id: id.to_string(),
        base: base.to_string(),
        quote: quote.to_string(),
        tick_size: Decimal::from_str(tick).unwrap(),
    }))
}

/// `getSymbols` result listing the sample symbols
pub fn hitbtc_symbol_listing() -> Value {
    Value::Array(
        SAMPLE_SYMBOLS
            .iter()
            .map(|(id, base, quote, tick)| {
                json!({
                    "id": id,
                    "baseCurrency": base,
                    "quoteCurrency": quote,
                    "quantityIncrement": "0.001",
                    "tickSize": tick,
                    "takeLiquidityRate": "0.001",
                    "provideLiquidityRate": "-0.0001",
                    "feeCurrency": quote
                })
            })
            .collect(),
    )
}

/// Complete HitBTC ticker notification
pub fn ticker_notification(symbol: &str, last: &str, open: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "ticker",
        "params": {
            "ask": last,
            "bid": last,
            "last": last,
            "open": open,
            "low": open,
            "high": last,
            "volume": "1000",
            "volumeQuote": "50",
            "timestamp": Utc::now().to_rfc3339(),
            "symbol": symbol
        }
    })
}

/// Fresh snapshot with every price at `last`
pub fn sample_entry(symbol: &str, last: &str) -> TickerEntry {
    let last = Decimal::from_str(last).unwrap();
    TickerEntry {
        symbol: symbol.to_string(),
        last,
        bid: Some(last),
        ask: Some(last),
        open: last,
        volume_base: Decimal::from(1000),
        volume_quote: Decimal::from(50),
        change: percent_change(last, last),
        exchange_time: None,
        timestamp: Some(Utc::now()),
    }
}

// =============================================================================
// MockExchangeServer
// =============================================================================

type Responder = Arc<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// Local WebSocket server accepting one client.
///
/// Every text frame received is parsed, recorded, then answered with the
/// frames returned by the responder.
pub struct MockExchangeServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Value>,
    stop: CancellationToken,
}

impl MockExchangeServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        let responder: Responder = Arc::new(responder);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, requests) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Value>();
        let stop = CancellationToken::new();
        let token = stop.clone();

        tokio::spawn(async move {
            let stream = tokio::select! {
                _ = token.cancelled() => return,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(_) => return,
                },
            };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let (mut sink, mut source) = ws.split();

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        let _ = sink.close().await;
                        return;
                    }
                    Some(frame) = push_rx.recv() => {
                        if sink.send(Message::Text(frame.to_string())).await.is_err() {
                            return;
                        }
                    }
                    incoming = source.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            let _ = request_tx.send(request.clone());
                            for reply in responder(&request) {
                                if sink.send(Message::Text(reply.to_string())).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Self {
            addr,
            requests,
            push,
            stop,
        }
    }

    /// Replies `{"id", "result": {"method"}}` to every request
    pub async fn start_echo_results() -> Self {
        Self::start(|request: &Value| {
            vec![json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": {"method": request["method"]}
            })]
        })
        .await
    }

    /// Never replies
    pub async fn start_silent() -> Self {
        Self::start(|_: &Value| Vec::new()).await
    }

    /// Rejects every request with the given error
    pub async fn start_rejecting(code: i64, message: &str) -> Self {
        let message = message.to_string();
        Self::start(move |request: &Value| {
            vec![json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": code, "message": message, "description": ""}
            })]
        })
        .await
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send an unsolicited frame to the client
    pub fn push(&self, frame: Value) {
        let _ = self.push.send(frame);
    }

    /// Next request received from the client, waiting up to two seconds
    pub async fn next_request(&mut self) -> Option<Value> {
        tokio::time::timeout(std::time::Duration::from_secs(2), self.requests.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn try_next_request(&mut self) -> Option<Value> {
        self.requests.try_recv().ok()
    }

    /// Close the client connection from the server side
    pub fn disconnect(&self) {
        self.stop.cancel();
    }
}

impl Drop for MockExchangeServer {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

// =============================================================================
// TestMockClient
// =============================================================================

/// In-memory `ExchangeClient`.
///
/// Subscribing seeds the cache with a fresh snapshot (price from `prices`,
/// else 1) unless the symbol is listed in `silent`.
pub struct TestMockClient {
    pub registry: Arc<SymbolRegistry>,
    cache: Arc<TickerCache>,
    subs: Arc<SubscriptionSet>,
    state: ConnectionState,
    lost: CancellationToken,
    failure: Arc<Mutex<Option<String>>>,
    /// Successful subscribe requests
    pub subscribe_calls: Arc<AtomicU32>,
    /// Unsubscribe requests actually sent
    pub unsubscribe_calls: Arc<AtomicU32>,
    /// Subscriptions to these symbols are rejected
    pub failing: HashSet<String>,
    /// Unsubscribing these symbols fails
    pub failing_unsubscribe: HashSet<String>,
    /// Subscribed but never deliver a snapshot
    pub silent: HashSet<String>,
    pub prices: HashMap<String, String>,
    pub leaders: Vec<String>,
}

impl TestMockClient {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(sample_registry()),
            cache: Arc::new(TickerCache::new()),
            subs: Arc::new(SubscriptionSet::new()),
            state: ConnectionState::Disconnected,
            lost: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
            subscribe_calls: Arc::new(AtomicU32::new(0)),
            unsubscribe_calls: Arc::new(AtomicU32::new(0)),
            failing: HashSet::new(),
            failing_unsubscribe: HashSet::new(),
            silent: HashSet::new(),
            prices: HashMap::new(),
            leaders: vec!["ETHBTC".into(), "BTCUSD".into(), "BCHBTC".into()],
        }
    }

    pub fn with_price(mut self, symbol: &str, last: &str) -> Self {
        self.prices.insert(symbol.to_string(), last.to_string());
        self
    }

    /// Simulate the exchange dropping the connection
    pub fn drop_connection(&self, reason: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
        self.lost.cancel();
    }
}

impl Default for TestMockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for TestMockClient {
    async fn connect(&mut self) -> ExchangeResult<()> {
        self.state = ConnectionState::Open;
        Ok(())
    }

    async fn close(&mut self) -> ExchangeResult<()> {
        self.state = ConnectionState::Closed;
        self.lost.cancel();
        Ok(())
    }

    async fn get_symbols(&self) -> ExchangeResult<Arc<SymbolRegistry>> {
        Ok(Arc::clone(&self.registry))
    }

    async fn subscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        if self.failing.contains(symbol) {
            return Err(ExchangeError::UnknownSymbol(symbol.to_string()));
        }
        if !self.subs.insert(symbol) {
            return Ok(());
        }
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.silent.contains(symbol) {
            let last = self.prices.get(symbol).map(String::as_str).unwrap_or("1");
            self.cache.insert(sample_entry(symbol, last)).await;
        }
        Ok(())
    }

    async fn unsubscribe_ticker(&self, symbol: &str) -> ExchangeResult<()> {
        if !self.subs.contains(symbol) {
            return Ok(());
        }
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_unsubscribe.contains(symbol) {
            return Err(ExchangeError::NetworkTimeout(10));
        }
        self.subs.remove(symbol);
        self.cache.remove(symbol).await;
        Ok(())
    }

    async fn volume_leaders(&self, limit: usize) -> ExchangeResult<Vec<String>> {
        Ok(self.leaders.iter().take(limit).cloned().collect())
    }

    fn ticker_cache(&self) -> Arc<TickerCache> {
        Arc::clone(&self.cache)
    }

    fn subscriptions(&self) -> Arc<SubscriptionSet> {
        Arc::clone(&self.subs)
    }

    fn connection_lost(&self) -> CancellationToken {
        self.lost.clone()
    }

    fn connection_failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}
