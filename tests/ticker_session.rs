//! End-to-end session test
//!
//! Runs a full board against a local JSON-RPC WebSocket server speaking the
//! HitBTC dialect: symbol listing, ticker subscription, a live price move,
//! interrupt, and unsubscribe on the way out.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coin_ticker::adapters::hitbtc::{HitBtcClient, HitBtcConfig};
use coin_ticker::adapters::ExchangeClient;
use coin_ticker::config::{HeadingStyle, TickerOptions};
use coin_ticker::core::{StopReason, TerminalSize, TickerSession};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Screen {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Screen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn ticker(symbol: &str, last: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "ticker",
        "params": {
            "ask": last, "bid": last, "last": last, "open": "0.05",
            "low": "0.049", "high": "0.06", "volume": "1500.25", "volumeQuote": "75.1",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "symbol": symbol
        }
    })
}

/// Scripted exchange; returns its URL, the methods it received, and a
/// sender for unsolicited frames
async fn start_exchange() -> (String, mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut source) = ws.split();
        loop {
            tokio::select! {
                Some(frame) = push_rx.recv() => {
                    if sink.send(Message::Text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
                incoming = source.next() => {
                    let Some(Ok(Message::Text(text))) = incoming else { return };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let method = request["method"].as_str().unwrap_or_default().to_string();
                    let _ = seen_tx.send(method.clone());

                    let result = match method.as_str() {
                        "getSymbols" => json!([
                            {"id": "ETHBTC", "baseCurrency": "ETH", "quoteCurrency": "BTC", "tickSize": "0.000001"},
                            {"id": "BTCUSD", "baseCurrency": "BTC", "quoteCurrency": "USD", "tickSize": "0.01"}
                        ]),
                        _ => json!(true),
                    };
                    let mut frames = vec![json!({"jsonrpc": "2.0", "result": result, "id": request["id"]})];
                    if method == "subscribeTicker" {
                        let symbol = request["params"]["symbol"].as_str().unwrap_or_default();
                        frames.push(ticker(symbol, "0.054463"));
                    }
                    for frame in frames {
                        if sink.send(Message::Text(frame.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    (url, seen_rx, push_tx)
}

async fn wait_for(screen: &Screen, needle: &str) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !screen.text().contains(needle) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{needle:?} never painted"));
}

#[tokio::test]
async fn test_hitbtc_board_end_to_end() {
    let (url, mut seen, push) = start_exchange().await;
    let config = HitBtcConfig {
        ws_url: url,
        rest_url: "http://127.0.0.1:1".to_string(),
    };
    let mut client = HitBtcClient::new(config, Duration::from_secs(2));
    client.connect().await.unwrap();

    let options = TickerOptions {
        vol_unit: None,
        heading: HeadingStyle::Slim,
        render_interval_ms: Some(5),
        ..Default::default()
    };
    let terminal = TerminalSize {
        columns: 120,
        rows: 10,
    };
    let screen = Screen::default();
    let shutdown = CancellationToken::new();

    let driver = {
        let (screen, shutdown) = (screen.clone(), shutdown.clone());
        tokio::spawn(async move {
            wait_for(&screen, "0.054463").await;
            push.send(ticker("ETHBTC", "0.061")).unwrap();
            wait_for(&screen, "0.061000").await;
            shutdown.cancel();
        })
    };

    let pairs = vec!["eth_btc".to_string()];
    let summary = TickerSession::new(options, terminal)
        .run(&client, &pairs, screen.clone(), shutdown)
        .await;
    driver.await.unwrap();

    assert_eq!(summary.stop, StopReason::Interrupted);
    assert!(summary.error.is_none(), "{:?}", summary.error);
    assert!(summary.unsubscribe_errors.is_empty());
    assert_eq!(summary.rows, vec!["ETHBTC"]);

    let text = screen.text();
    assert!(text.contains("HitBTC"));
    assert!(text.contains("eth"));
    assert!(text.contains("Vol (base)"));
    assert!(text.contains("1500.25"));

    let mut methods = Vec::new();
    while let Ok(method) = seen.try_recv() {
        methods.push(method);
    }
    assert_eq!(
        methods,
        vec!["getSymbols", "subscribeTicker", "unsubscribeTicker"]
    );
    assert!(client.subscriptions().is_empty());

    client.close().await.unwrap();
}
