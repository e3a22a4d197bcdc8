//! Request/reply connection over a WebSocket
//!
//! `RpcConnection` owns the transport, the pending request table and the
//! consumer chain. Outbound frames go through an unbounded channel to a writer
//! task so that sending never blocks; a reader task decodes inbound frames and
//! dispatches them through the chain.
//!
//! Lifecycle: Disconnected -> Connecting -> Open -> Draining -> Closed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::rpc::consumer::{Consumer, ConsumerChain, ReplyCorrelator};
use crate::adapters::rpc::pending::PendingRequests;
use crate::adapters::shared::websocket::{connect_tls, TlsWebSocketStream};
use crate::adapters::types::{ConnectionState, WireFormat};
use crate::core::cache::{SubscriptionSet, TickerCache, TickerConsumer};

/// Priority of the ticker notification consumer
pub const TICKER_PRIORITY: u8 = 5;

/// How long `close()` waits for the IO tasks to wind down
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsReader = futures_util::stream::SplitStream<TlsWebSocketStream>;
type WsWriter = futures_util::stream::SplitSink<TlsWebSocketStream, Message>;

/// One exchange connection with request correlation and notification routing
pub struct RpcConnection {
    url: String,
    wire: &'static WireFormat,
    reply_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
    pending: Arc<PendingRequests>,
    consumers: Arc<ConsumerChain>,
    cache: Arc<TickerCache>,
    subscriptions: Arc<SubscriptionSet>,
    ticker_consumer: Arc<TickerConsumer>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    reader_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
    /// Stops the reader on `close()`
    shutdown: CancellationToken,
    /// Cancelled once the receive loop has ended, for whatever reason
    lost: CancellationToken,
    failure: Arc<Mutex<Option<String>>>,
}

impl RpcConnection {
    pub fn new(url: impl Into<String>, wire: &'static WireFormat, reply_timeout: Duration) -> Self {
        let pending = Arc::new(PendingRequests::new());
        let cache = Arc::new(TickerCache::new());
        let subscriptions = Arc::new(SubscriptionSet::new());
        let ticker_consumer = Arc::new(TickerConsumer::new(
            wire,
            Arc::clone(&cache),
            Arc::clone(&subscriptions),
        ));
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            url: url.into(),
            wire,
            reply_timeout,
            state: Arc::new(state),
            consumers: Arc::new(ConsumerChain::new(ReplyCorrelator::new(
                wire,
                Arc::clone(&pending),
            ))),
            pending,
            cache,
            subscriptions,
            ticker_consumer,
            outbound: None,
            reader_handle: None,
            writer_handle: None,
            shutdown: CancellationToken::new(),
            lost: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn cache(&self) -> Arc<TickerCache> {
        Arc::clone(&self.cache)
    }

    pub fn subscriptions(&self) -> Arc<SubscriptionSet> {
        Arc::clone(&self.subscriptions)
    }

    pub fn consumers(&self) -> Arc<ConsumerChain> {
        Arc::clone(&self.consumers)
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Token cancelled when the receive loop ends
    pub fn connection_lost(&self) -> CancellationToken {
        self.lost.clone()
    }

    /// Why the receive loop ended, if it ended on its own
    pub fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the transport and start the IO tasks.
    ///
    /// On failure the connection stays Disconnected.
    pub async fn connect(&mut self) -> ExchangeResult<()> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        if self.state() != ConnectionState::Disconnected {
            return Err(ExchangeError::ConnectionFailed(format!(
                "cannot connect from state {:?}",
                self.state()
            )));
        }

        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(exchange = self.wire.exchange, url = %self.url, "Connecting");

        let ws_stream = match connect_tls(&self.url).await {
            Ok(ws) => ws,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                tracing::error!(exchange = self.wire.exchange, error = %e, "Connection failed");
                return Err(ExchangeError::ConnectionFailed(format!("{}: {}", self.url, e)));
            }
        };

        let (ws_writer, ws_reader) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        self.writer_handle = Some(tokio::spawn(Self::writer_loop(
            ws_writer,
            rx,
            Arc::clone(&self.pending),
            self.wire.exchange,
        )));
        self.reader_handle = Some(tokio::spawn(Self::receive_loop(
            ws_reader,
            self.wire,
            Arc::clone(&self.consumers),
            Arc::clone(&self.pending),
            Arc::clone(&self.state),
            self.shutdown.clone(),
            self.lost.clone(),
            Arc::clone(&self.failure),
        )));
        self.outbound = Some(tx);
        self.state.send_replace(ConnectionState::Open);

        tracing::info!(exchange = self.wire.exchange, "Connection open");
        Ok(())
    }

    /// Drain and close: in-flight requests fail with `ConnectionLost`.
    pub async fn close(&mut self) -> ExchangeResult<()> {
        if self.state() != ConnectionState::Open {
            if self.state() == ConnectionState::Closed || self.outbound.is_none() {
                self.state.send_replace(ConnectionState::Closed);
            }
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Draining);
        let failed = self.pending.fail_all(|| ExchangeError::ConnectionLost);

        // Dropping the sender lets the writer flush and send a Close frame
        self.outbound = None;
        self.shutdown.cancel();

        for handle in [self.writer_handle.take(), self.reader_handle.take()]
            .into_iter()
            .flatten()
        {
            if tokio::time::timeout(CLOSE_GRACE, handle).await.is_err() {
                tracing::warn!(exchange = self.wire.exchange, "IO task did not stop in time");
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        tracing::info!(
            exchange = self.wire.exchange,
            failed_requests = failed,
            "Connection closed"
        );
        Ok(())
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Encode and queue `{method, params, id}`, returning the correlation id.
    ///
    /// Fails with `ConnectionLost` once the connection has left Open, so no
    /// caller waits out a reply that can never arrive.
    pub fn send_request(&self, method: &str, params: Value) -> ExchangeResult<u64> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| ExchangeError::ConnectionFailed("not connected".into()))?;

        // Registered before the state check: the receive loop publishes
        // Closed before failing pending slots, so one of the two sees this id
        let id = self.pending.register();
        if self.state() != ConnectionState::Open {
            self.pending.cancel(id);
            return Err(ExchangeError::ConnectionLost);
        }
        let frame = serde_json::json!({
            "method": method,
            "params": params,
            "id": id,
        });

        if outbound.send(Message::Text(frame.to_string())).is_err() {
            self.pending.cancel(id);
            return Err(ExchangeError::ConnectionLost);
        }
        tracing::trace!(exchange = self.wire.exchange, request_id = id, method, "Request sent");
        Ok(id)
    }

    /// Wait for the reply to `id`
    pub async fn await_reply(&self, id: u64, timeout: Duration) -> ExchangeResult<Value> {
        self.pending.wait(id, timeout).await
    }

    /// Send a request and wait for its reply with the default timeout
    pub async fn request(&self, method: &str, params: Value) -> ExchangeResult<Value> {
        let id = self.send_request(method, params)?;
        self.await_reply(id, self.reply_timeout).await
    }

    // =========================================================================
    // Consumers and subscriptions
    // =========================================================================

    pub async fn add_consumer(&self, consumer: Arc<dyn Consumer>, priority: u8) -> bool {
        self.consumers.add(consumer, priority).await
    }

    pub async fn remove_consumer(&self, name: &str) -> bool {
        self.consumers.remove(name).await
    }

    /// Subscribe `symbol` with the given exchange request. No-op when already subscribed.
    pub async fn subscribe(&self, symbol: &str, method: &str, params: Value) -> ExchangeResult<()> {
        if !self.subscriptions.insert(symbol) {
            tracing::debug!(exchange = self.wire.exchange, symbol, "Already subscribed");
            return Ok(());
        }
        // Armed before the request goes out so early notifications are kept
        self.consumers
            .add(self.ticker_consumer.clone(), TICKER_PRIORITY)
            .await;

        match self.request(method, params).await {
            Ok(_) => {
                tracing::info!(exchange = self.wire.exchange, symbol, "Subscribed to ticker");
                Ok(())
            }
            Err(e) => {
                self.subscriptions.remove(symbol);
                self.cache.remove(symbol).await;
                tracing::warn!(exchange = self.wire.exchange, symbol, error = %e, "Subscribe failed");
                Err(e)
            }
        }
    }

    /// Unsubscribe `symbol`. No-op, with nothing transmitted, when not subscribed.
    pub async fn unsubscribe(
        &self,
        symbol: &str,
        method: &str,
        params: Value,
    ) -> ExchangeResult<()> {
        if !self.subscriptions.contains(symbol) {
            tracing::debug!(exchange = self.wire.exchange, symbol, "Not subscribed");
            return Ok(());
        }

        self.request(method, params).await?;
        self.subscriptions.remove(symbol);
        self.cache.remove(symbol).await;
        tracing::info!(exchange = self.wire.exchange, symbol, "Unsubscribed from ticker");
        Ok(())
    }

    // =========================================================================
    // IO tasks
    // =========================================================================

    async fn writer_loop(
        mut ws_writer: WsWriter,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        pending: Arc<PendingRequests>,
        exchange: &'static str,
    ) {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = ws_writer.send(message).await {
                let failed = pending.fail_all(|| ExchangeError::ConnectionLost);
                tracing::error!(exchange, error = %e, failed_requests = failed, "WebSocket send failed");
                return;
            }
        }
        if let Err(e) = ws_writer.close().await {
            tracing::debug!(exchange, error = %e, "WebSocket close handshake failed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn receive_loop(
        mut ws_reader: WsReader,
        wire: &'static WireFormat,
        consumers: Arc<ConsumerChain>,
        pending: Arc<PendingRequests>,
        state: Arc<watch::Sender<ConnectionState>>,
        shutdown: CancellationToken,
        lost: CancellationToken,
        failure: Arc<Mutex<Option<String>>>,
    ) {
        tracing::debug!(exchange = wire.exchange, "Receive loop started");
        let mut reason: Option<String> = None;

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = ws_reader.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => Self::handle_text(wire, &consumers, &text).await,
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => Self::handle_text(wire, &consumers, &text).await,
                    Err(_) => tracing::debug!(exchange = wire.exchange, "Ignoring non-UTF8 frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(exchange = wire.exchange, frame = ?frame, "WebSocket closed by server");
                    reason = Some("closed by server".into());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(exchange = wire.exchange, error = %e, "WebSocket receive failed");
                    reason = Some(e.to_string());
                    break;
                }
                None => {
                    reason = Some("stream ended".into());
                    break;
                }
            }
        }

        if let Some(reason) = reason {
            *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
            state.send_replace(ConnectionState::Closed);
            let failed = pending.fail_all(|| ExchangeError::ConnectionLost);
            tracing::warn!(
                exchange = wire.exchange,
                reason = %reason,
                failed_requests = failed,
                "Receive loop ended"
            );
        } else {
            pending.fail_all(|| ExchangeError::ConnectionLost);
        }
        lost.cancel();
    }

    async fn handle_text(wire: &'static WireFormat, consumers: &ConsumerChain, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(exchange = wire.exchange, error = %e, "Undecodable frame");
                return;
            }
        };
        match consumers.dispatch(&frame).await {
            Some(handled) => tracing::trace!(exchange = wire.exchange, ?handled, "Frame handled"),
            None => tracing::trace!(exchange = wire.exchange, frame = %text, "Unhandled frame"),
        }
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
