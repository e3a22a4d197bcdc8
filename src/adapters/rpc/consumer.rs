//! Consumer chain for inbound frames
//!
//! Every decoded frame is offered to consumers in ascending priority order
//! until one of them reports [`Dispatch::Handled`]. Priority 0 is reserved for
//! the [`ReplyCorrelator`], which is installed at construction and can never
//! be removed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapters::errors::{ExchangeError, RemoteError};
use crate::adapters::rpc::pending::PendingRequests;
use crate::adapters::types::WireFormat;

/// Priority of the built-in reply correlator
pub const CORRELATOR_PRIORITY: u8 = 0;

/// What a consumer did with a frame it claimed
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// Reply routed to the pending slot with this id
    Reply { id: u64 },
    /// Error frame from the exchange
    Rejected(RemoteError),
    /// Ticker snapshot stored for this symbol
    Ticker { symbol: String },
}

/// Result of offering a frame to one consumer
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Handled(Handled),
    NotHandled,
}

/// A handler in the chain.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Identity used for deduplication and removal
    fn name(&self) -> &'static str;

    /// Whether the consumer has nothing left to serve; idle consumers are
    /// dropped from the chain the next time a frame reaches them.
    fn is_idle(&self) -> bool {
        false
    }

    async fn consume(&self, frame: &Value) -> Dispatch;
}

// =============================================================================
// Reply correlator
// =============================================================================

/// Fills pending request slots from reply and error frames
pub struct ReplyCorrelator {
    wire: &'static WireFormat,
    pending: Arc<PendingRequests>,
}

impl ReplyCorrelator {
    pub fn new(wire: &'static WireFormat, pending: Arc<PendingRequests>) -> Self {
        Self { wire, pending }
    }
}

#[async_trait]
impl Consumer for ReplyCorrelator {
    fn name(&self) -> &'static str {
        "reply-correlator"
    }

    async fn consume(&self, frame: &Value) -> Dispatch {
        let id = self.wire.reply_id(frame);

        if let Some(error) = frame.get("error") {
            let remote = self.wire.decode_error(error);
            tracing::warn!(
                exchange = self.wire.exchange,
                code = remote.code,
                status = ?remote.status,
                message = %remote.message,
                request_id = ?id,
                "Exchange returned an error frame"
            );
            if let Some(id) = id {
                self.pending
                    .resolve(id, Err(ExchangeError::Remote(remote.clone())));
            }
            return Dispatch::Handled(Handled::Rejected(remote));
        }

        match (id, frame.get("result")) {
            (Some(id), Some(result)) => {
                if !self.pending.resolve(id, Ok(result.clone())) {
                    tracing::debug!(
                        exchange = self.wire.exchange,
                        request_id = id,
                        "Reply for unknown or already answered request"
                    );
                }
                Dispatch::Handled(Handled::Reply { id })
            }
            _ => Dispatch::NotHandled,
        }
    }
}

// =============================================================================
// Chain
// =============================================================================

struct Entry {
    priority: u8,
    consumer: Arc<dyn Consumer>,
}

/// Ordered list of consumers, lowest priority value first
pub struct ConsumerChain {
    entries: RwLock<Vec<Entry>>,
}

impl ConsumerChain {
    /// Create a chain holding only the reply correlator
    pub fn new(correlator: ReplyCorrelator) -> Self {
        Self {
            entries: RwLock::new(vec![Entry {
                priority: CORRELATOR_PRIORITY,
                consumer: Arc::new(correlator),
            }]),
        }
    }

    /// Add a consumer. Priority 0 is reserved, so lower values are raised to 1.
    ///
    /// Returns false if a consumer with the same name is already present.
    pub async fn add(&self, consumer: Arc<dyn Consumer>, priority: u8) -> bool {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.consumer.name() == consumer.name()) {
            return false;
        }
        entries.push(Entry {
            priority: priority.max(CORRELATOR_PRIORITY + 1),
            consumer,
        });
        // Stable: equal priorities keep insertion order
        entries.sort_by_key(|e| e.priority);
        true
    }

    /// Remove a consumer by name. The correlator cannot be removed.
    pub async fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.priority == CORRELATOR_PRIORITY || e.consumer.name() != name);
        before != entries.len()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| e.consumer.name() == name)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Offer a frame to each consumer in order, stopping at the first that handles it
    pub async fn dispatch(&self, frame: &Value) -> Option<Handled> {
        let snapshot: Vec<Arc<dyn Consumer>> = self
            .entries
            .read()
            .await
            .iter()
            .map(|e| Arc::clone(&e.consumer))
            .collect();

        for consumer in snapshot {
            if consumer.is_idle() {
                self.retire(consumer.name()).await;
                continue;
            }
            if let Dispatch::Handled(handled) = consumer.consume(frame).await {
                return Some(handled);
            }
        }
        None
    }

    /// Drop an idle consumer, re-checking idleness under the write lock so a
    /// consumer re-armed by a concurrent subscribe survives.
    async fn retire(&self, name: &'static str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| {
            e.priority == CORRELATOR_PRIORITY || e.consumer.name() != name || !e.consumer.is_idle()
        });
        if entries.len() != before {
            tracing::debug!(consumer = name, "Idle consumer removed from chain");
        }
    }
}
