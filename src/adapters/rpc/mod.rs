//! Protocol engine
//!
//! Request/reply correlation and prioritized dispatch of inbound frames.

pub mod connection;
pub mod consumer;
pub mod pending;

pub use connection::{RpcConnection, TICKER_PRIORITY};
pub use consumer::{Consumer, ConsumerChain, Dispatch, Handled, ReplyCorrelator};
pub use pending::PendingRequests;
