//! Exchange adapters for HitBTC and Binance
//!
//! This module provides the capability trait the ticker session consumes,
//! the protocol engine both clients share, and one client per exchange.

pub mod binance;
pub mod errors;
pub mod factory;
pub mod hitbtc;
pub mod rpc;
pub mod shared;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ExchangeError, ExchangeResult, RemoteError};
pub use factory::{create_client, AnyClient};
pub use traits::ExchangeClient;
pub use types::{ConnectionState, Symbol, TickerEntry, WireFormat};
