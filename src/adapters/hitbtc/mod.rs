//! HitBTC exchange client module
//!
//! Ticker feed over the HitBTC v2 JSON-RPC WebSocket API.

pub mod adapter;
pub mod config;
pub mod types;

pub use adapter::HitBtcClient;
pub use config::HitBtcConfig;
pub use types::{Currency, HITBTC_WIRE};
