//! Binance exchange client module
//!
//! Ticker feed over the Binance spot raw-stream WebSocket.

pub mod adapter;
pub mod config;
pub mod types;

pub use adapter::BinanceClient;
pub use config::BinanceConfig;
pub use types::BINANCE_WIRE;
