//! Terminal coin ticker
//!
//! Live exchange ticker board for ANSI terminals:
//! - Exchange clients over a shared JSON-RPC protocol engine (HitBTC, Binance)
//! - Ticker cache with a staleness watchdog
//! - One render task per board row

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod tui;

pub use error::AppError;
