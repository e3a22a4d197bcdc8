//! Shared helpers for exchange clients
//!
//! WebSocket connection setup and the one-shot REST fetch used by every client.

pub mod http;
pub mod websocket;

pub use http::get_json;
pub use websocket::connect_tls;
