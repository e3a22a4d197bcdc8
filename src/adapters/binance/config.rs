//! Binance Configuration
//!
//! Endpoints for the public spot market data API.

// =============================================================================
// Constants
// =============================================================================

/// Raw stream endpoint; streams are added with SUBSCRIBE requests
const WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// REST base for `exchangeInfo` and the 24h ticker listing
const REST_URL: &str = "https://api.binance.com/api/v3";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a Binance connection (public market data only)
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub ws_url: String,
    pub rest_url: String,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            ws_url: WS_URL.to_string(),
            rest_url: REST_URL.to_string(),
        }
    }
}

impl BinanceConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ws_url: std::env::var("BINANCE_WS_URL").unwrap_or(defaults.ws_url),
            rest_url: std::env::var("BINANCE_REST_URL").unwrap_or(defaults.rest_url),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn exchange_info_url(&self) -> String {
        format!("{}/exchangeInfo", self.rest_url.trim_end_matches('/'))
    }

    pub fn ticker_url(&self) -> String {
        format!("{}/ticker/24hr", self.rest_url.trim_end_matches('/'))
    }
}
