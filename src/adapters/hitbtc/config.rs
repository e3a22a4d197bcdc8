//! HitBTC Configuration
//!
//! Endpoints for the public market data API.

// =============================================================================
// Constants
// =============================================================================

/// Streaming JSON-RPC endpoint
const WS_URL: &str = "wss://api.hitbtc.com/api/2/ws";

/// REST base, used for the 24h ticker listing
const REST_URL: &str = "https://api.hitbtc.com/api/2";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a HitBTC connection (public market data only)
#[derive(Debug, Clone)]
pub struct HitBtcConfig {
    pub ws_url: String,
    pub rest_url: String,
}

impl Default for HitBtcConfig {
    fn default() -> Self {
        Self {
            ws_url: WS_URL.to_string(),
            rest_url: REST_URL.to_string(),
        }
    }
}

impl HitBtcConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ws_url: std::env::var("HITBTC_WS_URL").unwrap_or(defaults.ws_url),
            rest_url: std::env::var("HITBTC_REST_URL").unwrap_or(defaults.rest_url),
        }
    }

    /// Get WebSocket URL
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// 24h ticker listing for every symbol
    pub fn ticker_url(&self) -> String {
        format!("{}/public/ticker", self.rest_url.trim_end_matches('/'))
    }
}
