//! HitBTC wire types
//!
//! Field names, error reference table and REST payloads.

use serde::{Deserialize, Serialize};

use crate::adapters::types::{parse_decimal, FieldMap, TimeFormat, VolumeRecord, WireFormat};

// =============================================================================
// Wire Translation Table
// =============================================================================

/// Error code reference: (code, http status, message)
pub const HITBTC_ERRORS: &[(i64, u16, &str)] = &[
    (403, 401, "Action is forbidden for account"),
    (429, 429, "Too many requests. Action is being rate limited for account"),
    (500, 500, "Internal Server Error"),
    (503, 503, "Service Unavailable. Try it again later"),
    (504, 504, "Gateway Timeout. Check the result of your request later"),
    (1001, 401, "Authorisation required"),
    (1002, 401, "Authorisation failed"),
    (1003, 403, "Action is forbidden for this API key. Check permissions for API key"),
    (1004, 401, "Unsupported authorisation method. Use Basic authentication"),
    (2001, 400, "Symbol not found"),
    (2002, 400, "Currency not found"),
    (20001, 400, "Insufficient funds. Insufficient funds for creating order or any account operation"),
    (20002, 400, "Order not found. Attempt to get active order that not existing: filled, canceled or expired. Attempt to cancel not existing order. Attempt to cancel already filled or expired order."),
    (20003, 400, "Limit exceeded. Withdrawal limit exceeded"),
    (20004, 400, "Transaction not found. Requested transaction not found"),
    (20005, 400, "Payout not found"),
    (20006, 400, "Payout already committed"),
    (20007, 400, "Payout already rolled back"),
    (20008, 400, "Duplicate clientOrderId"),
    (10001, 400, "Validation error. Input not valid, see more in message field"),
];

/// Notifications arrive as `{"method": "ticker", "params": {...}}`
pub static HITBTC_WIRE: WireFormat = WireFormat {
    exchange: "hitbtc",
    channel_keys: &["method", "channel"],
    ticker_channel: "ticker",
    payload_keys: &["params", "data"],
    error_message_key: "message",
    time_format: TimeFormat::Iso8601,
    fields: FieldMap {
        symbol: "symbol",
        listing_id: "id",
        time: "timestamp",
        last: "last",
        volume_base: "volume",
        volume_quote: "volumeQuote",
        bid: "bid",
        ask: "ask",
        open: "open",
        base_currency: "baseCurrency",
        quote_currency: "quoteCurrency",
        tick_size: "tickSize",
    },
    errors: HITBTC_ERRORS,
};

// =============================================================================
// Request methods
// =============================================================================

pub const METHOD_GET_SYMBOLS: &str = "getSymbols";
pub const METHOD_GET_CURRENCY: &str = "getCurrency";
pub const METHOD_SUBSCRIBE_TICKER: &str = "subscribeTicker";
pub const METHOD_UNSUBSCRIBE_TICKER: &str = "unsubscribeTicker";

// =============================================================================
// Payloads
// =============================================================================

/// One entry of `GET /public/ticker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTicker {
    pub symbol: String,
    /// Null for symbols that never traded
    pub last: Option<String>,
    pub volume_quote: Option<String>,
}

impl RestTicker {
    /// `None` when the listing lacks a price or a volume
    pub fn to_volume_record(&self) -> Option<VolumeRecord> {
        Some(VolumeRecord {
            symbol: self.symbol.clone(),
            last: parse_decimal(self.last.as_deref()?)?,
            volume_quote: parse_decimal(self.volume_quote.as_deref()?)?,
        })
    }
}

/// Result of `getCurrency`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub crypto: bool,
    #[serde(default)]
    pub payin_enabled: bool,
    #[serde(default)]
    pub payout_enabled: bool,
    #[serde(default)]
    pub transfer_enabled: bool,
    #[serde(default)]
    pub delisted: bool,
    #[serde(default)]
    pub payout_fee: Option<String>,
}
