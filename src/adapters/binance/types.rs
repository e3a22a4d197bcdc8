//! Binance wire types
//!
//! Stream events carry single-letter keys on the frame root; REST listings
//! use long names and nest the tick size inside `filters`.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::adapters::types::{parse_decimal, FieldMap, Symbol, TimeFormat, VolumeRecord, WireFormat};

// =============================================================================
// Wire Translation Table
// =============================================================================

/// WebSocket API error codes
pub const BINANCE_ERRORS: &[(i64, u16, &str)] = &[
    (0, 400, "Unknown property"),
    (1, 400, "Invalid value type"),
    (2, 400, "Invalid request"),
    (3, 400, "Invalid JSON"),
];

/// `24hrTicker` events: `{"e": "24hrTicker", "E": 1672515782136, "s": "BNBBTC", "c": ...}`
pub static BINANCE_WIRE: WireFormat = WireFormat {
    exchange: "binance",
    channel_keys: &["e"],
    ticker_channel: "24hrTicker",
    payload_keys: &[],
    error_message_key: "msg",
    time_format: TimeFormat::EpochMillis,
    fields: FieldMap {
        symbol: "s",
        listing_id: "symbol",
        time: "E",
        last: "c",
        volume_base: "v",
        volume_quote: "q",
        bid: "b",
        ask: "a",
        open: "o",
        base_currency: "baseAsset",
        quote_currency: "quoteAsset",
        tick_size: "tickSize",
    },
    errors: BINANCE_ERRORS,
};

pub const METHOD_SUBSCRIBE: &str = "SUBSCRIBE";
pub const METHOD_UNSUBSCRIBE: &str = "UNSUBSCRIBE";

/// Listings that exist on the exchange but are not real markets
const PLACEHOLDER_SYMBOLS: &[&str] = &["123456"];

/// Stream name for a symbol's 24h rolling ticker
pub fn ticker_stream(symbol: &str) -> String {
    format!("{}@ticker", symbol.to_lowercase())
}

// =============================================================================
// REST payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<RawSymbol>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSymbol {
    pub symbol: String,
    #[serde(default)]
    pub status: Option<String>,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    #[serde(default)]
    pub tick_size: Option<String>,
}

impl RawSymbol {
    fn tick_size(&self) -> Option<Decimal> {
        self.filters
            .iter()
            .filter(|f| f.filter_type == "PRICE_FILTER")
            .find_map(|f| parse_decimal(f.tick_size.as_deref()?))
            .map(|d| d.normalize())
    }

    /// Normalized symbol, `None` for placeholders, halted markets and
    /// listings without a price filter
    pub fn to_symbol(&self) -> Option<Symbol> {
        if PLACEHOLDER_SYMBOLS.contains(&self.symbol.as_str()) {
            return None;
        }
        if matches!(self.status.as_deref(), Some(status) if status != "TRADING") {
            return None;
        }
        Some(Symbol {
            id: self.symbol.clone(),
            base: self.base_asset.clone(),
            quote: self.quote_asset.clone(),
            tick_size: self.tick_size()?,
        })
    }
}

/// One entry of `GET /ticker/24hr`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTicker {
    pub symbol: String,
    pub last_price: String,
    pub quote_volume: String,
}

impl RestTicker {
    pub fn to_volume_record(&self) -> Option<VolumeRecord> {
        Some(VolumeRecord {
            symbol: self.symbol.clone(),
            last: parse_decimal(&self.last_price)?,
            volume_quote: parse_decimal(&self.quote_volume)?,
        })
    }
}
