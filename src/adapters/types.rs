//! Common types for exchange clients
//!
//! Symbols, ticker snapshots and the per-exchange wire translation table.
//! Every exchange-specific field name lives in a [`WireFormat`]; the rest of
//! the crate only sees the normalized types defined here.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult, RemoteError};

// =============================================================================
// HTTP Client
// =============================================================================

/// REST request timeout
const HTTP_TIMEOUT_SECS: u64 = 10;
/// TCP connect timeout
const HTTP_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Create the HTTP client used for one-shot REST calls (symbol lists, volume ranking)
pub fn create_http_client(exchange_name: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .user_agent(concat!("coin-ticker/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::debug!(
        exchange = %exchange_name,
        timeout_s = HTTP_TIMEOUT_SECS,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        "HTTP client created"
    );
    client
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of one exchange connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport; initial state and the state after a failed connect
    #[default]
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Receive loop running, requests accepted
    Open,
    /// Close requested; in-flight requests are being failed
    Draining,
    /// Terminal state
    Closed,
}

// =============================================================================
// Symbols and Tickers
// =============================================================================

/// A tradable pair as listed by the exchange. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Exchange-native id, e.g. "ETHBTC"
    pub id: String,
    pub base: String,
    pub quote: String,
    /// Minimum price increment
    pub tick_size: Decimal,
}

impl Symbol {
    /// Number of decimal places implied by the tick size
    pub fn price_decimals(&self) -> u32 {
        self.tick_size.normalize().scale()
    }
}

/// Latest full snapshot for one symbol.
///
/// Replaced wholesale by every notification; `timestamp == None` marks the
/// entry stale while keeping the last known values around for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerEntry {
    pub symbol: String,
    pub last: Decimal,
    /// `None` while that side of the book is empty
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub open: Decimal,
    pub volume_base: Decimal,
    pub volume_quote: Decimal,
    /// (last - open) / open
    pub change: Decimal,
    /// Time reported by the exchange, if any
    pub exchange_time: Option<DateTime<Utc>>,
    /// Local receipt time; `None` once the watchdog marked the entry stale
    pub timestamp: Option<DateTime<Utc>>,
}

impl TickerEntry {
    pub fn is_stale(&self) -> bool {
        self.timestamp.is_none()
    }
}

/// Fractional change since the session open; zero when the open is zero
pub fn percent_change(last: Decimal, open: Decimal) -> Decimal {
    if open.is_zero() {
        return Decimal::ZERO;
    }
    (last - open).checked_div(open).unwrap_or(Decimal::ZERO)
}

/// One row of a REST 24h ticker listing, used for volume ranking
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRecord {
    pub symbol: String,
    pub last: Decimal,
    pub volume_quote: Decimal,
}

// =============================================================================
// Wire Translation Table
// =============================================================================

/// How an exchange encodes timestamps in ticker payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// "2017-10-19T15:45:44.941Z"
    Iso8601,
    /// Milliseconds since the Unix epoch
    EpochMillis,
}

/// Exchange field names for the normalized ticker and symbol attributes
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    /// Symbol key inside ticker payloads
    pub symbol: &'static str,
    /// Symbol key inside symbol listings
    pub listing_id: &'static str,
    pub time: &'static str,
    pub last: &'static str,
    pub volume_base: &'static str,
    pub volume_quote: &'static str,
    pub bid: &'static str,
    pub ask: &'static str,
    pub open: &'static str,
    pub base_currency: &'static str,
    pub quote_currency: &'static str,
    pub tick_size: &'static str,
}

/// Static description of an exchange's frame layout.
///
/// Replies are `{id, result}` or `{id, error: {code, <message key>}}`;
/// notifications carry their channel name under one of `channel_keys` and
/// their payload under one of `payload_keys` (or at the frame root when
/// `payload_keys` is empty).
#[derive(Debug, Clone, Copy)]
pub struct WireFormat {
    pub exchange: &'static str,
    pub channel_keys: &'static [&'static str],
    pub ticker_channel: &'static str,
    pub payload_keys: &'static [&'static str],
    pub error_message_key: &'static str,
    pub time_format: TimeFormat,
    pub fields: FieldMap,
    /// (code, http status, message)
    pub errors: &'static [(i64, u16, &'static str)],
}

impl WireFormat {
    /// Correlation id of a reply frame
    pub fn reply_id(&self, frame: &Value) -> Option<u64> {
        frame.get("id").and_then(Value::as_u64)
    }

    /// Map the `error` object of a frame through the reference table
    pub fn decode_error(&self, error: &Value) -> RemoteError {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get(self.error_message_key)
            .and_then(Value::as_str)
            .unwrap_or("no message");
        RemoteError::from_table(self.errors, code, message)
    }

    /// Payload of a ticker notification, `None` for any other frame
    pub fn ticker_payload<'a>(&self, frame: &'a Value) -> Option<&'a Value> {
        let channel = self
            .channel_keys
            .iter()
            .find_map(|key| frame.get(*key))
            .and_then(Value::as_str)?;
        if channel != self.ticker_channel {
            return None;
        }
        if self.payload_keys.is_empty() {
            return Some(frame);
        }
        self.payload_keys.iter().find_map(|key| frame.get(*key))
    }

    /// Build a complete snapshot from a ticker payload.
    ///
    /// Last, open and both volumes are required; a payload missing one is
    /// rejected rather than merged into the previous entry. Bid and ask are
    /// null on an empty book and decode to `None`.
    pub fn decode_ticker(
        &self,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> ExchangeResult<TickerEntry> {
        let f = &self.fields;
        let symbol = payload
            .get(f.symbol)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(self.exchange, f.symbol))?
            .to_string();
        let require = |key: &'static str| {
            decimal_field(payload, key).ok_or_else(|| missing(self.exchange, key))
        };
        let last = require(f.last)?;
        let open = require(f.open)?;

        Ok(TickerEntry {
            last,
            bid: decimal_field(payload, f.bid),
            ask: decimal_field(payload, f.ask),
            open,
            volume_base: require(f.volume_base)?,
            volume_quote: require(f.volume_quote)?,
            change: percent_change(last, open),
            exchange_time: self.decode_time(payload.get(f.time)),
            timestamp: Some(received_at),
            symbol,
        })
    }

    /// Build a [`Symbol`] from a listing object that carries all four attributes
    pub fn decode_symbol(&self, raw: &Value) -> ExchangeResult<Symbol> {
        let f = &self.fields;
        let text = |key: &'static str| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| missing(self.exchange, key))
        };
        Ok(Symbol {
            id: text(f.listing_id)?,
            base: text(f.base_currency)?,
            quote: text(f.quote_currency)?,
            tick_size: decimal_field(raw, f.tick_size)
                .ok_or_else(|| missing(self.exchange, f.tick_size))?,
        })
    }

    fn decode_time(&self, value: Option<&Value>) -> Option<DateTime<Utc>> {
        match (self.time_format, value?) {
            (TimeFormat::Iso8601, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            (TimeFormat::EpochMillis, Value::Number(n)) => {
                n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis)
            }
            _ => None,
        }
    }
}

fn missing(exchange: &str, key: &str) -> ExchangeError {
    ExchangeError::InvalidResponse(format!("{} payload missing field '{}'", exchange, key))
}

/// Parse a decimal from a plain or scientific-notation string
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Read a decimal that the exchange may send either as a string or a number
pub fn decimal_field(obj: &Value, key: &str) -> Option<Decimal> {
    match obj.get(key)? {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
