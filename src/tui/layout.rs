//! Column layout computed once from the initial snapshots
//!
//! Columns, left to right: left margin, pair, price, volume, bid, ask,
//! change, right margin. Every content column carries `PAD` trailing
//! spaces.

use rust_decimal::Decimal;

use crate::adapters::types::{Symbol, TickerEntry};
use crate::core::conversion::VolumeConverter;
use crate::error::AppError;

use super::format::{format_change, format_fixed, format_grouped, format_plain, format_quote};

pub const PAD: usize = 2;

/// Quotes treated as fiat when deciding the high-value price override
const FIAT_LIKE: &[&str] = &["USD", "USDT", "USDC", "EUR"];

/// Pairs at or above this price in a fiat-like quote show two decimals
const HIGH_VALUE_THRESHOLD: Decimal = Decimal::TEN;

pub const PAIR_SEPARATOR: &str = "/";

/// Column indexes into `Layout::widths`
pub mod col {
    pub const LEFT: usize = 0;
    pub const PAIR: usize = 1;
    pub const PRICE: usize = 2;
    pub const VOLUME: usize = 3;
    pub const BID: usize = 4;
    pub const ASK: usize = 5;
    pub const CHANGE: usize = 6;
    pub const RIGHT: usize = 7;
}

/// One row's initial data
#[derive(Debug, Clone)]
pub struct RowSeed {
    pub symbol: Symbol,
    pub entry: TickerEntry,
    /// Volume in the display unit, when a unit is configured and convertible
    pub volume: Option<Decimal>,
}

/// Decimal places for prices of `symbol`, fixed for the session
pub fn price_decimals(symbol: &Symbol, last: Decimal) -> u32 {
    if FIAT_LIKE.contains(&symbol.quote.as_str()) && last >= HIGH_VALUE_THRESHOLD {
        2
    } else {
        symbol.price_decimals()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub widths: [usize; 8],
    pub exchange: String,
    /// Volume column heading
    pub volume_label: String,
    /// Decimal places of converted volume; `None` shows raw base volume
    pub volume_precision: Option<u32>,
}

impl Layout {
    pub fn compute(exchange: &str, seeds: &[RowSeed], converter: Option<&VolumeConverter>) -> Self {
        let volume_precision = converter.map(VolumeConverter::precision);
        let volume_label = match converter {
            Some(c) => format!("Vol ({})  ", c.target()),
            None => "Vol (base)".to_string(),
        };

        let pair = widest(seeds, |s| s.symbol.base.len() + PAIR_SEPARATOR.len() + s.symbol.quote.len())
            .max(exchange.chars().count());
        let price = widest(seeds, |s| {
            let decimals = price_decimals(&s.symbol, s.entry.last);
            format_fixed(s.entry.last, decimals).len()
        });
        let volume = widest(seeds, |s| volume_text(s.volume, &s.entry, volume_precision).len())
            .max(volume_label.chars().count());
        let bid = widest(seeds, |s| {
            let decimals = price_decimals(&s.symbol, s.entry.last);
            format_quote(s.entry.bid, decimals).len()
        });
        let ask = widest(seeds, |s| {
            let decimals = price_decimals(&s.symbol, s.entry.last);
            format_quote(s.entry.ask, decimals).len()
        });
        let change = widest(seeds, |s| format_change(s.entry.change).len());

        Self {
            widths: [
                PAD,
                pair + PAD,
                price + PAD,
                volume + PAD,
                bid + PAD,
                ask + PAD,
                change + PAD,
                PAD,
            ],
            exchange: exchange.to_string(),
            volume_label,
            volume_precision,
        }
    }

    pub fn total_width(&self) -> usize {
        self.widths.iter().sum()
    }

    /// Fail with `InsufficientWidth` when the board exceeds `columns`
    pub fn ensure_fits(&self, columns: usize) -> Result<(), AppError> {
        let required = self.total_width();
        if required > columns {
            return Err(AppError::InsufficientWidth {
                required,
                available: columns,
            });
        }
        Ok(())
    }
}

fn widest(seeds: &[RowSeed], cell: impl Fn(&RowSeed) -> usize) -> usize {
    seeds.iter().map(cell).max().unwrap_or(0)
}

/// Volume cell content
pub fn volume_text(volume: Option<Decimal>, entry: &TickerEntry, precision: Option<u32>) -> String {
    match precision {
        Some(decimals) => volume
            .map(|v| format_grouped(v, decimals))
            .unwrap_or_else(|| "-".to_string()),
        None => format_plain(entry.volume_base),
    }
}
