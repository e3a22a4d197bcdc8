//! Volume unit conversion
//!
//! Expresses a symbol's quote-currency volume in a common display unit using
//! cross rates from listed symbols.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::types::Symbol;
use crate::core::cache::TickerCache;
use crate::core::registry::SymbolRegistry;

/// Converts quote volumes into `target` units
#[derive(Debug, Clone)]
pub struct VolumeConverter {
    target: String,
    registry: Arc<SymbolRegistry>,
}

impl VolumeConverter {
    pub fn new(target: impl Into<String>, registry: Arc<SymbolRegistry>) -> Self {
        Self {
            target: target.into().to_uppercase(),
            registry,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Decimal places used when displaying converted volume
    pub fn precision(&self) -> u32 {
        match self.target.as_str() {
            "USD" | "USDT" => 0,
            "ETH" => 1,
            _ => 2,
        }
    }

    fn same_unit(&self, quote: &str) -> bool {
        quote == self.target || (self.target == "USD" && quote == "USDT")
    }

    /// Listed symbols quoting `quote` in the target unit, preferred first
    fn direct_rates(&self, quote: &str) -> Vec<String> {
        let mut ids = vec![format!("{}{}", quote, self.target)];
        if self.target == "USD" {
            ids.push(format!("{}USDT", quote));
        }
        ids.retain(|id| self.registry.contains(id));
        ids
    }

    /// Listed symbol quoting the target unit in `quote`, used by division
    fn inverse_rate(&self, quote: &str) -> Option<String> {
        let id = format!("{}{}", self.target, quote);
        self.registry.contains(&id).then_some(id)
    }

    /// Every symbol whose price may be consulted when converting `symbol`
    pub fn rate_symbols(&self, symbol: &Symbol) -> Vec<String> {
        if self.same_unit(&symbol.quote) {
            return Vec::new();
        }
        let mut ids = self.direct_rates(&symbol.quote);
        ids.extend(self.inverse_rate(&symbol.quote));
        ids
    }

    /// Convert `volume_quote` of `symbol` into the target unit.
    ///
    /// Uses the volume as-is when already in the target unit, multiplies by a
    /// direct rate when one is listed and priced, and divides by the inverse
    /// rate only when no direct pair is listed.
    pub fn convert(
        &self,
        symbol: &Symbol,
        volume_quote: Decimal,
        last_price: impl Fn(&str) -> Option<Decimal>,
    ) -> Option<Decimal> {
        if self.same_unit(&symbol.quote) {
            return Some(volume_quote);
        }

        let direct = self.direct_rates(&symbol.quote);
        if !direct.is_empty() {
            return direct
                .iter()
                .find_map(|id| last_price(id))
                .and_then(|rate| volume_quote.checked_mul(rate));
        }

        let rate = last_price(&self.inverse_rate(&symbol.quote)?)?;
        if rate.is_zero() {
            return None;
        }
        volume_quote.checked_div(rate)
    }

    /// Convert using the latest cached prices
    pub async fn convert_cached(
        &self,
        symbol: &Symbol,
        volume_quote: Decimal,
        cache: &TickerCache,
    ) -> Option<Decimal> {
        let prices: HashMap<String, Decimal> = cache.last_prices(&self.rate_symbols(symbol)).await;
        self.convert(symbol, volume_quote, |id| prices.get(id).copied())
    }
}
