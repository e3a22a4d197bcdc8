//! Symbol registry
//!
//! Resolves user pair notation ("eth/btc", "ETH_BTC", "eth btc", "ETHBTC")
//! to exchange symbol ids and exposes per-symbol currencies and tick sizes.
//! Built once from the exchange's bulk symbol listing and never mutated.

use std::collections::{BTreeSet, HashMap};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::types::Symbol;

/// Immutable index of an exchange's listed symbols
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    symbols: HashMap<String, Symbol>,
    /// Distinct quote currencies
    markets: BTreeSet<String>,
}

impl SymbolRegistry {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        let symbols: HashMap<String, Symbol> =
            symbols.into_iter().map(|s| (s.id.clone(), s)).collect();
        let markets = symbols.values().map(|s| s.quote.clone()).collect();
        Self { symbols, markets }
    }

    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.symbols.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Distinct quote currencies across all symbols
    pub fn markets(&self) -> &BTreeSet<String> {
        &self.markets
    }

    /// Resolve pair notation to a listed symbol id.
    ///
    /// Exact ids pass through untouched. Otherwise the last non-alphanumeric
    /// character is treated as the separator and removed, the result is
    /// upper-cased, and a trailing "USD" falls back to "USDT" when only the
    /// tether pair is listed.
    pub fn canonicalize(&self, pair: &str) -> ExchangeResult<String> {
        let pair = pair.trim();
        if self.contains(pair) {
            return Ok(pair.to_string());
        }

        let joined = match pair.chars().rev().find(|c| !c.is_ascii_alphanumeric()) {
            Some(separator) => pair.replace(separator, ""),
            None => pair.to_string(),
        };
        let candidate = joined.to_uppercase();

        if self.contains(&candidate) {
            return Ok(candidate);
        }
        if candidate.ends_with("USD") {
            let tether = format!("{}T", candidate);
            if self.contains(&tether) {
                return Ok(tether);
            }
        }
        Err(ExchangeError::UnknownSymbol(pair.to_string()))
    }

    /// Resolve pair notation to its (base, quote) currencies
    pub fn currencies(&self, pair: &str) -> ExchangeResult<(String, String)> {
        let id = self.canonicalize(pair)?;
        let symbol = self
            .get(&id)
            .ok_or_else(|| ExchangeError::UnknownSymbol(pair.to_string()))?;
        Ok((symbol.base.clone(), symbol.quote.clone()))
    }

    /// Listed symbols that pair two distinct quote currencies.
    ///
    /// With a target unit, only pairs quoted in that unit are kept; a "USD"
    /// target also keeps its "USDT" siblings.
    pub fn conversion_pairs(&self, target: Option<&str>) -> BTreeSet<String> {
        let mut pairs = BTreeSet::new();
        for a in &self.markets {
            for b in &self.markets {
                if a == b {
                    continue;
                }
                let id = format!("{}{}", a, b);
                if self.contains(&id) {
                    pairs.insert(id);
                }
            }
        }

        match target {
            None => pairs,
            Some(unit) if unit.contains("USD") => pairs
                .into_iter()
                .filter(|p| p.ends_with("USD") || p.ends_with("USDT"))
                .collect(),
            Some(unit) => pairs.into_iter().filter(|p| p.ends_with(unit)).collect(),
        }
    }
}
