//! Volume ranking
//!
//! Orders listed symbols by 24h traded volume expressed in USD, using the
//! last prices from the same REST listing as cross rates.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::types::VolumeRecord;
use crate::core::conversion::VolumeConverter;
use crate::core::registry::SymbolRegistry;

/// Symbol ids of the `limit` highest-volume records, largest first.
///
/// Records for unlisted symbols, or whose volume cannot be converted, are skipped.
pub fn rank_by_volume(
    records: &[VolumeRecord],
    registry: Arc<SymbolRegistry>,
    limit: usize,
) -> Vec<String> {
    let prices: HashMap<&str, Decimal> = records
        .iter()
        .map(|r| (r.symbol.as_str(), r.last))
        .collect();
    let converter = VolumeConverter::new("USD", Arc::clone(&registry));

    let mut ranked: Vec<(&str, Decimal)> = records
        .iter()
        .filter_map(|record| {
            let symbol = registry.get(&record.symbol)?;
            let usd = converter.convert(symbol, record.volume_quote, |id| prices.get(id).copied())?;
            Some((record.symbol.as_str(), usd))
        })
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    tracing::debug!(candidates = ranked.len(), limit, "Ranked symbols by USD volume");

    ranked
        .into_iter()
        .take(limit)
        .map(|(id, _)| id.to_string())
        .collect()
}
