//! Seeding skeleton price documents into a document store.
//!
//! Two sources are supported: a plain symbol list, which yields empty
//! documents stamped with a sentinel `lastUpdated` far in the past so the
//! first price refresh fetches full history, and a price cache, which yields
//! documents pre-filled with cached bars. Existing documents are never
//! touched, so running either twice is harmless.

use crate::domain::error::SigstatsError;
use crate::ports::document_store_port::DocumentStorePort;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LAST_UPDATED: &str = "1990-01-01T00:00:00.000Z";
/// Share classes (`BRK.B`) and index tickers (`^GSPC`) are not primary listings.
pub const DEFAULT_EXCLUDE_CHARS: &str = ".^";

/// Symbol to cached daily bars, each bar an object carrying at least `date`.
pub type PriceCache = IndexMap<String, Vec<Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDocument {
    pub id: String,
    pub prices: Vec<Value>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

impl PriceDocument {
    pub fn skeleton(symbol: &str, last_updated: &str) -> Self {
        Self {
            id: symbol.to_string(),
            prices: Vec::new(),
            last_updated: last_updated.to_string(),
        }
    }

    /// Document holding cached bars, stamped with the last bar's date.
    ///
    /// `None` when there are no bars or the last one has no string `date`.
    pub fn from_cache(symbol: &str, bars: &[Value]) -> Option<Self> {
        let last_date = bars.last()?.get("date")?.as_str()?.to_string();
        Some(Self {
            id: symbol.to_string(),
            prices: bars.to_vec(),
            last_updated: last_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedOptions {
    pub exclude_chars: String,
    pub last_updated: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            exclude_chars: DEFAULT_EXCLUDE_CHARS.to_string(),
            last_updated: DEFAULT_LAST_UPDATED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub existing: usize,
    pub excluded: usize,
    /// Cache entries with no usable bars.
    pub empty: usize,
}

pub fn is_excluded(symbol: &str, exclude_chars: &str) -> bool {
    symbol.chars().any(|c| exclude_chars.contains(c))
}

pub fn seed_symbols(
    store: &dyn DocumentStorePort,
    symbols: &[String],
    options: &SeedOptions,
) -> Result<SeedSummary, SigstatsError> {
    let mut summary = SeedSummary::default();

    for symbol in symbols {
        if is_excluded(symbol, &options.exclude_chars) {
            summary.excluded += 1;
            continue;
        }
        tracing::debug!(%symbol, "indexing");
        insert_if_absent(
            store,
            &PriceDocument::skeleton(symbol, &options.last_updated),
            &mut summary,
        )?;
    }

    Ok(summary)
}

pub fn seed_price_cache(
    store: &dyn DocumentStorePort,
    cache: &PriceCache,
) -> Result<SeedSummary, SigstatsError> {
    let mut summary = SeedSummary::default();

    for (symbol, bars) in cache {
        let Some(document) = PriceDocument::from_cache(symbol, bars) else {
            tracing::warn!(%symbol, "no dated bars in price cache, skipping");
            summary.empty += 1;
            continue;
        };
        insert_if_absent(store, &document, &mut summary)?;
    }

    Ok(summary)
}

fn insert_if_absent(
    store: &dyn DocumentStorePort,
    document: &PriceDocument,
    summary: &mut SeedSummary,
) -> Result<(), SigstatsError> {
    if store.exists(&document.id)? {
        summary.existing += 1;
    } else {
        store.insert(document)?;
        summary.inserted += 1;
    }
    Ok(())
}
