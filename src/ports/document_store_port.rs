//! Document store port trait for price-history seeding.

use crate::domain::error::SigstatsError;
use crate::domain::seed::PriceDocument;

pub trait DocumentStorePort {
    fn exists(&self, id: &str) -> Result<bool, SigstatsError>;

    /// Insert a new document. Callers check `exists` first.
    fn insert(&self, document: &PriceDocument) -> Result<(), SigstatsError>;

    fn get(&self, id: &str) -> Result<Option<PriceDocument>, SigstatsError>;
}
