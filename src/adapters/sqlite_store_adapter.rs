//! SQLite-backed price document store.
//!
//! Each collection is a table keyed by symbol; the price array is kept as
//! JSON text so bars with arbitrary fields survive unchanged.

use crate::domain::config_validation::is_collection_name;
use crate::domain::error::SigstatsError;
use crate::domain::seed::PriceDocument;
use crate::ports::config_port::ConfigPort;
use crate::ports::document_store_port::DocumentStorePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

pub const DEFAULT_COLLECTION: &str = "prices";

pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
    collection: String,
}

fn store_err(e: r2d2::Error) -> SigstatsError {
    SigstatsError::Store {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> SigstatsError {
    SigstatsError::StoreQuery {
        reason: e.to_string(),
    }
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigstatsError> {
        let db_path =
            config
                .get_string("store", "path")
                .ok_or_else(|| SigstatsError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("store", "pool_size", 4).max(1) as u32;
        let collection = config
            .get_string("store", "collection")
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(store_err)?;

        Self::with_pool(pool, collection)
    }

    pub fn in_memory() -> Result<Self, SigstatsError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(store_err)?;

        Self::with_pool(pool, DEFAULT_COLLECTION.to_string())
    }

    fn with_pool(
        pool: Pool<SqliteConnectionManager>,
        collection: String,
    ) -> Result<Self, SigstatsError> {
        if !is_collection_name(&collection) {
            return Err(SigstatsError::ConfigInvalid {
                section: "store".into(),
                key: "collection".into(),
                reason: format!("'{}' is not a valid collection name", collection),
            });
        }
        Ok(Self { pool, collection })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The collection as a quoted SQL identifier, so keywords such as
    /// `order` still name a table.
    fn table(&self) -> String {
        format!("\"{}\"", self.collection.replace('"', "\"\""))
    }

    pub fn initialize_schema(&self) -> Result<(), SigstatsError> {
        let conn = self.conn()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY NOT NULL,
                prices TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );",
            self.table()
        ))
        .map_err(query_err)?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, SigstatsError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", self.table()),
                [],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SigstatsError> {
        self.pool.get().map_err(store_err)
    }
}

impl DocumentStorePort for SqliteStoreAdapter {
    fn exists(&self, id: &str) -> Result<bool, SigstatsError> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", self.table()),
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        Ok(found.is_some())
    }

    fn insert(&self, document: &PriceDocument) -> Result<(), SigstatsError> {
        let prices = serde_json::to_string(&document.prices).map_err(|e| {
            SigstatsError::StoreQuery {
                reason: e.to_string(),
            }
        })?;

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, prices, last_updated) VALUES (?1, ?2, ?3)",
                self.table()
            ),
            params![document.id, prices, document.last_updated],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PriceDocument>, SigstatsError> {
        let conn = self.conn()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                &format!(
                    "SELECT id, prices, last_updated FROM {} WHERE id = ?1",
                    self.table()
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(query_err)?;

        match row {
            Some((id, prices, last_updated)) => {
                let prices =
                    serde_json::from_str(&prices).map_err(|e| SigstatsError::StoreQuery {
                        reason: format!("corrupt prices for {}: {}", id, e),
                    })?;
                Ok(Some(PriceDocument {
                    id,
                    prices,
                    last_updated,
                }))
            }
            None => Ok(None),
        }
    }
}
