//! Sled-backed driver.
//!
//! Each table maps onto two trees:
//! - `rows:<table>`: insertion sequence (u64 BE) -> rkyv-encoded row
//! - `ids:<table>`: identifier (i64 BE) -> insertion sequence
//!
//! Keying rows by a sequence from [`sled::Db::generate_id`] keeps scans in
//! insertion order, matching the in-memory driver.

use std::path::PathBuf;

use pluto_proto::{FilterExpr, Value};
use rkyv::{Archive, Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::debug;

use super::driver::{EntityIter, StoreDriver};
use super::Entity;
use crate::catalog::Schema;
use crate::error::{ConstraintError, Error, Result};
use crate::query::FilterEvaluator;

/// Configuration for [`SledDriver`].
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush only on demand.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./pluto_data"),
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            compression: false,
            temporary: false,
        }
    }
}

impl SledConfig {
    /// Create a configuration for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// A throwaway database, removed when dropped.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        config
    }
}

/// On-disk row layout.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
struct StoredEntity {
    kind: String,
    id: i64,
    fields: Vec<StoredField>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
struct StoredField {
    name: String,
    value: Value,
}

impl StoredEntity {
    fn encode(entity: &Entity) -> Result<Vec<u8>> {
        let stored = StoredEntity {
            kind: entity.kind.clone(),
            id: entity.id,
            fields: entity
                .fields
                .iter()
                .map(|(name, value)| StoredField {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        rkyv::to_bytes::<rkyv::rancor::Error>(&stored)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Entity> {
        // sled hands out unaligned buffers
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let stored = rkyv::from_bytes::<StoredEntity, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(Entity {
            kind: stored.kind,
            id: stored.id,
            fields: stored
                .fields
                .into_iter()
                .map(|f| (f.name, f.value))
                .collect(),
        })
    }
}

/// Driver persisting rows in sled.
pub struct SledDriver {
    db: Db,
}

impl SledDriver {
    /// Open or create a database.
    pub fn open(config: SledConfig) -> Result<Self> {
        let db = config.to_sled_config().open()?;
        debug!(path = %config.path.display(), temporary = config.temporary, "opened sled driver");
        Ok(Self { db })
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    fn rows(&self, table: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("rows:{table}"))?)
    }

    fn ids(&self, table: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("ids:{table}"))?)
    }

    fn seq_of(&self, table: &str, id: i64) -> Result<Option<sled::IVec>> {
        Ok(self.ids(table)?.get(id.to_be_bytes())?)
    }
}

impl StoreDriver for SledDriver {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn prepare(&mut self, schema: &Schema) -> Result<()> {
        for entity in schema.entities.values() {
            self.rows(&entity.table)?;
            self.ids(&entity.table)?;
        }
        Ok(())
    }

    fn get(&self, table: &str, id: i64) -> Result<Option<Entity>> {
        let Some(seq) = self.seq_of(table, id)? else {
            return Ok(None);
        };
        match self.rows(table)?.get(seq)? {
            Some(bytes) => Ok(Some(StoredEntity::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self, table: &str, filter: Option<FilterExpr>) -> Result<EntityIter<'_>> {
        let rows = self.rows(table)?;
        Ok(Box::new(rows.iter().filter_map(move |item| {
            let entity = item
                .map_err(Error::from)
                .and_then(|(_, bytes)| StoredEntity::decode(&bytes));
            match (entity, &filter) {
                (Ok(e), Some(f)) if !FilterEvaluator::evaluate(f, &e) => None,
                (result, _) => Some(result),
            }
        })))
    }

    fn insert(&mut self, table: &str, entity: Entity) -> Result<()> {
        let ids = self.ids(table)?;
        let id_key = entity.id.to_be_bytes();
        if ids.contains_key(id_key)? {
            return Err(ConstraintError::DuplicateIdentity {
                entity: entity.kind,
                id: entity.id,
            }
            .into());
        }

        let seq = self.db.generate_id()?.to_be_bytes();
        self.rows(table)?.insert(seq, StoredEntity::encode(&entity)?)?;
        ids.insert(id_key, &seq[..])?;
        Ok(())
    }

    fn replace(&mut self, table: &str, entity: Entity) -> Result<bool> {
        let Some(seq) = self.seq_of(table, entity.id)? else {
            return Ok(false);
        };
        self.rows(table)?.insert(seq, StoredEntity::encode(&entity)?)?;
        Ok(true)
    }

    fn delete(&mut self, table: &str, id: i64) -> Result<bool> {
        let Some(seq) = self.ids(table)?.remove(id.to_be_bytes())? else {
            return Ok(false);
        };
        self.rows(table)?.remove(seq)?;
        Ok(true)
    }
}
