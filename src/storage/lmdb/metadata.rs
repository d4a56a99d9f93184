// storage/lmdb/metadata.rs

use log::{info, debug, warn};
use lmdb_rkv::{Cursor, Database, RwTransaction, Transaction, WriteFlags, Error as LmdbError};

use crate::config::StopwordConfig;
use crate::error::{Error, Result};
use crate::storage::StorageStats;
use crate::types::CorpusSchema;

use super::LMDBStorage;
use super::batch::read_u64;
use super::config::{DB_GROUPS, DB_WINDOWS, META_NEXT_TERM_ID, META_RECORD_COUNT, META_SCHEMA, META_STOPWORDS};

impl LMDBStorage {
    /// Counter stored under `key`, 0 when absent
    pub(crate) fn read_counter<T: Transaction>(txn: &T, db: Database, key: &[u8]) -> Result<u64> {
        match txn.get(db, &key) {
            Ok(bytes) => read_u64(bytes),
            Err(LmdbError::NotFound) => Ok(0),
            Err(e) => Err(Error::Database(format!("Failed to read counter: {}", e))),
        }
    }

    pub(crate) fn write_counter(txn: &mut RwTransaction<'_>, db: Database, key: &[u8], value: u64) -> Result<()> {
        txn.put(db, &key, &value.to_be_bytes(), WriteFlags::empty())
            .map_err(|e| Error::Database(format!("Failed to write counter: {}", e)))
    }

    pub(crate) fn init_counters(&self) -> Result<()> {
        self.with_write_txn("counters", |txn| {
            Self::write_counter(txn, self.metadata_db, META_RECORD_COUNT, 0)?;
            Self::write_counter(txn, self.metadata_db, META_NEXT_TERM_ID, 0)
        })
    }

    pub fn store_schema(&mut self, schema: &CorpusSchema) -> Result<()> {
        let serialized = Self::serialize(schema)?;
        self.with_write_txn("schema", |txn| {
            txn.put(self.metadata_db, &META_SCHEMA, &serialized, WriteFlags::empty())
                .map_err(|e| Error::Database(format!("Failed to store schema: {}", e)))
        })?;

        info!("Stored schema: id={} text={} columns={:?}",
              schema.id_col, schema.text_column, schema.columns);
        Ok(())
    }

    pub fn load_schema(&self) -> Result<Option<CorpusSchema>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let schema = match txn.get(self.metadata_db, &META_SCHEMA) {
            Ok(bytes) => Some(Self::deserialize::<CorpusSchema>(bytes)?),
            Err(LmdbError::NotFound) => None,
            Err(e) => return Err(Error::Database(format!("Failed to read schema: {}", e))),
        };

        txn.abort();
        Ok(schema)
    }

    /// Stopword policy that numbered the stored window positions. Kept as
    /// JSON because the config skips absent optional fields.
    pub fn store_stopwords(&mut self, stopwords: &StopwordConfig) -> Result<()> {
        let serialized = serde_json::to_vec(stopwords)?;
        self.with_write_txn("stopwords", |txn| {
            txn.put(self.metadata_db, &META_STOPWORDS, &serialized, WriteFlags::empty())
                .map_err(|e| Error::Database(format!("Failed to store stopwords: {}", e)))
        })?;

        debug!("Stored stopword policy: language={} custom={} removed={}",
               stopwords.language, stopwords.custom.len(), stopwords.removed.len());
        Ok(())
    }

    pub fn load_stopwords(&self) -> Result<Option<StopwordConfig>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let stopwords = match txn.get(self.metadata_db, &META_STOPWORDS) {
            Ok(bytes) => Some(serde_json::from_slice::<StopwordConfig>(bytes)?),
            Err(LmdbError::NotFound) => None,
            Err(e) => return Err(Error::Database(format!("Failed to read stopwords: {}", e))),
        };

        txn.abort();
        Ok(stopwords)
    }

    pub fn record_count(&self) -> Result<u64> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;
        let count = Self::read_counter(&txn, self.metadata_db, META_RECORD_COUNT)?;
        txn.abort();
        Ok(count)
    }

    pub fn clear_window_facts(&mut self) -> Result<()> {
        self.with_write_txn("clear windows", |txn| {
            txn.clear_db(self.windows_db)
                .map_err(|e| Error::Database(format!("Failed to clear {}: {}", DB_WINDOWS, e)))
        })?;
        info!("Cleared all window facts");
        Ok(())
    }

    pub fn clear_groups(&mut self) -> Result<()> {
        self.with_write_txn("clear groups", |txn| {
            txn.clear_db(self.groups_db)
                .map_err(|e| Error::Database(format!("Failed to clear {}: {}", DB_GROUPS, e)))
        })?;
        info!("Cleared all collocate groups");
        Ok(())
    }

    fn count_entries(&self, db: Database) -> Result<u64> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;
        let mut count = 0u64;
        {
            let mut cursor = txn.open_ro_cursor(db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;
            for result in cursor.iter_start() {
                result.map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                count += 1;
            }
        }
        txn.abort();
        Ok(count)
    }

    pub fn calculate_storage_stats(&self) -> Result<StorageStats> {
        let stats = StorageStats {
            records: self.record_count()?,
            terms: self.count_entries(self.terms_db)?,
            window_facts: self.count_entries(self.windows_db)?,
            groups: self.count_entries(self.groups_db)?,
            map_usage_percent: self.map_usage_percentage()?,
            metrics: self.metrics.snapshot(),
        };

        debug!("Storage stats: {:?}", stats);
        if stats.metrics.failed_operations > 0 {
            warn!("{} of {} storage operations failed ({:.2}%)",
                  stats.metrics.failed_operations,
                  stats.metrics.write_operations() + stats.metrics.read_operations,
                  stats.metrics.failure_rate() * 100.0);
        }
        Ok(stats)
    }
}
