// storage/lmdb/mod.rs

// Declare submodules
pub mod config;
pub mod init;
pub mod batch;
pub mod query;
pub mod metadata;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use log::info;
use lmdb_rkv::{Environment, Database};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::StopwordConfig;
use crate::error::{Error, Result};
use crate::storage::metrics::StorageMetrics;
use crate::types::{CollocateGroup, CollocatePair, CorpusSchema, TextRecord, WindowFact};
use super::{StorageStats, TableStore, TermID};

/// LMDB-backed table store. One named database per table.
pub struct LMDBStorage {
    pub(crate) env: Arc<Environment>,
    pub(crate) records_db: Database,
    pub(crate) terms_db: Database,
    pub(crate) term_members_db: Database,
    pub(crate) windows_db: Database,
    pub(crate) groups_db: Database,
    pub(crate) metadata_db: Database,
    pub(crate) metrics: Arc<StorageMetrics>,
    pub(crate) db_path: PathBuf,
    pub(crate) map_size: usize,
    pub(crate) batch_size: usize,
}

impl std::fmt::Debug for LMDBStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LMDBStorage")
            .field("db_path", &self.db_path.display())
            .field("map_size", &self.map_size)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl LMDBStorage {
    pub(crate) fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("Bincode serialization failed: {}", e)))
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::Serialization(format!("Bincode deserialization failed: {}", e)))
    }

    pub(crate) fn create_term_key(id: TermID) -> [u8; 8] {
        id.to_be_bytes()
    }

    /// Key prefix shared by all facts of `pair`
    pub(crate) fn fact_prefix(pair: &CollocatePair) -> Result<Vec<u8>> {
        Self::serialize(&(&pair.pattern1, &pair.pattern2))
    }

    /// Full fact key. The pair encoding is a byte prefix of this key, so a
    /// cursor positioned at `fact_prefix` walks exactly one pair's facts.
    pub(crate) fn fact_key(pair: &CollocatePair, text_id: Option<&String>) -> Result<Vec<u8>> {
        Self::serialize(&(&pair.pattern1, &pair.pattern2, text_id))
    }

    pub(crate) fn decode_fact(key: &[u8], value: &[u8]) -> Result<WindowFact> {
        let (pattern1, pattern2, text_id): (String, String, Option<String>) = Self::deserialize(key)?;
        let window: Option<u32> = Self::deserialize(value)?;
        Ok(WindowFact {
            text_id,
            pair: CollocatePair { pattern1, pattern2 },
            window,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Explicitly close the database connection
    pub fn close(&mut self) -> Result<()> {
        info!("Closing LMDB database at {:?}", self.db_path);
        self.env.sync(true)
            .map_err(|e| Error::Database(format!("Failed to sync environment: {}", e)))?;
        Ok(())
    }
}

impl TableStore for LMDBStorage {
    fn store_schema(&mut self, schema: &CorpusSchema) -> Result<()> {
        self.store_schema(schema)
    }

    fn load_schema(&self) -> Result<Option<CorpusSchema>> {
        self.load_schema()
    }

    fn store_stopwords(&mut self, stopwords: &StopwordConfig) -> Result<()> {
        self.store_stopwords(stopwords)
    }

    fn load_stopwords(&self) -> Result<Option<StopwordConfig>> {
        self.load_stopwords()
    }

    fn store_records_batch(&mut self, records: &[TextRecord]) -> Result<()> {
        self.store_records_batch(records)
    }

    fn get_records_batch(&self, ids: &[String]) -> Result<Vec<TextRecord>> {
        self.get_records_batch(ids)
    }

    fn for_each_record(&self, visit: &mut dyn FnMut(TextRecord) -> Result<()>) -> Result<()> {
        self.for_each_record(visit)
    }

    fn record_count(&self) -> Result<u64> {
        self.record_count()
    }

    fn term_members(&self, term: &str) -> Result<Option<Vec<String>>> {
        self.term_members(term)
    }

    fn store_term(&mut self, term: &str, members: &[String]) -> Result<TermID> {
        self.store_term(term, members)
    }

    fn list_terms(&self) -> Result<Vec<String>> {
        self.list_terms()
    }

    fn replace_window_facts(&mut self, pair: &CollocatePair, facts: &[WindowFact]) -> Result<()> {
        self.replace_window_facts(pair, facts)
    }

    fn window_facts(&self, pair: &CollocatePair) -> Result<Vec<WindowFact>> {
        self.window_facts(pair)
    }

    fn fact_pairs(&self) -> Result<BTreeSet<CollocatePair>> {
        self.fact_pairs()
    }

    fn clear_window_facts(&mut self) -> Result<()> {
        self.clear_window_facts()
    }

    fn store_group(&mut self, group: &CollocateGroup) -> Result<()> {
        self.store_group(group)
    }

    fn get_group(&self, name: &str) -> Result<Option<CollocateGroup>> {
        self.get_group(name)
    }

    fn group_names(&self) -> Result<Vec<String>> {
        self.group_names()
    }

    fn clear_groups(&mut self) -> Result<()> {
        self.clear_groups()
    }

    fn get_stats(&self) -> Result<StorageStats> {
        self.calculate_storage_stats()
    }

    fn close(&mut self) -> Result<()> {
        self.close()
    }
}
