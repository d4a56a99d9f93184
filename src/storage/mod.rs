// storage/mod.rs

pub mod metrics;
pub mod lmdb;

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::subsystems::storage::StorageConfig;
use crate::config::StopwordConfig;
use crate::error::Result;
use crate::types::{CollocateGroup, CollocatePair, CorpusSchema, TextRecord, WindowFact};
use self::metrics::MetricsSnapshot;

/// Surrogate key of a tabulated term.
pub type TermID = u64;

/// Statistics about the storage backend
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub records: u64,
    pub terms: u64,
    pub window_facts: u64,
    pub groups: u64,
    pub map_usage_percent: f64,
    pub metrics: MetricsSnapshot,
}

/// Table store behind a corpus. Every mutating call is one transaction.
pub trait TableStore: Send + Sync {
    /// Persist the column layout fixed at seed time
    fn store_schema(&mut self, schema: &CorpusSchema) -> Result<()>;

    fn load_schema(&self) -> Result<Option<CorpusSchema>>;

    /// Persist the stopword policy the stored window facts were computed under
    fn store_stopwords(&mut self, stopwords: &StopwordConfig) -> Result<()>;

    fn load_stopwords(&self) -> Result<Option<StopwordConfig>>;

    /// Insert records; an id that is already stored is an input error
    fn store_records_batch(&mut self, records: &[TextRecord]) -> Result<()>;

    /// Fetch records by id, skipping ids that are not stored
    fn get_records_batch(&self, ids: &[String]) -> Result<Vec<TextRecord>>;

    /// Visit every record in id order
    fn for_each_record(&self, visit: &mut dyn FnMut(TextRecord) -> Result<()>) -> Result<()>;

    fn record_count(&self) -> Result<u64>;

    /// Sorted ids of the records whose text contains `term`, if tabulated
    fn term_members(&self, term: &str) -> Result<Option<Vec<String>>>;

    /// Store a new term with its member ids under a fresh surrogate key
    fn store_term(&mut self, term: &str, members: &[String]) -> Result<TermID>;

    fn list_terms(&self) -> Result<Vec<String>>;

    /// Drop every fact of `pair`, then upsert `facts` keyed by (id, pair)
    fn replace_window_facts(&mut self, pair: &CollocatePair, facts: &[WindowFact]) -> Result<()>;

    /// Facts of one pair, sentinel included, ordered by text id
    fn window_facts(&self, pair: &CollocatePair) -> Result<Vec<WindowFact>>;

    /// Every pair that has at least one fact (real or sentinel)
    fn fact_pairs(&self) -> Result<BTreeSet<CollocatePair>>;

    fn clear_window_facts(&mut self) -> Result<()>;

    /// Insert a new group; an existing name is an error
    fn store_group(&mut self, group: &CollocateGroup) -> Result<()>;

    fn get_group(&self, name: &str) -> Result<Option<CollocateGroup>>;

    fn group_names(&self) -> Result<Vec<String>>;

    fn clear_groups(&mut self) -> Result<()>;

    /// Get storage statistics
    fn get_stats(&self) -> Result<StorageStats>;

    /// Explicitly close the database
    fn close(&mut self) -> Result<()>;
}

/// Create a fresh store at `path`, which must not exist yet
pub fn create_storage<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<lmdb::LMDBStorage> {
    lmdb::LMDBStorage::create(path, config)
}

/// Open an existing store
pub fn open_storage<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<lmdb::LMDBStorage> {
    lmdb::LMDBStorage::open(path, config)
}
