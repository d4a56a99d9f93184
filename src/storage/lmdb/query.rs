// storage/lmdb/query.rs

use std::collections::BTreeSet;
use log::{debug, trace};
use lmdb_rkv::{Transaction, Cursor, Error as LmdbError};

use crate::error::{Error, Result};
use crate::types::{CollocateGroup, CollocatePair, TextRecord, WindowFact};

use super::LMDBStorage;
use super::batch::read_u64;

impl LMDBStorage {
    /// Visit every record in id order within one read transaction
    pub fn for_each_record(&self, visit: &mut dyn FnMut(TextRecord) -> Result<()>) -> Result<()> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut visited = 0usize;
        {
            let mut cursor = txn.open_ro_cursor(self.records_db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;

            for result in cursor.iter_start() {
                let (_, value) = result
                    .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                self.metrics.record_bytes_read(value.len());
                visit(Self::deserialize::<TextRecord>(value)?)?;
                visited += 1;
            }
        } // Cursor is dropped here

        txn.abort();
        self.metrics.increment_reads();
        trace!("Visited {} records", visited);
        Ok(())
    }

    /// Member ids of a tabulated term, `None` if the term is unknown
    pub fn term_members(&self, term: &str) -> Result<Option<Vec<String>>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let key = match txn.get(self.terms_db, &term) {
            Ok(bytes) => Self::create_term_key(read_u64(bytes)?),
            Err(LmdbError::NotFound) => return Ok(None),
            Err(e) => return Err(Error::Database(format!("Failed to look up term {}: {}", term, e))),
        };

        let members = match txn.get(self.term_members_db, &key) {
            Ok(bytes) => Self::deserialize::<Vec<String>>(bytes)?,
            Err(e) => {
                return Err(Error::storage(format!(
                    "Term '{}' has no member list: {}", term, e
                )));
            }
        };

        txn.abort();
        self.metrics.increment_reads();
        Ok(Some(members))
    }

    /// All tabulated terms, sorted
    pub fn list_terms(&self) -> Result<Vec<String>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut terms = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.terms_db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;
            for result in cursor.iter_start() {
                let (key, _) = result
                    .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                let term = String::from_utf8(key.to_vec())
                    .map_err(|e| Error::storage(format!("Stored term is not UTF-8: {}", e)))?;
                terms.push(term);
            }
        }

        txn.abort();
        Ok(terms)
    }

    /// Facts of one pair via a prefix scan of the windows table
    pub fn window_facts(&self, pair: &CollocatePair) -> Result<Vec<WindowFact>> {
        let prefix = Self::fact_prefix(pair)?;

        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut facts = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.windows_db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;

            for result in cursor.iter_from(&prefix) {
                let (key, value) = result
                    .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                facts.push(Self::decode_fact(key, value)?);
            }
        }

        txn.abort();
        self.metrics.increment_reads();

        // Keys order by encoded length first; callers expect id order.
        facts.sort_by(|a, b| a.text_id.cmp(&b.text_id));
        debug!("Read {} facts for {}", facts.len(), pair);
        Ok(facts)
    }

    /// Distinct pairs present in the windows table
    pub fn fact_pairs(&self) -> Result<BTreeSet<CollocatePair>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut pairs = BTreeSet::new();
        {
            let mut cursor = txn.open_ro_cursor(self.windows_db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;

            for result in cursor.iter_start() {
                let (key, value) = result
                    .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                let fact = Self::decode_fact(key, value)?;
                pairs.insert(fact.pair);
            }
        }

        txn.abort();
        Ok(pairs)
    }

    pub fn get_group(&self, name: &str) -> Result<Option<CollocateGroup>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let group = match txn.get(self.groups_db, &name) {
            Ok(bytes) => Some(Self::deserialize::<CollocateGroup>(bytes)?),
            Err(LmdbError::NotFound) => None,
            Err(e) => return Err(Error::Database(format!("Failed to read group {}: {}", name, e))),
        };

        txn.abort();
        self.metrics.increment_reads();
        Ok(group)
    }

    pub fn group_names(&self) -> Result<Vec<String>> {
        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut names = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.groups_db)
                .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;
            for result in cursor.iter_start() {
                let (key, _) = result
                    .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                names.push(String::from_utf8_lossy(key).into_owned());
            }
        }

        txn.abort();
        Ok(names)
    }
}
