// storage/lmdb/batch.rs

use log::{info, debug, trace};
use lmdb_rkv::{Cursor, RwTransaction, Transaction, WriteFlags, Error as LmdbError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::storage::TermID;
use crate::types::{CollocateGroup, CollocatePair, TextRecord, WindowFact};

use super::LMDBStorage;
use super::config::{META_NEXT_TERM_ID, META_RECORD_COUNT};

// Constants for transaction retry logic
const MAX_RETRY_ATTEMPTS: usize = 5;
const BASE_RETRY_DELAY_MS: u64 = 10;

impl LMDBStorage {
    /// Runs `op` inside one write transaction, committing on success and
    /// aborting on error. Retries when the map was resized underneath us.
    pub(crate) fn with_write_txn<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut RwTransaction<'_>) -> Result<T>,
    {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut txn = match self.env.begin_rw_txn() {
                Ok(txn) => txn,
                Err(e) => {
                    if should_retry_transaction_error(&e) && attempt < MAX_RETRY_ATTEMPTS {
                        debug!("{}: transaction start failed (attempt {}), retrying: {}", label, attempt, e);
                        apply_retry_backoff(attempt);
                        continue;
                    }
                    self.metrics.increment_failed_ops();
                    return Err(Error::Database(format!("Failed to start write transaction: {}", e)));
                }
            };

            let value = match op(&mut txn) {
                Ok(value) => value,
                Err(e) => {
                    txn.abort();
                    self.metrics.increment_failed_ops();
                    return Err(e);
                }
            };

            match txn.commit() {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("{}: transaction succeeded after {} attempts in {:?}",
                               label, attempt, start_time.elapsed());
                    }
                    return Ok(value);
                },
                Err(e) => {
                    if should_retry_transaction_error(&e) && attempt < MAX_RETRY_ATTEMPTS {
                        debug!("{}: commit failed (attempt {}), retrying: {}", label, attempt, e);
                        apply_retry_backoff(attempt);
                        continue;
                    }
                    self.metrics.increment_failed_ops();
                    return Err(Error::Database(format!("Failed to commit {}: {}", label, e)));
                }
            }
        }
    }

    /// Stores records in chunks of `batch_size`, one transaction per chunk.
    pub fn store_records_batch(&mut self, records: &[TextRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let start_time = Instant::now();
        let batch_size = self.batch_size.max(1);

        for (i, chunk) in records.chunks(batch_size).enumerate() {
            trace!("Storing record batch {}: {} records", i + 1, chunk.len());

            let bytes = self.with_write_txn("record batch", |txn| {
                let mut bytes = 0;
                for record in chunk {
                    let serialized = Self::serialize(record)?;
                    bytes += serialized.len();
                    txn.put(self.records_db, &record.id, &serialized, WriteFlags::NO_OVERWRITE)
                        .map_err(|e| match e {
                            LmdbError::KeyExist => Error::input(format!(
                                "Duplicate id '{}' in corpus", record.id
                            )),
                            e => Error::Database(format!("Failed to store record: {}", e)),
                        })?;
                }

                let count = Self::read_counter(&*txn, self.metadata_db, META_RECORD_COUNT)?;
                Self::write_counter(txn, self.metadata_db, META_RECORD_COUNT, count + chunk.len() as u64)?;
                Ok(bytes)
            })?;

            self.metrics.add_records(chunk.len());
            self.metrics.record_bytes_written(bytes);
        }

        debug!("Stored {} records in {} batches (took {:?})",
            records.len(),
            (records.len() + batch_size - 1) / batch_size,
            start_time.elapsed());

        Ok(())
    }

    /// Retrieve records by id, in the order requested
    pub fn get_records_batch(&self, ids: &[String]) -> Result<Vec<TextRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.env.begin_ro_txn()
            .map_err(|e| Error::Database(format!("Failed to start read transaction: {}", e)))?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match txn.get(self.records_db, id) {
                Ok(value) => {
                    self.metrics.record_bytes_read(value.len());
                    records.push(Self::deserialize::<TextRecord>(value)?);
                },
                Err(LmdbError::NotFound) => {
                    trace!("Record {} not found", id);
                },
                Err(e) => {
                    return Err(Error::Database(format!("Failed to read record {}: {}", id, e)));
                }
            }
        }

        txn.abort();
        self.metrics.increment_reads();

        debug!("Retrieved {} records from {} requested ids", records.len(), ids.len());
        Ok(records)
    }

    /// Stores a term and its member ids. Storing a known term returns its
    /// existing key and leaves the members untouched.
    pub fn store_term(&mut self, term: &str, members: &[String]) -> Result<TermID> {
        let members_bytes = Self::serialize(members)?;

        let id = self.with_write_txn("term", |txn| {
            match txn.get(self.terms_db, &term) {
                Ok(existing) => {
                    let id = read_u64(existing)?;
                    debug!("Term '{}' already stored under {}", term, id);
                    return Ok(id);
                },
                Err(LmdbError::NotFound) => {},
                Err(e) => return Err(Error::Database(format!("Failed to look up term: {}", e))),
            }

            let id = Self::read_counter(&*txn, self.metadata_db, META_NEXT_TERM_ID)?;
            let key = Self::create_term_key(id);

            txn.put(self.term_members_db, &key, &members_bytes, WriteFlags::empty())
                .map_err(|e| Error::Database(format!("Failed to store term members: {}", e)))?;
            txn.put(self.terms_db, &term, &key, WriteFlags::empty())
                .map_err(|e| Error::Database(format!("Failed to store term: {}", e)))?;
            Self::write_counter(txn, self.metadata_db, META_NEXT_TERM_ID, id + 1)?;
            Ok(id)
        })?;

        self.metrics.increment_terms();
        self.metrics.record_bytes_written(members_bytes.len());
        info!("Stored term '{}' as {} with {} member texts", term, id, members.len());
        Ok(id)
    }

    /// Deletes all facts of `pair` and writes `facts` in the same transaction.
    pub fn replace_window_facts(&mut self, pair: &CollocatePair, facts: &[WindowFact]) -> Result<()> {
        let prefix = Self::fact_prefix(pair)?;

        let mut encoded = Vec::with_capacity(facts.len());
        for fact in facts {
            if &fact.pair != pair {
                return Err(Error::storage(format!(
                    "Fact for {} stored under pair {}", fact.pair, pair
                )));
            }
            encoded.push((
                Self::fact_key(pair, fact.text_id.as_ref())?,
                Self::serialize(&fact.window)?,
            ));
        }

        let removed = self.with_write_txn("window facts", |txn| {
            let stale: Vec<Vec<u8>> = {
                let mut cursor = txn.open_ro_cursor(self.windows_db)
                    .map_err(|e| Error::Database(format!("Failed to create cursor: {}", e)))?;
                let mut keys = Vec::new();
                for result in cursor.iter_from(&prefix) {
                    let (key, _) = result
                        .map_err(|e| Error::Database(format!("Error iterating cursor: {}", e)))?;
                    if !key.starts_with(&prefix) {
                        break;
                    }
                    keys.push(key.to_vec());
                }
                keys
            };

            for key in &stale {
                txn.del(self.windows_db, key, None)
                    .map_err(|e| Error::Database(format!("Failed to delete fact: {}", e)))?;
            }

            for (key, value) in &encoded {
                txn.put(self.windows_db, key, value, WriteFlags::empty())
                    .map_err(|e| Error::Database(format!("Failed to store fact: {}", e)))?;
            }
            Ok(stale.len())
        })?;

        self.metrics.add_facts(facts.len());
        debug!("Replaced {} facts of {} with {}", removed, pair, facts.len());
        Ok(())
    }

    /// Stores a new collocate group; names are unique.
    pub fn store_group(&mut self, group: &CollocateGroup) -> Result<()> {
        let serialized = Self::serialize(group)?;

        self.with_write_txn("group", |txn| {
            txn.put(self.groups_db, &group.name, &serialized, WriteFlags::NO_OVERWRITE)
                .map_err(|e| match e {
                    LmdbError::KeyExist => Error::AlreadyExists(format!(
                        "Collocate group '{}' already exists", group.name
                    )),
                    e => Error::Database(format!("Failed to store group: {}", e)),
                })
        })?;

        self.metrics.record_bytes_written(serialized.len());
        info!("Stored collocate group '{}' with {} token rows", group.name, group.tokens.len());
        Ok(())
    }
}

pub(crate) fn read_u64(bytes: &[u8]) -> Result<u64> {
    if bytes.len() != 8 {
        return Err(Error::storage(format!("Expected an 8-byte key, got {} bytes", bytes.len())));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

/// Helper function to determine if a transaction error is retryable
fn should_retry_transaction_error(error: &LmdbError) -> bool {
    matches!(error, LmdbError::MapResized)
}

/// Helper function to apply exponential backoff for retries
fn apply_retry_backoff(attempt: usize) {
    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt as u32 - 1);
    debug!("Transaction retry {} - sleeping for {}ms", attempt, delay_ms);
    std::thread::sleep(Duration::from_millis(delay_ms));
}
