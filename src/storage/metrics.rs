use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use log::trace;

/// Operation counters for one store
#[derive(Debug)]
pub struct StorageMetrics {
    records_written: AtomicU64,
    terms_written: AtomicU64,
    facts_written: AtomicU64,
    read_ops: AtomicU64,
    failed_ops: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    start_time: Instant,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            terms_written: AtomicU64::new(0),
            facts_written: AtomicU64::new(0),
            read_ops: AtomicU64::new(0),
            failed_ops: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn add_records(&self, count: usize) {
        self.records_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_terms(&self) {
        self.terms_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_facts(&self, count: usize) {
        self.facts_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed_ops(&self) {
        self.failed_ops.fetch_add(1, Ordering::Relaxed);
        trace!("Failed operation recorded. Total failures: {}", self.failed_ops.load(Ordering::Relaxed));
    }

    pub fn record_bytes_written(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            terms_written: self.terms_written.load(Ordering::Relaxed),
            facts_written: self.facts_written.load(Ordering::Relaxed),
            read_operations: self.read_ops.load(Ordering::Relaxed),
            failed_operations: self.failed_ops.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for StorageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub terms_written: u64,
    pub facts_written: u64,
    pub read_operations: u64,
    pub failed_operations: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    pub fn write_operations(&self) -> u64 {
        self.records_written + self.terms_written + self.facts_written
    }

    pub fn failure_rate(&self) -> f64 {
        let total_ops = self.write_operations() + self.read_operations;
        if total_ops == 0 {
            return 0.0;
        }
        self.failed_operations as f64 / total_ops as f64
    }
}
