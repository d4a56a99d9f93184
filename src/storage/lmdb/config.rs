// storage/lmdb/config.rs

use log::debug;
use lmdb_rkv::EnvironmentFlags;
use crate::config::subsystems::storage::StorageConfig;

// Database names
pub const DB_RECORDS: &str = "records";            // record id -> TextRecord
pub const DB_TERMS: &str = "terms";                // term -> surrogate id
pub const DB_TERM_MEMBERS: &str = "term_members";  // surrogate id -> sorted record ids
pub const DB_WINDOWS: &str = "windows";            // (p1, p2, id) -> window
pub const DB_GROUPS: &str = "groups";              // group name -> CollocateGroup
pub const DB_METADATA: &str = "metadata";          // schema and counters

pub const ALL_DBS: [&str; 6] = [
    DB_RECORDS, DB_TERMS, DB_TERM_MEMBERS, DB_WINDOWS, DB_GROUPS, DB_METADATA,
];

// Metadata keys
pub const META_SCHEMA: &[u8] = b"schema";
pub const META_RECORD_COUNT: &[u8] = b"record_count";
pub const META_NEXT_TERM_ID: &[u8] = b"next_term_id";
pub const META_STOPWORDS: &[u8] = b"stopwords";      // JSON StopwordConfig

// Default flags
pub fn default_env_flags() -> EnvironmentFlags {
    EnvironmentFlags::NO_TLS |
    EnvironmentFlags::NO_READAHEAD
}

/// (flags, max_readers, max_dbs, map_size in bytes)
pub fn create_env_options(config: &StorageConfig) -> (EnvironmentFlags, u32, u32, usize) {
    let mut flags = default_env_flags();

    if !config.use_fsync {
        flags |= EnvironmentFlags::NO_SYNC;
    }

    let map_size = config.map_size_mb * 1024 * 1024;

    debug!("Created LMDB environment options:");
    debug!("  Flags: {:?}", flags);
    debug!("  Max readers: {}", config.max_readers);
    debug!("  Max DBs: {}", config.max_dbs);
    debug!("  Map size: {} bytes", map_size);

    (flags, config.max_readers, config.max_dbs, map_size)
}
