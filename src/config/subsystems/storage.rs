// src/config/subsystems/storage.rs

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    // LMDB environment
    pub map_size_mb: usize,
    pub max_dbs: u32,
    pub max_readers: u32,

    // I/O settings
    pub use_fsync: bool,

    // Records per write transaction while seeding
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            map_size_mb: 4096,
            max_dbs: 16,
            max_readers: 126,
            use_fsync: true,
            batch_size: 1000,
        }
    }
}

impl FromIni for StorageConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "storage" {
            return None;
        }

        match key {
            "map_size_mb" | "lmdb_map_size_mb" => {
                match value.parse() {
                    Ok(size) if size > 0 => {
                        self.map_size_mb = size;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid map_size_mb (must be > 0): {}", value)
                    ))),
                }
            },
            "max_dbs" | "lmdb_max_dbs" => {
                match value.parse() {
                    Ok(dbs) if dbs > 0 => {
                        self.max_dbs = dbs;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid max_dbs (must be > 0): {}", value)
                    ))),
                }
            },
            "max_readers" | "lmdb_max_readers" => {
                match value.parse() {
                    Ok(readers) if readers > 0 => {
                        self.max_readers = readers;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid max_readers (must be > 0): {}", value)
                    ))),
                }
            },
            "use_fsync" => {
                match value.parse() {
                    Ok(flag) => {
                        self.use_fsync = flag;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid use_fsync value (must be true/false): {}", value)
                    ))),
                }
            },
            "batch_size" => {
                match value.parse() {
                    Ok(size) if size > 0 => {
                        self.batch_size = size;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid batch_size (must be > 0): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.map_size_mb < 1 {
            return Err(Error::Config(
                "map_size_mb must be at least 1MB".to_string()
            ));
        }

        // records, terms, term_members, windows, groups, metadata
        if self.max_dbs < 6 {
            return Err(Error::Config(
                format!("max_dbs must be at least 6, got {}", self.max_dbs)
            ));
        }

        if self.batch_size == 0 {
            return Err(Error::Config(
                "batch_size must be greater than 0".to_string()
            ));
        }

        Ok(())
    }

    /// Get a human-readable description of the configuration
    pub fn describe(&self) -> String {
        format!(
            "Storage Configuration:\n\
             - LMDB Map Size: {} MB\n\
             - LMDB Max Readers: {}\n\
             - LMDB Max Databases: {}\n\
             - Sync Mode: {}\n\
             - Batch Size: {}",
            self.map_size_mb,
            self.max_readers,
            self.max_dbs,
            if self.use_fsync { "sync (fsync)" } else { "async" },
            self.batch_size,
        )
    }
}
