// storage/lmdb/init.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::{info, debug, error};
use lmdb_rkv::{Environment, Database, DatabaseFlags, EnvironmentFlags, Error as LmdbError};

use crate::error::{Error, Result};
use crate::config::subsystems::storage::StorageConfig;
use crate::storage::metrics::StorageMetrics;

use super::LMDBStorage;
use super::config::{
    create_env_options,
    ALL_DBS,
    DB_GROUPS,
    DB_METADATA,
    DB_RECORDS,
    DB_TERMS,
    DB_TERM_MEMBERS,
    DB_WINDOWS,
};

impl LMDBStorage {
    /// Creates a new, empty store. The directory must not exist yet.
    pub fn create<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();

        if path_buf.exists() {
            return Err(Error::AlreadyExists(format!(
                "Database file {:?} already exists", path_buf
            )));
        }

        fs::create_dir_all(&path_buf)
            .map_err(|e| Error::storage(format!("Failed to create database directory: {}", e)))?;

        let storage = match Self::initialize(&path_buf, config, true)
            .and_then(|storage| storage.init_counters().map(|_| storage))
        {
            Ok(storage) => storage,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&path_buf) {
                    error!("Failed to remove partial store {:?}: {}", path_buf, cleanup);
                }
                return Err(e);
            }
        };

        info!("Created LMDB storage at {:?}", path_buf);
        Ok(storage)
    }

    /// Opens a store created earlier by `create`.
    pub fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();

        if !path_buf.is_dir() {
            return Err(Error::NotFound(format!("Database {:?} does not exist", path_buf)));
        }

        let storage = Self::initialize(&path_buf, config, false)?;
        info!("Opened LMDB storage at {:?}", path_buf);
        Ok(storage)
    }

    fn initialize(path: &Path, config: &StorageConfig, create: bool) -> Result<Self> {
        let (env_flags, max_readers, max_dbs, map_size) = create_env_options(config);

        info!(
            "Opening LMDB environment at {:?} with map_size={} MB, max_readers={}, max_dbs={}",
            path,
            map_size / (1024 * 1024),
            max_readers,
            max_dbs
        );

        let env = Self::create_environment(path, env_flags, max_readers, max_dbs, map_size)?;

        let handle = |name: &str| -> Result<Database> {
            if create {
                Self::create_database(&env, name)
            } else {
                Self::open_database(&env, name)
            }
        };

        let records_db = handle(DB_RECORDS)?;
        let terms_db = handle(DB_TERMS)?;
        let term_members_db = handle(DB_TERM_MEMBERS)?;
        let windows_db = handle(DB_WINDOWS)?;
        let groups_db = handle(DB_GROUPS)?;
        let metadata_db = handle(DB_METADATA)?;

        debug!("All {} databases available", ALL_DBS.len());

        Ok(Self {
            env: Arc::new(env),
            records_db,
            terms_db,
            term_members_db,
            windows_db,
            groups_db,
            metadata_db,
            metrics: Arc::new(StorageMetrics::default()),
            db_path: path.to_path_buf(),
            map_size,
            batch_size: config.batch_size,
        })
    }

    /// Helper method to create an LMDB environment with error handling
    fn create_environment(
        path: &Path,
        flags: EnvironmentFlags,
        max_readers: u32,
        max_dbs: u32,
        map_size: usize
    ) -> Result<Environment> {
        debug!("Creating LMDB environment at {:?}", path);

        match Environment::new()
            .set_flags(flags)
            .set_max_readers(max_readers)
            .set_max_dbs(max_dbs)
            .set_map_size(map_size)
            .open(path) {
            Ok(env) => {
                debug!("Successfully created LMDB environment");
                Ok(env)
            },
            Err(e) => {
                match e {
                    LmdbError::VersionMismatch | LmdbError::Incompatible => {
                        error!("LMDB version mismatch. Database was created with an incompatible version.");
                        Err(Error::storage(format!("LMDB version mismatch: {}", e)))
                    },
                    LmdbError::Invalid => {
                        error!("{:?} is not an LMDB environment", path);
                        Err(Error::storage(format!("Not a corpus database: {:?}", path)))
                    },
                    _ => {
                        error!("Failed to open LMDB environment: {}", e);
                        Err(Error::storage(format!("Failed to open LMDB environment: {}", e)))
                    }
                }
            }
        }
    }

    /// Helper method to create a database handle with error handling
    fn create_database(env: &Environment, name: &str) -> Result<Database> {
        debug!("Creating database: {}", name);

        env.create_db(Some(name), DatabaseFlags::empty()).map_err(|e| match e {
            LmdbError::DbsFull => {
                error!("Maximum number of databases reached. Increase max_dbs in configuration.");
                Error::Database(format!("LMDB max databases reached: {}", e))
            },
            _ => {
                error!("Failed to create database {}: {}", name, e);
                Error::Database(format!("Failed to create database {}: {}", name, e))
            }
        })
    }

    fn open_database(env: &Environment, name: &str) -> Result<Database> {
        env.open_db(Some(name)).map_err(|e| match e {
            LmdbError::NotFound => {
                error!("Database {} missing from store", name);
                Error::storage(format!("Database {} not found; store is incomplete", name))
            },
            _ => Error::Database(format!("Failed to open database {}: {}", name, e)),
        })
    }

    /// Check if the LMDB environment is close to its map size
    pub fn map_usage_percentage(&self) -> Result<f64> {
        let env_stat = self.env.stat()
            .map_err(|e| Error::Database(format!("Failed to get environment stats: {}", e)))?;

        let pages_used = env_stat.branch_pages() + env_stat.leaf_pages() + env_stat.overflow_pages();
        let page_size = env_stat.page_size().max(1) as usize;
        let total_pages = (self.map_size / page_size).max(1);
        let used_percent = (pages_used as f64 * 100.0) / total_pages as f64;

        debug!("LMDB map usage: {:.1}% ({} of {} pages)", used_percent, pages_used, total_pages);
        Ok(used_percent)
    }
}
