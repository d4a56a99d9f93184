use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid language code '{0}'")]
    InvalidLanguage(String),

    #[error("Input data error: {0}")]
    InputData(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

// Type alias for Result
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error conversions
impl Error {
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Error::Storage(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn input<S: Into<String>>(msg: S) -> Self {
        Error::InputData(msg.into())
    }

    pub fn pattern<S: Into<String>>(msg: S) -> Self {
        Error::InvalidPattern(msg.into())
    }

    pub fn query<S: Into<String>>(msg: S) -> Self {
        Error::InvalidQuery(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<lmdb_rkv::Error> for Error {
    fn from(err: lmdb_rkv::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(format!("Thread pool build failed: {}", err))
    }
}
