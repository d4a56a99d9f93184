pub mod storage;
pub mod stopwords;
pub mod processing;

pub use storage::StorageConfig;
pub use stopwords::StopwordConfig;
pub use processing::ProcessingConfig;
