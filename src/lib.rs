//! sca is a library for collocation analysis over a tabular text corpus.
//! It seeds an LMDB store from a CSV/TSV file, records the minimum token
//! distance between pairs of wildcard patterns in every text, and counts
//! matching texts across the corpus's categorical columns.

// Module declarations
pub mod error;
pub mod types;
pub mod parser;
pub mod config;
pub mod storage;
pub mod collocate;
pub mod loader;
pub mod corpus;

// Re-exports
pub use error::{Error, Result};
pub use corpus::Corpus;
pub use parser::{Language, StopwordSet, WildcardPattern};
pub use types::{
    AddReport, CollocateGroup, CollocatePair, CollocateSpec, Condition, CorpusSchema, GroupCount,
    GroupToken, SubgroupCount, TextRecord, WindowFact, WindowSummary,
};

// Re-export the config from config module
pub use config::{ScaConfig, Settings};
