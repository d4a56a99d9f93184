//! The collocation engine's pure parts: position indexing, window
//! computation, pair bookkeeping, query compilation and group rows.
//! Persistence and orchestration live in [`crate::corpus`].

pub mod catalog;
pub mod group;
pub mod positions;
pub mod query;
pub mod window;

pub use self::catalog::{prepare_collocates, CollocateCatalog, PreparedBatch, QueuedPair};
pub use self::positions::{get_positions, pattern_positions};
pub use self::query::{render_group, Filter, Predicate, QueryPlan, MISSING_VALUE};
pub use self::window::{min_window, text_window};
