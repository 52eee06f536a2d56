//! SQLite backend for the trivia engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Also provides a read-only view over
//! the separate game-statistics database used to answer dynamic questions.

mod encode;
mod schema;
mod stats;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use stats::{QUERY_TYPES, SqliteStatsService};
pub use store::SqliteStore;
