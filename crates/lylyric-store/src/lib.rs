//! Ly-Lyric Store: local SQLite lyrics table with FTS5 ranking.
//!
//! Stands in for the hosted warehouse and search service during
//! development and in tests.

pub mod schema;
pub mod sqlite;

pub use sqlite::{content_hash, SqliteStore, StoreStats};
