//! Ly-Lyric Core: song records, configuration, errors and the service seams
//! (warehouse, search, completion) every backend implements.

pub mod config;
pub mod error;
pub mod input;
pub mod services;
pub mod types;

pub use config::{DataPaths, LylyricConfig, SnowflakeSettings};
pub use error::{Error, Result};
pub use input::{
    validate_identifier, validate_query, validate_text, MAX_LYRICS_CHARS, MAX_QUERY_CHARS,
};
pub use services::{CompletionService, SearchService, UnconfiguredSearch, Warehouse};
pub use types::SongRecord;
