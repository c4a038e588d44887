//! Service seams. Each external collaborator sits behind one trait so the
//! request flow never knows which backend it is talking to.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::SongRecord;

/// Relational store holding the lyrics table.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Backend identifier shown on the status endpoint.
    fn name(&self) -> &'static str;

    /// Create the lyrics table if it does not exist yet.
    async fn ensure_table(&self) -> Result<()>;

    /// First row whose lyrics contain `fragment`, case-insensitively.
    async fn find_by_lyrics(&self, fragment: &str) -> Result<Option<SongRecord>>;

    /// Insert rows, returning how many were written.
    async fn insert_songs(&self, songs: &[SongRecord]) -> Result<usize>;

    async fn count_songs(&self) -> Result<u64>;
}

/// Similarity / text search index over lyrics.
#[async_trait]
pub trait SearchService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `limit` records ranked by the service.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>>;
}

/// LLM text completion.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier the next call would use, if a provider is configured.
    fn model(&self) -> Option<String>;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Stand-in used when no search service is configured for the hosted backend.
#[derive(Debug, Default)]
pub struct UnconfiguredSearch;

#[async_trait]
impl SearchService for UnconfiguredSearch {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SongRecord>> {
        Err(Error::Config(
            "No search service configured (set snowflakeconnection.search_service)".into(),
        ))
    }
}
