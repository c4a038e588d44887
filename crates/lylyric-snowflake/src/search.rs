//! Cortex Search over the lyrics table.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{describe_error, SnowflakeClient};
use lylyric_core::{validate_identifier, Error, Result, SearchService, SongRecord};

/// Columns requested from the search service, in display order.
pub const SEARCH_COLUMNS: [&str; 4] = ["lyrics", "song_title", "artist", "album"];

#[derive(Debug, Clone)]
pub struct CortexSearch {
    client: SnowflakeClient,
    service: String,
}

impl CortexSearch {
    pub fn new(client: SnowflakeClient, service: &str) -> Result<Self> {
        validate_identifier(service)?;
        Ok(Self {
            client,
            service: service.to_string(),
        })
    }

    pub fn query_path(&self) -> String {
        let settings = self.client.settings();
        format!(
            "/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            settings.database, settings.schema, self.service
        )
    }

    pub fn query_body(query: &str, limit: usize) -> Value {
        json!({
            "query": query,
            "columns": SEARCH_COLUMNS,
            "limit": limit,
        })
    }
}

/// Decode `{"results": [{column: value, ...}]}`. Column keys may come back
/// in either case.
pub fn parse_results(body: &Value) -> Result<Vec<SongRecord>> {
    let results = body["results"]
        .as_array()
        .ok_or_else(|| Error::Search("Search response has no results array".into()))?;

    let field = |row: &Value, key: &str| -> String {
        row.get(key)
            .or_else(|| row.get(key.to_uppercase().as_str()))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(results
        .iter()
        .map(|row| SongRecord {
            artist: field(row, "artist"),
            album: field(row, "album"),
            song_title: field(row, "song_title"),
            lyrics: field(row, "lyrics"),
        })
        .collect())
}

#[async_trait]
impl SearchService for CortexSearch {
    fn name(&self) -> &'static str {
        "cortex-search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>> {
        let response = self
            .client
            .post(&self.query_path(), &Self::query_body(query, limit))
            .send()
            .await
            .map_err(|e| Error::Http(format!("Search request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Search response read failed: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Search(describe_error(status, &text)));
        }

        let body: Value = serde_json::from_str(&text)?;
        parse_results(&body)
    }
}
