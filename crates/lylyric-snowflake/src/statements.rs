//! SQL API statements: request bodies with positional bindings, execution
//! with bounded polling for asynchronous results, and row decoding.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::client::{describe_error, SnowflakeClient};
use lylyric_core::{Error, Result, SongRecord};

pub const STATEMENTS_PATH: &str = "/api/v2/statements";

/// Server-side statement timeout, seconds.
const STATEMENT_TIMEOUT_SECS: u64 = 60;
const MAX_POLLS: usize = 20;
#[cfg(not(test))]
const POLL_INTERVAL: Duration = Duration::from_millis(500);
#[cfg(test)]
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A positional bind value.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
}

impl Binding {
    fn to_json(&self) -> Value {
        match self {
            Binding::Text(s) => json!({ "type": "TEXT", "value": s }),
        }
    }
}

impl From<&str> for Binding {
    fn from(s: &str) -> Self {
        Binding::Text(s.to_string())
    }
}

impl From<String> for Binding {
    fn from(s: String) -> Self {
        Binding::Text(s)
    }
}

/// Build the `POST /api/v2/statements` body.
pub fn statement_body(client: &SnowflakeClient, sql: &str, bindings: &[Binding]) -> Value {
    let settings = client.settings();
    let mut body = json!({
        "statement": sql,
        "timeout": STATEMENT_TIMEOUT_SECS,
        "database": settings.database,
        "schema": settings.schema,
        "warehouse": settings.warehouse,
    });

    if let Some(role) = &settings.role {
        body["role"] = json!(role);
    }

    if !bindings.is_empty() {
        let map: Map<String, Value> = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| ((i + 1).to_string(), b.to_json()))
            .collect();
        body["bindings"] = Value::Object(map);
    }

    body
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    statement_status_url: Option<String>,
}

/// Decoded result of a finished statement. Values arrive as strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl StatementResult {
    /// Parse a `200 OK` response body.
    pub fn from_json(body: &str) -> Result<Self> {
        let resp: StatementResponse = serde_json::from_str(body)?;
        Ok(Self::from_response(resp))
    }

    fn from_response(resp: StatementResponse) -> Self {
        let columns = resp
            .result_set_meta_data
            .unwrap_or_default()
            .row_type
            .into_iter()
            .map(|c| c.name.to_uppercase())
            .collect();
        Self {
            columns,
            rows: resp.data,
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows as song records. Columns are located by name, falling back to
    /// `artist, album, song_title, lyrics` order.
    pub fn songs(&self) -> Vec<SongRecord> {
        let idx = |name: &str, fallback: usize| self.column_index(name).unwrap_or(fallback);
        let (a, b, t, l) = (
            idx("ARTIST", 0),
            idx("ALBUM", 1),
            idx("SONG_TITLE", 2),
            idx("LYRICS", 3),
        );
        let cell = |row: &Vec<Option<String>>, i: usize| {
            row.get(i).cloned().flatten().unwrap_or_default()
        };

        self.rows
            .iter()
            .map(|row| SongRecord {
                artist: cell(row, a),
                album: cell(row, b),
                song_title: cell(row, t),
                lyrics: cell(row, l),
            })
            .collect()
    }

    /// First cell parsed as a count (COUNT(*), DML row counts).
    pub fn first_count(&self) -> Result<u64> {
        let raw = self
            .rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .flatten()
            .ok_or_else(|| Error::Warehouse("Statement returned no rows".into()))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Warehouse(format!("Expected a number, got {:?}", raw)))
    }
}

/// Run a statement and wait for its result.
pub async fn execute(
    client: &SnowflakeClient,
    sql: &str,
    bindings: &[Binding],
) -> Result<StatementResult> {
    let body = statement_body(client, sql, bindings);
    let path = format!("{}?requestId={}", STATEMENTS_PATH, uuid::Uuid::new_v4());

    debug!("Executing statement: {}", sql);

    let response = client
        .post(&path, &body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("Warehouse request failed: {}", e)))?;

    let mut status = response.status();
    let mut text = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("Warehouse response read failed: {}", e)))?;

    let mut polls = 0;
    while status == reqwest::StatusCode::ACCEPTED {
        let resp: StatementResponse = serde_json::from_str(&text)?;
        let status_url = resp
            .statement_status_url
            .ok_or_else(|| Error::Warehouse("Accepted statement has no status URL".into()))?;

        polls += 1;
        if polls > MAX_POLLS {
            warn!("Statement still running after {} polls: {}", MAX_POLLS, status_url);
            return Err(Error::Warehouse(
                "Statement is still running; try again shortly".into(),
            ));
        }

        tokio::time::sleep(POLL_INTERVAL).await;

        let response = client
            .get(&status_url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Warehouse poll failed: {}", e)))?;
        status = response.status();
        text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Warehouse response read failed: {}", e)))?;
    }

    if !status.is_success() {
        return Err(Error::Warehouse(describe_error(status, &text)));
    }

    StatementResult::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{stub_client, test_settings};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    fn accepted(handle: &str) -> (StatusCode, Json<Value>) {
        (
            StatusCode::ACCEPTED,
            Json(json!({
                "code": "333334",
                "statementHandle": handle,
                "statementStatusUrl": format!("{}/{}", STATEMENTS_PATH, handle),
            })),
        )
    }

    #[tokio::test]
    async fn test_execute_polls_accepted_statement() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let router = Router::new()
            .route(STATEMENTS_PATH, post(|| async { accepted("01ab") }))
            .route(
                "/api/v2/statements/{handle}",
                get(move |Path(handle): Path<String>| async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        accepted(&handle)
                    } else {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "resultSetMetaData": {"rowType": [{"name": "COUNT(*)"}]},
                                "data": [["7"]]
                            })),
                        )
                    }
                }),
            );
        let client = stub_client(router).await;

        let result = execute(&client, "SELECT COUNT(*) FROM LYLYRIC", &[]).await.unwrap();
        assert_eq!(result.first_count().unwrap(), 7);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_stops_polling_after_limit() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let router = Router::new()
            .route(STATEMENTS_PATH, post(|| async { accepted("01cd") }))
            .route(
                "/api/v2/statements/{handle}",
                get(move |Path(handle): Path<String>| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    accepted(&handle)
                }),
            );
        let client = stub_client(router).await;

        let err = execute(&client, "SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(&err, Error::Warehouse(m) if m.contains("still running")));
        assert_eq!(polls.load(Ordering::SeqCst), MAX_POLLS);
    }

    #[tokio::test]
    async fn test_execute_error_body_becomes_warehouse_error() {
        let router = Router::new().route(
            STATEMENTS_PATH,
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "code": "002003",
                        "message": "Object 'LYLYRIC' does not exist or not authorized."
                    })),
                )
            }),
        );
        let client = stub_client(router).await;

        match execute(&client, "SELECT 1 FROM LYLYRIC", &[]).await {
            Err(Error::Warehouse(message)) => {
                assert!(message.starts_with("422"));
                assert!(message.contains("002003"));
                assert!(message.contains("does not exist"));
            }
            other => panic!("expected a warehouse error, got {:?}", other),
        }
    }

    #[test]
    fn test_statement_body_bindings() {
        let client = SnowflakeClient::new(test_settings()).unwrap();
        let body = statement_body(
            &client,
            "SELECT * FROM T WHERE artist = ? AND lyrics ILIKE ?",
            &[Binding::from("The Beatles"), Binding::from("%sun%")],
        );

        assert_eq!(body["database"], "MUSIC");
        assert_eq!(body["schema"], "PUBLIC");
        assert_eq!(body["warehouse"], "COMPUTE_WH");
        assert_eq!(body["role"], "LYRIC_ROLE");
        assert_eq!(body["bindings"]["1"]["type"], "TEXT");
        assert_eq!(body["bindings"]["1"]["value"], "The Beatles");
        assert_eq!(body["bindings"]["2"]["value"], "%sun%");
    }

    #[test]
    fn test_statement_body_without_bindings_or_role() {
        let mut settings = test_settings();
        settings.role = None;
        let client = SnowflakeClient::new(settings).unwrap();
        let body = statement_body(&client, "SELECT 1", &[]);

        assert!(body.get("bindings").is_none());
        assert!(body.get("role").is_none());
    }

    #[test]
    fn test_songs_decoded_by_column_name() {
        let body = r#"{
            "resultSetMetaData": {
                "numRows": 1,
                "rowType": [
                    {"name": "SONG_TITLE", "type": "text"},
                    {"name": "LYRICS", "type": "text"},
                    {"name": "ARTIST", "type": "text"},
                    {"name": "ALBUM", "type": "text"}
                ]
            },
            "data": [["Here Comes the Sun", "Here comes the sun...", "The Beatles", null]],
            "code": "090001",
            "statementHandle": "01b2"
        }"#;

        let result = StatementResult::from_json(body).unwrap();
        let songs = result.songs();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist, "The Beatles");
        assert_eq!(songs[0].song_title, "Here Comes the Sun");
        assert_eq!(songs[0].album, "");
    }

    #[test]
    fn test_first_count() {
        let body = r#"{
            "resultSetMetaData": {"rowType": [{"name": "number of rows inserted"}]},
            "data": [["42"]]
        }"#;
        let result = StatementResult::from_json(body).unwrap();
        assert_eq!(result.first_count().unwrap(), 42);

        let empty = StatementResult::from_json(r#"{"data": []}"#).unwrap();
        assert!(empty.first_count().is_err());
        assert!(empty.songs().is_empty());
    }
}
