//! SQLite-backed lyrics table with substring lookup and FTS5 bm25 search.
//!
//! Implements both [`Warehouse`] and [`SearchService`], so a single file can
//! replace the hosted services for local runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::schema::{FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL, SCHEMA_SQL};
use lylyric_core::{Error, Result, SearchService, SongRecord, Warehouse};

/// Upper bound on distinct tokens sent to FTS5 from a single query. Whole
/// lyrics are used as similarity queries, so this keeps MATCH strings small.
const MAX_FTS_TOKENS: usize = 64;

/// Local lyrics store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_songs: i64,
    pub total_artists: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}

/// Stable hash of a record, used to skip re-imported rows.
pub fn content_hash(song: &SongRecord) -> String {
    let mut hasher = Sha256::new();
    for field in [&song.artist, &song.album, &song.song_title, &song.lyrics] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/lylyric.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("lylyric.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} songs, path={}",
            store.count()?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Internal(format!("Store task failed: {}", e)))?
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Insert many songs in one transaction. Returns the number of new rows;
    /// rows identical to an existing one are skipped.
    pub fn insert_batch(&self, songs: &[SongRecord]) -> Result<usize> {
        insert_batch_with(&mut self.conn.lock(), songs)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// First song (by insertion order) whose lyrics contain `fragment`.
    /// Matching is case-insensitive for ASCII, as with SQLite's LIKE.
    pub fn lookup_lyrics(&self, fragment: &str) -> Result<Option<SongRecord>> {
        lookup_with(&self.conn.lock(), fragment)
    }

    /// bm25-ranked search over title and lyrics.
    pub fn search_ranked(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>> {
        search_with(&self.conn.lock(), query, limit)
    }

    pub fn count(&self) -> Result<u64> {
        count_with(&self.conn.lock())
    }

    /// Row counts and file size, read off the executor.
    pub async fn get_stats(&self) -> Result<StoreStats> {
        let db_path = self.db_path.clone();
        self.blocking(move |conn| {
            let (total_songs, total_artists): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT artist) FROM songs",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| Error::Database(e.to_string()))?;

            let db_size_mb = std::fs::metadata(&db_path)
                .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                .unwrap_or(0.0);

            Ok(StoreStats {
                total_songs,
                total_artists,
                db_path: db_path.display().to_string(),
                db_size_mb,
            })
        })
        .await
    }
}

fn insert_batch_with(conn: &mut Connection, songs: &[SongRecord]) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::Database(e.to_string()))?;

    let mut inserted = 0;
    for song in songs {
        if insert_with(&tx, song)? {
            inserted += 1;
        }
    }

    tx.commit().map_err(|e| Error::Database(e.to_string()))?;
    debug!("Inserted {} of {} songs", inserted, songs.len());
    Ok(inserted)
}

/// Insert one song. Returns false when an identical row already exists.
fn insert_with(conn: &Connection, song: &SongRecord) -> Result<bool> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO songs (artist, album, song_title, lyrics, content_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(content_hash) DO NOTHING",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    let changed = stmt
        .execute(params![
            song.artist,
            song.album,
            song.song_title,
            song.lyrics,
            content_hash(song),
            chrono::Utc::now().timestamp_millis(),
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(changed > 0)
}

fn lookup_with(conn: &Connection, fragment: &str) -> Result<Option<SongRecord>> {
    let pattern = format!("%{}%", escape_like(fragment));
    let mut stmt = conn
        .prepare_cached(
            "SELECT artist, album, song_title, lyrics FROM songs \
             WHERE lyrics LIKE ?1 ESCAPE '\\' \
             ORDER BY id \
             LIMIT 1",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
    stmt.query_row(params![pattern], row_to_song)
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
}

fn search_with(conn: &Connection, query: &str, limit: usize) -> Result<Vec<SongRecord>> {
    let fts_query = sanitize_fts_query(query);
    if fts_query.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let sql = "SELECT s.artist, s.album, s.song_title, s.lyrics \
               FROM songs_fts \
               JOIN songs s ON s.id = songs_fts.rowid \
               WHERE songs_fts MATCH ?1 \
               ORDER BY songs_fts.rank \
               LIMIT ?2";

    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| Error::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params![fts_query, limit as i64], row_to_song)
        .map_err(|e| Error::Database(e.to_string()))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(e.to_string()))
}

fn count_with(conn: &Connection) -> Result<u64> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(n as u64)
}

fn row_to_song(row: &rusqlite::Row<'_>) -> rusqlite::Result<SongRecord> {
    Ok(SongRecord {
        artist: row.get("artist")?,
        album: row.get("album")?,
        song_title: row.get("song_title")?,
        lyrics: row.get("lyrics")?,
    })
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Sanitize a user query for FTS5 MATCH syntax.
/// Wraps each distinct word token in double quotes and joins with OR.
fn sanitize_fts_query(query: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for raw in query.split_whitespace() {
        let word: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .collect::<String>()
            .to_lowercase();
        if !word.chars().any(char::is_alphanumeric) || tokens.contains(&word) {
            continue;
        }
        tokens.push(word);
        if tokens.len() == MAX_FTS_TOKENS {
            break;
        }
    }
    tokens
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl Warehouse for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_table(&self) -> Result<()> {
        self.blocking(|conn| Self::init_schema(conn)).await
    }

    async fn find_by_lyrics(&self, fragment: &str) -> Result<Option<SongRecord>> {
        let fragment = fragment.to_string();
        self.blocking(move |conn| lookup_with(conn, &fragment)).await
    }

    async fn insert_songs(&self, songs: &[SongRecord]) -> Result<usize> {
        let songs = songs.to_vec();
        self.blocking(move |conn| insert_batch_with(conn, &songs)).await
    }

    async fn count_songs(&self) -> Result<u64> {
        self.blocking(|conn| count_with(conn)).await
    }
}

#[async_trait]
impl SearchService for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite-fts5"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>> {
        let query = query.to_string();
        self.blocking(move |conn| search_with(conn, &query, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn seed(store: &SqliteStore) {
        store
            .insert_batch(&[
                SongRecord::new(
                    "The Beatles",
                    "Abbey Road",
                    "Here Comes the Sun",
                    "Here comes the sun, doo-doo-doo-doo\nHere comes the sun, and I say\nIt's all right",
                ),
                SongRecord::new(
                    "The Beatles",
                    "Abbey Road",
                    "Something",
                    "Something in the way she moves\nAttracts me like no other lover",
                ),
                SongRecord::new(
                    "Nina Simone",
                    "I Put a Spell on You",
                    "Feeling Good",
                    "Birds flying high, you know how I feel\nSun in the sky, you know how I feel",
                ),
            ])
            .unwrap();
    }

    #[test]
    fn test_lookup_known_substring() {
        let (store, _dir) = test_store();
        seed(&store);

        let song = store.lookup_lyrics("doo-doo-doo").unwrap().unwrap();
        assert_eq!(song.song_title, "Here Comes the Sun");
        assert_eq!(song.artist, "The Beatles");
        assert_eq!(song.album, "Abbey Road");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (store, _dir) = test_store();
        seed(&store);

        let song = store.lookup_lyrics("BIRDS FLYING HIGH").unwrap().unwrap();
        assert_eq!(song.song_title, "Feeling Good");
    }

    #[test]
    fn test_lookup_unmatched_returns_none() {
        let (store, _dir) = test_store();
        seed(&store);

        assert!(store.lookup_lyrics("never gonna give you up").unwrap().is_none());
    }

    #[test]
    fn test_lookup_treats_wildcards_literally() {
        let (store, _dir) = test_store();
        seed(&store);

        assert!(store.lookup_lyrics("%").unwrap().is_none());
        assert!(store.lookup_lyrics("S_mething").unwrap().is_none());
        assert!(store.lookup_lyrics("' OR 1=1 --").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_rows_are_skipped() {
        let (store, _dir) = test_store();
        let song = SongRecord::new("A", "B", "C", "la la la");

        assert_eq!(store.insert_batch(&[song.clone(), song.clone()]).unwrap(), 1);
        assert_eq!(store.insert_batch(&[song]).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_ranked_search() {
        let (store, _dir) = test_store();
        seed(&store);

        let results = store.search_ranked("sun sky", 10).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|s| s.song_title != "Something"));

        let limited = store.search_ranked("sun", 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_search_with_punctuation_only_query() {
        let (store, _dir) = test_store();
        seed(&store);

        assert!(store.search_ranked("... --- !!!", 5).unwrap().is_empty());
        assert!(store.search_ranked("\"sun\"", 5).unwrap().len() >= 1);
    }

    #[test]
    fn test_sanitize_fts_query() {
        assert_eq!(sanitize_fts_query("Sun sun SKY!"), "\"sun\" OR \"sky\"");
        assert_eq!(sanitize_fts_query("   "), "");

        let long: String = (0..200).map(|i| format!("w{} ", i)).collect();
        assert_eq!(sanitize_fts_query(&long).matches(" OR ").count(), MAX_FTS_TOKENS - 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _dir) = test_store();
        seed(&store);

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_songs, 3);
        assert_eq!(stats.total_artists, 2);
        assert!(stats.db_path.ends_with("lylyric.db"));
        assert!(stats.db_size_mb > 0.0);
    }

    #[tokio::test]
    async fn test_warehouse_trait() {
        let (store, _dir) = test_store();
        let warehouse: &dyn Warehouse = &store;

        warehouse.ensure_table().await.unwrap();
        let n = warehouse
            .insert_songs(&[SongRecord::new("A", "B", "C", "lyrics here")])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(warehouse.count_songs().await.unwrap(), 1);
        assert!(warehouse.find_by_lyrics("here").await.unwrap().is_some());
        assert!(warehouse.find_by_lyrics("HERE").await.unwrap().is_some());
        assert!(warehouse.find_by_lyrics("absent").await.unwrap().is_none());

        let search: &dyn SearchService = &store;
        let ranked = search.search("lyrics", 5).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].song_title, "C");
    }
}
