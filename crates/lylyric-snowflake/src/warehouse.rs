//! The lyrics table in the hosted warehouse.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::SnowflakeClient;
use crate::statements::{execute, Binding};
use lylyric_core::{validate_identifier, Result, SongRecord, Warehouse};

/// Rows per multi-row INSERT statement.
const INSERT_BATCH: usize = 100;

/// Warehouse backed by the SQL API. User text is always bound, never
/// interpolated; only the validated table identifier is spliced in.
#[derive(Debug, Clone)]
pub struct SnowflakeWarehouse {
    client: SnowflakeClient,
    table: String,
}

impl SnowflakeWarehouse {
    pub fn new(client: SnowflakeClient, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        Ok(Self {
            client,
            table: table.to_string(),
        })
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (artist STRING, album STRING, song_title STRING, lyrics STRING)",
            self.table
        )
    }

    pub fn lookup_sql(&self) -> String {
        format!(
            "SELECT artist, album, song_title, lyrics FROM {} WHERE lyrics ILIKE ? ESCAPE '\\\\' LIMIT 1",
            self.table
        )
    }

    /// `INSERT ... VALUES (?, ?, ?, ?), ...` for `rows` rows.
    pub fn insert_sql(&self, rows: usize) -> String {
        let values = vec!["(?, ?, ?, ?)"; rows].join(", ");
        format!(
            "INSERT INTO {} (artist, album, song_title, lyrics) VALUES {}",
            self.table, values
        )
    }
}

/// ILIKE pattern matching `fragment` literally anywhere in the column.
pub fn contains_pattern(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + 2);
    out.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    async fn ensure_table(&self) -> Result<()> {
        execute(&self.client, &self.create_table_sql(), &[]).await?;
        info!("Ensured table {}", self.table);
        Ok(())
    }

    async fn find_by_lyrics(&self, fragment: &str) -> Result<Option<SongRecord>> {
        let result = execute(
            &self.client,
            &self.lookup_sql(),
            &[Binding::Text(contains_pattern(fragment))],
        )
        .await?;
        Ok(result.songs().into_iter().next())
    }

    async fn insert_songs(&self, songs: &[SongRecord]) -> Result<usize> {
        let mut inserted = 0usize;
        for batch in songs.chunks(INSERT_BATCH) {
            let bindings: Vec<Binding> = batch
                .iter()
                .flat_map(|s| {
                    [
                        Binding::from(s.artist.as_str()),
                        Binding::from(s.album.as_str()),
                        Binding::from(s.song_title.as_str()),
                        Binding::from(s.lyrics.as_str()),
                    ]
                })
                .collect();

            let result = execute(&self.client, &self.insert_sql(batch.len()), &bindings).await?;
            let count = result.first_count().unwrap_or(batch.len() as u64) as usize;
            debug!("Inserted batch of {} rows", count);
            inserted += count;
        }
        Ok(inserted)
    }

    async fn count_songs(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        execute(&self.client, &sql, &[]).await?.first_count()
    }
}
