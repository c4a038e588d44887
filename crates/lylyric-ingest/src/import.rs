//! Bulk import of scanned songs into a warehouse.

use serde::Serialize;
use tracing::info;

use lylyric_core::{Result, SongRecord, Warehouse};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub scanned: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Create the table if needed, then insert `songs` in batches. Stops at the
/// first failing batch.
pub async fn import_corpus(
    warehouse: &dyn Warehouse,
    songs: &[SongRecord],
    skipped: usize,
    batch_size: usize,
) -> Result<ImportReport> {
    warehouse.ensure_table().await?;

    let mut report = ImportReport {
        scanned: songs.len(),
        inserted: 0,
        skipped,
    };

    for (i, batch) in songs.chunks(batch_size.max(1)).enumerate() {
        report.inserted += warehouse.insert_songs(batch).await?;
        info!(
            "Batch {}: {}/{} songs inserted into {}",
            i + 1,
            report.inserted,
            report.scanned,
            warehouse.name()
        );
    }

    Ok(report)
}
