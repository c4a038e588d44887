//! Corpus layout: `<artist>/<album>/<song title>`, one plain-text file per
//! song, at any depth below the checkout root.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use lylyric_core::{Error, Result, SongRecord};

pub const DEFAULT_CORPUS_URL: &str = "https://github.com/Lyrics/lyrics-database.git";

const UNKNOWN: &str = "Unknown";

/// Resolve `source` to a local directory. A local directory is used as-is,
/// an existing checkout at `dest` is reused, anything else is cloned there.
pub async fn ensure_corpus(source: &str, dest: &Path) -> Result<PathBuf> {
    let local = Path::new(source);
    if local.is_dir() {
        return Ok(local.to_path_buf());
    }
    if dest.join(".git").is_dir() {
        info!("Reusing corpus checkout at {}", dest.display());
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!("Cloning {} into {}", source, dest.display());
    let status = tokio::process::Command::new("git")
        .args(["clone", "--depth", "1", source])
        .arg(dest)
        .status()
        .await
        .map_err(|e| Error::Internal(format!("Failed to run git: {}", e)))?;

    if !status.success() {
        return Err(Error::Internal(format!("git clone exited with {}", status)));
    }
    Ok(dest.to_path_buf())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Derive artist/album/title from a file path relative to the corpus root.
pub fn song_from_path(relative: &Path, lyrics: String) -> SongRecord {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let n = parts.len();

    let title = parts.last().cloned().unwrap_or_else(|| UNKNOWN.into());
    let album = if n >= 2 { parts[n - 2].clone() } else { UNKNOWN.into() };
    let artist = if n >= 3 { parts[n - 3].clone() } else { UNKNOWN.into() };

    SongRecord {
        artist,
        album,
        song_title: title,
        lyrics,
    }
}

/// Read every song file under `root`. Hidden entries are skipped; files that
/// are not valid UTF-8 are skipped with a warning. Results are ordered by path.
pub fn scan_corpus(root: &Path) -> Result<(Vec<SongRecord>, usize)> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!("Corpus directory {}", root.display())));
    }

    let mut songs = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let lyrics = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        songs.push(song_from_path(relative, lyrics));
    }

    info!(
        "Scanned {} songs under {} ({} skipped)",
        songs.len(),
        root.display(),
        skipped
    );
    Ok((songs, skipped))
}
