//! Ly-Lyric Ingest: fetch the lyrics corpus and load it into the warehouse.

pub mod corpus;
pub mod import;

pub use corpus::{ensure_corpus, scan_corpus, song_from_path, DEFAULT_CORPUS_URL};
pub use import::{import_corpus, ImportReport, DEFAULT_BATCH_SIZE};
