//! Database schema SQL for the local backend.

/// Lyrics table. Column names match the hosted table.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artist TEXT NOT NULL,
    album TEXT NOT NULL,
    song_title TEXT NOT NULL,
    lyrics TEXT NOT NULL,
    content_hash TEXT UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist);
CREATE INDEX IF NOT EXISTS idx_songs_hash ON songs(content_hash);
"#;

/// FTS5 virtual table for ranked search.
pub const FTS_SCHEMA_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS songs_fts USING fts5(
    song_title, lyrics,
    content='songs', content_rowid='id',
    tokenize='porter unicode61'
);
"#;

/// Triggers to keep the FTS index in sync with the songs table.
pub const FTS_TRIGGERS_SQL: &str = r#"
CREATE TRIGGER IF NOT EXISTS songs_ai AFTER INSERT ON songs BEGIN
    INSERT INTO songs_fts(rowid, song_title, lyrics)
    VALUES (new.id, new.song_title, new.lyrics);
END;

CREATE TRIGGER IF NOT EXISTS songs_ad AFTER DELETE ON songs BEGIN
    INSERT INTO songs_fts(songs_fts, rowid, song_title, lyrics)
    VALUES ('delete', old.id, old.song_title, old.lyrics);
END;

CREATE TRIGGER IF NOT EXISTS songs_au AFTER UPDATE ON songs BEGIN
    INSERT INTO songs_fts(songs_fts, rowid, song_title, lyrics)
    VALUES ('delete', old.id, old.song_title, old.lyrics);
    INSERT INTO songs_fts(rowid, song_title, lyrics)
    VALUES (new.id, new.song_title, new.lyrics);
END;
"#;
