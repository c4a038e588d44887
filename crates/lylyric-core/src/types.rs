//! The song record shared by the warehouse, the search service and the UI.

use serde::{Deserialize, Serialize};

/// One row of the lyrics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub artist: String,
    pub album: String,
    pub song_title: String,
    pub lyrics: String,
}

impl SongRecord {
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        song_title: impl Into<String>,
        lyrics: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            song_title: song_title.into(),
            lyrics: lyrics.into(),
        }
    }

    /// Same song, ignoring case and surrounding whitespace in artist and title.
    pub fn same_song(&self, other: &SongRecord) -> bool {
        self.artist.trim().eq_ignore_ascii_case(other.artist.trim())
            && self.song_title.trim().eq_ignore_ascii_case(other.song_title.trim())
    }

    /// "Title - Artist" label used in page headings.
    pub fn label(&self) -> String {
        format!("{} - {}", self.song_title, self.artist)
    }

    /// First `max_chars` characters of the lyrics, with an ellipsis when cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        truncate_chars(&self.lyrics, max_chars)
    }
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_song_ignores_case() {
        let a = SongRecord::new("The Beatles", "Abbey Road", "Here Comes the Sun", "...");
        let b = SongRecord::new("the beatles ", "Other", "here comes the sun", "different");
        assert!(a.same_song(&b));

        let c = SongRecord::new("The Beatles", "Abbey Road", "Something", "...");
        assert!(!a.same_song(&c));
    }

    #[test]
    fn test_label() {
        let song = SongRecord::new("Nina Simone", "I Put a Spell on You", "Feeling Good", "...");
        assert_eq!(song.label(), "Feeling Good - Nina Simone");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let song = SongRecord::new("A", "B", "C", "ééééé");
        assert_eq!(song.excerpt(3), "ééé...");
        assert_eq!(song.excerpt(10), "ééééé");
    }
}
