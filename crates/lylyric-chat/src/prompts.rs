//! Prompt builders for the lyric features. Pure string formatting; the
//! matched record is passed through verbatim.

use lylyric_core::SongRecord;

/// System message sent ahead of every prompt.
pub const SYSTEM_PROMPT: &str = "You are a songwriting assistant. Answer with the requested text only, \
     without preamble. Never reproduce the full original lyrics.";

fn song_block(song: &SongRecord) -> String {
    format!(
        "Title: {}\nArtist: {}\nAlbum: {}\nLyrics:\n{}",
        song.song_title, song.artist, song.album, song.lyrics
    )
}

/// New lyrics inspired by the matched song. `direction` is an optional
/// user hint such as "make it melancholic".
pub fn draft_prompt(song: &SongRecord, direction: Option<&str>) -> String {
    let mut prompt = format!(
        "Write an original lyric draft (two verses and a chorus) inspired by the themes, \
         imagery and rhythm of this song. Do not copy its lines.\n\n{}",
        song_block(song)
    );
    if let Some(d) = direction.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str(&format!("\n\nAdditional direction: {}", d));
    }
    prompt
}

pub fn translate_prompt(song: &SongRecord, language: &str) -> String {
    format!(
        "Translate the following song lyrics into {}. Keep the line breaks and, where \
         possible, the rhythm.\n\n{}",
        language.trim(),
        song_block(song)
    )
}

pub fn backstory_prompt(song: &SongRecord) -> String {
    format!(
        "Write a short backstory (one or two paragraphs) for this song: what might have \
         inspired it, what it is about, and how it fits the artist's work. Say clearly \
         when you are speculating.\n\n{}",
        song_block(song)
    )
}

pub fn analysis_prompt(lyrics: &str) -> String {
    format!(
        "Analyze these lyrics. Describe the overall mood, the main themes and notable \
         imagery in a few sentences.\n\nLyrics:\n{}",
        lyrics
    )
}

pub fn verse_prompt(lyrics: &str) -> String {
    format!(
        "Write one new verse that could follow these lyrics, matching their meter and \
         tone.\n\nLyrics:\n{}",
        lyrics
    )
}

pub fn theory_prompt(term: &str) -> String {
    format!(
        "Explain the music theory term \"{}\" in plain language for a songwriter, with \
         one short example.",
        term
    )
}
