//! Orchestrator: one method per user action. Each validates its input,
//! then makes exactly one call to an external service.

use std::sync::Arc;

use tracing::{debug, info};

use lylyric_chat::prompts;
use lylyric_core::{
    validate_query, validate_text, CompletionService, Result, SearchService, SongRecord, Warehouse,
    MAX_LYRICS_CHARS,
};

/// Coordinates the warehouse, search and completion services.
pub struct Orchestrator {
    warehouse: Arc<dyn Warehouse>,
    search: Arc<dyn SearchService>,
    completion: Arc<dyn CompletionService>,
    similar_limit: usize,
}

impl Orchestrator {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        search: Arc<dyn SearchService>,
        completion: Arc<dyn CompletionService>,
        similar_limit: usize,
    ) -> Self {
        info!(
            "Orchestrator initialized: warehouse={}, search={}, similar_limit={}",
            warehouse.name(),
            search.name(),
            similar_limit
        );
        Self {
            warehouse,
            search,
            completion,
            similar_limit: similar_limit.max(1),
        }
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    pub fn search_service(&self) -> &Arc<dyn SearchService> {
        &self.search
    }

    pub fn completion(&self) -> &Arc<dyn CompletionService> {
        &self.completion
    }

    pub fn similar_limit(&self) -> usize {
        self.similar_limit
    }

    // ---------------------------------------------------------------
    // Lookup and retrieval
    // ---------------------------------------------------------------

    /// First song whose lyrics contain `query`. `Ok(None)` is the not-found path.
    pub async fn lookup(&self, query: &str) -> Result<Option<SongRecord>> {
        let query = validate_query(query)?;
        let found = self.warehouse.find_by_lyrics(&query).await?;
        match &found {
            Some(song) => info!("Lookup {:?} matched {}", query, song.label()),
            None => info!("Lookup {:?} matched nothing", query),
        }
        Ok(found)
    }

    /// Songs similar to `song`, searched by its lyrics. The song itself is
    /// dropped from the results.
    pub async fn similar(&self, song: &SongRecord) -> Result<Vec<SongRecord>> {
        let query = if song.lyrics.trim().is_empty() {
            validate_query(&song.song_title)?
        } else {
            validate_text(&song.lyrics, MAX_LYRICS_CHARS)?
        };

        let hits = self.search.search(&query, self.similar_limit + 1).await?;
        let total = hits.len();
        let results: Vec<SongRecord> = hits
            .into_iter()
            .filter(|hit| !hit.same_song(song))
            .take(self.similar_limit)
            .collect();

        debug!(
            "Similar to {}: {} hits, {} kept",
            song.label(),
            total,
            results.len()
        );
        Ok(results)
    }

    /// Songs matching a free-text mood such as "happy" or "rainy sunday".
    pub async fn recommend_by_mood(&self, mood: &str) -> Result<Vec<SongRecord>> {
        let mood = validate_query(mood)?;
        let results = self.search.search(&mood, self.similar_limit).await?;
        info!("Mood {:?}: {} recommendations", mood, results.len());
        Ok(results)
    }

    // ---------------------------------------------------------------
    // Generation
    // ---------------------------------------------------------------

    pub async fn draft(&self, song: &SongRecord, direction: Option<&str>) -> Result<String> {
        let direction = match direction.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => Some(validate_query(d)?),
            None => None,
        };
        self.generate("draft", prompts::draft_prompt(song, direction.as_deref()))
            .await
    }

    pub async fn translate(&self, song: &SongRecord, language: &str) -> Result<String> {
        let language = validate_query(language)?;
        self.generate("translate", prompts::translate_prompt(song, &language))
            .await
    }

    pub async fn backstory(&self, song: &SongRecord) -> Result<String> {
        self.generate("backstory", prompts::backstory_prompt(song))
            .await
    }

    pub async fn analyze(&self, lyrics: &str) -> Result<String> {
        let lyrics = validate_text(lyrics, MAX_LYRICS_CHARS)?;
        self.generate("analyze", prompts::analysis_prompt(&lyrics))
            .await
    }

    pub async fn new_verse(&self, lyrics: &str) -> Result<String> {
        let lyrics = validate_text(lyrics, MAX_LYRICS_CHARS)?;
        self.generate("verse", prompts::verse_prompt(&lyrics)).await
    }

    pub async fn explain_term(&self, term: &str) -> Result<String> {
        let term = validate_query(term)?;
        self.generate("theory", prompts::theory_prompt(&term)).await
    }

    async fn generate(&self, action: &str, prompt: String) -> Result<String> {
        debug!("Dispatching {} prompt ({} chars)", action, prompt.len());
        let text = self.completion.complete(&prompt).await?;
        info!("{} completed: {} chars", action, text.len());
        Ok(text)
    }
}
