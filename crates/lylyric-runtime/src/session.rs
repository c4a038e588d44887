//! Session management: per-browser UI state held in memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use lylyric_core::SongRecord;

pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// What one browser has searched for and generated so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub last_query: Option<String>,
    pub matched: Option<SongRecord>,
    pub similar: Vec<SongRecord>,
    pub draft: Option<String>,
    /// (language, text)
    pub translation: Option<(String, String)>,
    pub backstory: Option<String>,
    pub analysis: Option<String>,
    pub verse: Option<String>,
    /// (term, explanation)
    pub theory: Option<(String, String)>,
    /// (mood, recommendations)
    pub mood: Option<(String, Vec<SongRecord>)>,
}

impl SessionState {
    /// Record a lookup. Results derived from the previous match are cleared.
    pub fn set_match(&mut self, query: String, matched: Option<SongRecord>) {
        self.last_query = Some(query);
        self.matched = matched;
        self.similar.clear();
        self.draft = None;
        self.translation = None;
        self.backstory = None;
    }
}

struct Entry {
    state: SessionState,
    last_touched: u64,
}

/// Maps session ids to state. No TTL; the least recently touched session
/// is evicted once `max_sessions` is reached.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Entry>>,
    clock: AtomicU64,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Create an empty session and return its id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = Entry {
            state: SessionState::default(),
            last_touched: self.tick(),
        };

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_touched)
                .map(|(id, _)| id.clone())
            {
                sessions.remove(&oldest);
                debug!("Evicted session {}", oldest);
            }
        }
        sessions.insert(id.clone(), entry);
        info!("Session created: {}", id);
        id
    }

    /// Snapshot of a session's state.
    pub fn get(&self, id: &str) -> Option<SessionState> {
        let now = self.tick();
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(id)?;
        entry.last_touched = now;
        Some(entry.state.clone())
    }

    /// Return `id` if it names a live session, otherwise a fresh session id.
    /// The flag is true when a new session was created.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, SessionState, bool) {
        if let Some(id) = id {
            if let Some(state) = self.get(id) {
                return (id.to_string(), state, false);
            }
        }
        let id = self.create();
        (id, SessionState::default(), true)
    }

    /// Mutate a session in place. Returns the updated snapshot, or `None`
    /// if the session is gone.
    pub fn update<F>(&self, id: &str, f: F) -> Option<SessionState>
    where
        F: FnOnce(&mut SessionState),
    {
        let now = self.tick();
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(id)?;
        f(&mut entry.state);
        entry.last_touched = now;
        Some(entry.state.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
