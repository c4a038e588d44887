//! Ly-Lyric Runtime: the request flow behind each page action, and the
//! per-browser session state it fills in.

pub mod orchestrator;
pub mod session;

pub use orchestrator::Orchestrator;
pub use session::{SessionManager, SessionState};
