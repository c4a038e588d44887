//! Ly-Lyric server: HTML pages and a small JSON API over the runtime.

pub mod html;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
