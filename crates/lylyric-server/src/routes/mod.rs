//! HTTP route handlers: HTML pages at the root, JSON under `/api`.

pub mod api;
pub mod explore;
pub mod health;
pub mod pages;
pub mod studio;

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::html::{self, Page};
use crate::state::AppState;
use lylyric_core::Error;
use lylyric_runtime::SessionState;

pub const SESSION_COOKIE: &str = "lylyric_session";

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(pages::routes())
        .merge(studio::routes())
        .merge(explore::routes())
        .merge(health::routes())
        .nest("/api", api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The caller's session for one request: loaded from the cookie, or
/// created when the cookie is missing or stale.
pub(crate) struct Session {
    pub id: String,
    pub state: SessionState,
    is_new: bool,
}

impl Session {
    pub fn load(app: &AppState, headers: &HeaderMap) -> Self {
        let cookie = session_cookie(headers);
        let (id, state, is_new) = app.sessions.get_or_create(cookie.as_deref());
        Self { id, state, is_new }
    }

    /// Apply `f` to the stored session and refresh the local snapshot from
    /// the result, so changes made by concurrent requests are kept. If the
    /// session was evicted meanwhile, `f` only changes the local snapshot.
    pub fn update(&mut self, app: &AppState, f: impl FnOnce(&mut SessionState)) {
        let mut f = Some(f);
        let stored = app.sessions.update(&self.id, |s| {
            if let Some(f) = f.take() {
                f(s);
            }
        });
        match stored {
            Some(state) => self.state = state,
            None => {
                debug!("Session {} was evicted before it could be saved", self.id);
                if let Some(f) = f.take() {
                    f(&mut self.state);
                }
            }
        }
    }

    /// Render a page, setting the cookie for new sessions.
    pub fn render(&self, page: Page, body: &str) -> Response {
        let mut response = Html(html::layout(page, body)).into_response();
        if self.is_new {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, self.id
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        response
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

/// Error panel for a failed page action. Backend failures are logged.
pub(crate) fn failure_panel(action: &str, err: &Error) -> String {
    if err.is_user_error() {
        debug!("{} rejected: {}", action, err);
    } else {
        warn!("{} failed: {}", action, err);
    }
    html::error_panel(&html::failure_message(err))
}
