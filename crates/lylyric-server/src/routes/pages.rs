//! Search and similar-songs pages.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use super::{failure_panel, Session};
use crate::html::{self, escape_html, Page};
use crate::state::AppState;
use lylyric_runtime::SessionState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(search_page))
        .route("/search", post(search))
        .route("/similar", get(similar_page).post(find_similar))
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub query: String,
}

// ---------------------------------------------------------------
// Search
// ---------------------------------------------------------------

/// GET /: search form and the current match.
async fn search_page(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::load(&app, &headers);
    let query = session.state.last_query.clone().unwrap_or_default();
    session.render(Page::Search, &search_body(&session.state, &query, None))
}

/// POST /search: look up the first song containing the query.
async fn search(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<SearchForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);

    let panel = match app.orchestrator.lookup(&form.query).await {
        Ok(found) => {
            let query = form.query.trim().to_string();
            let panel = found.is_none().then(|| {
                html::notice_panel(&format!(
                    "No song found with lyrics containing \"{}\".",
                    query
                ))
            });
            session.update(&app, |s| s.set_match(query, found));
            panel
        }
        Err(e) => Some(failure_panel("Lookup", &e)),
    };

    session.render(
        Page::Search,
        &search_body(&session.state, &form.query, panel.as_deref()),
    )
}

fn search_body(state: &SessionState, query: &str, panel: Option<&str>) -> String {
    let matched = match &state.matched {
        Some(song) => format!(
            r#"{card}
<section>
    <form method="post" action="/similar" style="display:inline"><button type="submit">Find similar songs</button></form>
    <a href="/studio"><button type="button">Open in Lyric Studio</button></a>
</section>"#,
            card = html::song_card(song)
        ),
        None => String::new(),
    };

    format!(
        r#"<section>
    <h2>Find a song by its lyrics</h2>
    <form method="post" action="/search">
        <input type="text" name="query" value="{query}" placeholder="Here comes the sun..." autofocus>
        <button type="submit">Search</button>
    </form>
</section>
{panel}
{matched}"#,
        query = escape_html(query),
        panel = panel.unwrap_or(""),
        matched = matched,
    )
}

// ---------------------------------------------------------------
// Similar songs
// ---------------------------------------------------------------

/// GET /similar: last similarity results for the current match.
async fn similar_page(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::load(&app, &headers);
    session.render(Page::Similar, &similar_body(&session.state, None))
}

/// POST /similar: search for songs like the current match.
async fn find_similar(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut session = Session::load(&app, &headers);
    let Some(song) = session.state.matched.clone() else {
        return session.render(Page::Similar, &html::search_first_panel());
    };

    let panel = match app.orchestrator.similar(&song).await {
        Ok(results) => {
            let panel = results
                .is_empty()
                .then(|| html::notice_panel("No similar songs found."));
            // A newer search may have replaced the match while this one ran.
            session.update(&app, |s| {
                if s.matched.as_ref() == Some(&song) {
                    s.similar = results;
                }
            });
            panel
        }
        Err(e) => Some(failure_panel("Similarity search", &e)),
    };

    session.render(Page::Similar, &similar_body(&session.state, panel.as_deref()))
}

fn similar_body(state: &SessionState, panel: Option<&str>) -> String {
    let Some(song) = &state.matched else {
        return html::search_first_panel();
    };

    let results = if state.similar.is_empty() {
        String::new()
    } else {
        format!("<section>\n{}\n</section>", html::song_list(&state.similar))
    };

    format!(
        r#"<section>
    <h2>Songs similar to {label}</h2>
    <form method="post" action="/similar"><button type="submit">Find similar songs</button></form>
</section>
{panel}
{results}"#,
        label = escape_html(&song.label()),
        panel = panel.unwrap_or(""),
        results = results,
    )
}
