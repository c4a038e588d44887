//! Explore page: lyric analysis, new verses, mood recommendations and
//! music theory terms. None of these need a matched song.

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

const SAMPLE_LYRICS: &str = "Here comes the sun, doo-doo-doo-doo...";
const DEFAULT_MOOD: &str = "happy";
const DEFAULT_TERM: &str = "cadence";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/explore", get(explore_page))
        .route("/explore/analyze", post(analyze))
        .route("/explore/verse", post(verse))
        .route("/explore/mood", post(mood))
        .route("/explore/theory", post(theory))
}

#[derive(Debug, Deserialize)]
pub struct LyricsForm {
    #[serde(default)]
    pub lyrics: String,
}

#[derive(Debug, Deserialize)]
pub struct MoodForm {
    #[serde(default)]
    pub mood: String,
}

#[derive(Debug, Deserialize)]
pub struct TermForm {
    #[serde(default)]
    pub term: String,
}

/// Values to pre-fill the forms with when they differ from the defaults.
#[derive(Default)]
struct Inputs<'a> {
    lyrics: Option<&'a str>,
    mood: Option<&'a str>,
    term: Option<&'a str>,
}

async fn explore_page(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::load(&app, &headers);
    session.render(
        Page::Explore,
        &explore_body(&session.state, Inputs::default(), None),
    )
}

async fn analyze(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LyricsForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let panel = match app.orchestrator.analyze(&form.lyrics).await {
        Ok(text) => {
            session.update(&app, |s| s.analysis = Some(text));
            None
        }
        Err(e) => Some(failure_panel("Analysis", &e)),
    };

    let inputs = Inputs {
        lyrics: Some(form.lyrics.as_str()),
        ..Default::default()
    };
    session.render(
        Page::Explore,
        &explore_body(&session.state, inputs, panel.as_deref()),
    )
}

async fn verse(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LyricsForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let panel = match app.orchestrator.new_verse(&form.lyrics).await {
        Ok(text) => {
            session.update(&app, |s| s.verse = Some(text));
            None
        }
        Err(e) => Some(failure_panel("Verse generation", &e)),
    };

    let inputs = Inputs {
        lyrics: Some(form.lyrics.as_str()),
        ..Default::default()
    };
    session.render(
        Page::Explore,
        &explore_body(&session.state, inputs, panel.as_deref()),
    )
}

async fn mood(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<MoodForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let panel = match app.orchestrator.recommend_by_mood(&form.mood).await {
        Ok(songs) => {
            let mood = form.mood.trim().to_string();
            session.update(&app, |s| s.mood = Some((mood, songs)));
            None
        }
        Err(e) => Some(failure_panel("Recommendations", &e)),
    };

    let inputs = Inputs {
        mood: Some(form.mood.as_str()),
        ..Default::default()
    };
    session.render(
        Page::Explore,
        &explore_body(&session.state, inputs, panel.as_deref()),
    )
}

async fn theory(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TermForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let panel = match app.orchestrator.explain_term(&form.term).await {
        Ok(text) => {
            let term = form.term.trim().to_string();
            session.update(&app, |s| s.theory = Some((term, text)));
            None
        }
        Err(e) => Some(failure_panel("Explanation", &e)),
    };

    let inputs = Inputs {
        term: Some(form.term.as_str()),
        ..Default::default()
    };
    session.render(
        Page::Explore,
        &explore_body(&session.state, inputs, panel.as_deref()),
    )
}

fn explore_body(state: &SessionState, inputs: Inputs<'_>, panel: Option<&str>) -> String {
    let lyrics = inputs
        .lyrics
        .or_else(|| state.matched.as_ref().map(|s| s.lyrics.as_str()))
        .unwrap_or(SAMPLE_LYRICS);
    let mood = inputs
        .mood
        .or_else(|| state.mood.as_ref().map(|(m, _)| m.as_str()))
        .unwrap_or(DEFAULT_MOOD);
    let term = inputs
        .term
        .or_else(|| state.theory.as_ref().map(|(t, _)| t.as_str()))
        .unwrap_or(DEFAULT_TERM);

    let mut analysis = String::new();
    if let Some(text) = &state.analysis {
        analysis.push_str(&html::output_panel("Analysis", text));
    }
    if let Some(text) = &state.verse {
        analysis.push_str(&html::output_panel("New verse", text));
    }

    let recommendations = match &state.mood {
        Some((mood, songs)) => format!(
            "<section><h2>Songs that match the mood \"{}\"</h2>\n{}\n</section>",
            escape_html(mood),
            html::song_list(songs)
        ),
        None => String::new(),
    };

    let explanation = match &state.theory {
        Some((term, text)) => html::output_panel(&format!("Explanation of \"{}\"", term), text),
        None => String::new(),
    };

    format!(
        r#"{panel}
<section>
    <h2>Lyric Analysis and Generation</h2>
    <form method="post" action="/explore/analyze">
        <textarea name="lyrics" rows="8">{lyrics}</textarea>
        <button type="submit">Analyze Lyrics</button>
        <button type="submit" formaction="/explore/verse">Generate New Verse</button>
    </form>
</section>
{analysis}
<section>
    <h2>Mood-Based Song Recommendations</h2>
    <form method="post" action="/explore/mood">
        <input type="text" name="mood" value="{mood}">
        <button type="submit">Get Recommendations</button>
    </form>
</section>
{recommendations}
<section>
    <h2>Music Theory Explanation</h2>
    <form method="post" action="/explore/theory">
        <input type="text" name="term" value="{term}">
        <button type="submit">Explain Term</button>
    </form>
</section>
{explanation}"#,
        panel = panel.unwrap_or(""),
        lyrics = escape_html(lyrics),
        analysis = analysis,
        mood = escape_html(mood),
        recommendations = recommendations,
        term = escape_html(term),
        explanation = explanation,
    )
}
