//! Lyric Studio: draft, translation and backstory for the matched song.

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

const DEFAULT_LANGUAGE: &str = "Spanish";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/studio", get(studio_page))
        .route("/studio/draft", post(draft))
        .route("/studio/translate", post(translate))
        .route("/studio/backstory", post(backstory))
}

#[derive(Debug, Deserialize)]
pub struct DraftForm {
    #[serde(default)]
    pub direction: String,
}

#[derive(Debug, Deserialize)]
pub struct TranslateForm {
    #[serde(default)]
    pub language: String,
}

async fn studio_page(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::load(&app, &headers);
    session.render(Page::Studio, &studio_body(&session.state, None))
}

async fn draft(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<DraftForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let Some(song) = session.state.matched.clone() else {
        return session.render(Page::Studio, &html::search_first_panel());
    };

    let panel = match app.orchestrator.draft(&song, Some(form.direction.as_str())).await {
        Ok(text) => {
            session.update(&app, |s| {
                if s.matched.as_ref() == Some(&song) {
                    s.draft = Some(text);
                }
            });
            None
        }
        Err(e) => Some(failure_panel("Draft", &e)),
    };
    session.render(Page::Studio, &studio_body(&session.state, panel.as_deref()))
}

async fn translate(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TranslateForm>,
) -> Response {
    let mut session = Session::load(&app, &headers);
    let Some(song) = session.state.matched.clone() else {
        return session.render(Page::Studio, &html::search_first_panel());
    };

    let panel = match app.orchestrator.translate(&song, &form.language).await {
        Ok(text) => {
            let language = form.language.trim().to_string();
            session.update(&app, |s| {
                if s.matched.as_ref() == Some(&song) {
                    s.translation = Some((language, text));
                }
            });
            None
        }
        Err(e) => Some(failure_panel("Translation", &e)),
    };
    session.render(Page::Studio, &studio_body(&session.state, panel.as_deref()))
}

async fn backstory(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut session = Session::load(&app, &headers);
    let Some(song) = session.state.matched.clone() else {
        return session.render(Page::Studio, &html::search_first_panel());
    };

    let panel = match app.orchestrator.backstory(&song).await {
        Ok(text) => {
            session.update(&app, |s| {
                if s.matched.as_ref() == Some(&song) {
                    s.backstory = Some(text);
                }
            });
            None
        }
        Err(e) => Some(failure_panel("Backstory", &e)),
    };
    session.render(Page::Studio, &studio_body(&session.state, panel.as_deref()))
}

fn studio_body(state: &SessionState, panel: Option<&str>) -> String {
    let Some(song) = &state.matched else {
        return html::search_first_panel();
    };

    let language = state
        .translation
        .as_ref()
        .map(|(lang, _)| lang.as_str())
        .unwrap_or(DEFAULT_LANGUAGE);

    let mut outputs = String::new();
    if let Some(text) = &state.draft {
        outputs.push_str(&html::output_panel("Lyric draft", text));
    }
    if let Some((lang, text)) = &state.translation {
        outputs.push_str(&html::output_panel(&format!("Translation ({})", lang), text));
    }
    if let Some(text) = &state.backstory {
        outputs.push_str(&html::output_panel("Backstory", text));
    }

    format!(
        r#"<section>
    <h2>{label}</h2>
    <div class="meta">{album}</div>
    <pre class="lyrics">{excerpt}</pre>
</section>
<section>
    <form method="post" action="/studio/draft">
        <input type="text" name="direction" placeholder="Optional direction, e.g. make it about the ocean">
        <button type="submit">Write a new draft</button>
    </form>
    <form method="post" action="/studio/translate">
        <input type="text" name="language" value="{language}">
        <button type="submit">Translate</button>
    </form>
    <form method="post" action="/studio/backstory">
        <button type="submit">Tell the backstory</button>
    </form>
</section>
{panel}
{outputs}"#,
        label = escape_html(&song.label()),
        album = escape_html(&song.album),
        excerpt = escape_html(&song.excerpt(400)),
        language = escape_html(language),
        panel = panel.unwrap_or(""),
        outputs = outputs,
    )
}
