//! Router tests: pages and JSON API driven through `oneshot` against a
//! seeded on-disk SQLite store and a scripted completion service.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use lylyric_chat::LLMConfig;
use lylyric_core::{CompletionService, Error, LylyricConfig, Result, SongRecord, Warehouse};
use lylyric_runtime::Orchestrator;
use lylyric_server::{build_router, AppState};
use lylyric_store::SqliteStore;

/// Returns a fixed text, or a 503 when `fail` is set. Counts calls.
struct ScriptedCompletion {
    fail: bool,
    calls: Mutex<usize>,
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn model(&self) -> Option<String> {
        Some("scripted-model".into())
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        *self.calls.lock() += 1;
        if self.fail {
            Err(Error::Completion("503 Service Unavailable".into()))
        } else {
            Ok("Golden light on the window, a melody wakes.".into())
        }
    }
}

struct TestApp {
    app: Router,
    completion: Arc<ScriptedCompletion>,
    _dir: TempDir,
}

fn seed() -> Vec<SongRecord> {
    vec![
        SongRecord::new(
            "The Beatles",
            "Abbey Road",
            "Here Comes the Sun",
            "Here comes the sun, doo-doo-doo-doo\nHere comes the sun, and I say it's all right",
        ),
        SongRecord::new(
            "The Beatles",
            "Revolver",
            "Good Day Sunshine",
            "Good day sunshine\nI need to laugh and when the sun is out",
        ),
        SongRecord::new(
            "Nina Simone",
            "I Put a Spell on You",
            "Feeling Good",
            "Birds flying high, you know how I feel",
        ),
    ]
}

/// Holds each completion until released, so a second request can run
/// while the first is still waiting on the model.
#[derive(Default)]
struct GatedCompletion {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl CompletionService for GatedCompletion {
    fn model(&self) -> Option<String> {
        Some("gated-model".into())
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok("A draft written for the earlier match.".into())
    }
}

async fn build_app(completion: Arc<dyn CompletionService>) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("db")).unwrap());
    store.ensure_table().await.unwrap();
    store.insert_songs(&seed()).await.unwrap();

    let config = LylyricConfig::from_sources(None, |_| None).unwrap();
    let llm_config = Arc::new(RwLock::new(LLMConfig::load(
        &dir.path().join("llm-config.json"),
        false,
    )));
    let orchestrator = Orchestrator::new(store.clone(), store.clone(), completion, 2);
    let state = AppState::new(config, orchestrator, llm_config).with_local_store(store);

    (build_router(Arc::new(state)), dir)
}

async fn test_app(fail_completion: bool) -> TestApp {
    let completion = Arc::new(ScriptedCompletion {
        fail: fail_completion,
        calls: Mutex::new(0),
    });
    let (app, dir) = build_app(completion.clone()).await;

    TestApp {
        app,
        completion,
        _dir: dir,
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// `name=value` part of the Set-Cookie header.
fn cookie_of(response: &Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("new session sets a cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

/// Run a search and return the session cookie.
async fn search(t: &TestApp, query: &str) -> (String, String) {
    let response = t
        .app
        .clone()
        .oneshot(post_form("/search", &format!("query={}", query), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_of(&response);
    (cookie, body_text(response).await)
}

// ---------------------------------------------------------------
// Pages
// ---------------------------------------------------------------

#[tokio::test]
async fn test_root_serves_html_and_sets_cookie() {
    let t = test_app(false).await;
    let response = t.app.clone().oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));
    assert!(cookie_of(&response).starts_with("lylyric_session="));

    let body = body_text(response).await;
    assert!(body.contains("Find a song by its lyrics"));
}

#[tokio::test]
async fn test_search_finds_seeded_song() {
    let t = test_app(false).await;
    let (_, body) = search(&t, "DOO-DOO-doo").await;

    assert!(body.contains("Here Comes the Sun"));
    assert!(body.contains("The Beatles"));
    assert!(body.contains("Abbey Road"));
}

#[tokio::test]
async fn test_search_not_found() {
    let t = test_app(false).await;
    let (_, body) = search(&t, "bohemian+rhapsody").await;

    assert!(body.contains("No song found"));
    assert!(!body.contains("Abbey Road"));
}

#[tokio::test]
async fn test_blank_query_rejected_without_match() {
    let t = test_app(false).await;
    let (cookie, body) = search(&t, "+++").await;
    assert!(body.contains("Please enter some text first."));

    // Nothing was stored, so the studio asks for a search first.
    let response = t
        .app
        .clone()
        .oneshot(post_form("/studio/backstory", "", Some(&cookie)))
        .await
        .unwrap();
    let body = body_text(response).await;
    assert!(body.contains("Search for a song first"));
    assert_eq!(*t.completion.calls.lock(), 0);
}

#[tokio::test]
async fn test_studio_draft_uses_matched_song() {
    let t = test_app(false).await;
    let (cookie, _) = search(&t, "birds+flying").await;

    let response = t
        .app
        .clone()
        .oneshot(post_form("/studio/draft", "direction=", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Feeling Good"));
    assert!(body.contains("Golden light on the window"));
    assert_eq!(*t.completion.calls.lock(), 1);
}

#[tokio::test]
async fn test_completion_failure_keeps_session() {
    let t = test_app(true).await;
    let (cookie, _) = search(&t, "here+comes").await;

    let response = t
        .app
        .clone()
        .oneshot(post_form("/studio/translate", "language=French", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Text generation failed."));
    assert!(body.contains("503 Service Unavailable"));

    // The match survives the failed action.
    let response = t.app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_text(response).await;
    assert!(body.contains("Here Comes the Sun"));
}

#[tokio::test]
async fn test_slow_draft_keeps_newer_search() {
    let completion = Arc::new(GatedCompletion::default());
    let (app, _dir) = build_app(completion.clone()).await;

    let response = app
        .clone()
        .oneshot(post_form("/search", "query=here+comes", None))
        .await
        .unwrap();
    let cookie = cookie_of(&response);
    assert!(body_text(response).await.contains("Here Comes the Sun"));

    let draft = tokio::spawn(
        app.clone()
            .oneshot(post_form("/studio/draft", "direction=", Some(&cookie))),
    );
    completion.started.notified().await;

    // Another tab searches while the draft is still being written.
    let response = app
        .clone()
        .oneshot(post_form("/search", "query=birds+flying", Some(&cookie)))
        .await
        .unwrap();
    assert!(body_text(response).await.contains("Feeling Good"));
    completion.release.notify_one();

    let body = body_text(draft.await.unwrap().unwrap()).await;
    assert!(body.contains("Feeling Good"));
    assert!(!body.contains("Here Comes the Sun"));
    assert!(!body.contains("A draft written for the earlier match."));

    let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    let body = body_text(response).await;
    assert!(body.contains("Feeling Good"));
    assert!(!body.contains("Abbey Road"));
}

#[tokio::test]
async fn test_similar_excludes_matched_song() {
    let t = test_app(false).await;
    let (cookie, _) = search(&t, "here+comes+the+sun").await;

    let response = t
        .app
        .clone()
        .oneshot(post_form("/similar", "", Some(&cookie)))
        .await
        .unwrap();
    let body = body_text(response).await;
    assert!(body.contains("Good Day Sunshine"));
    assert!(!body.contains("<strong>Here Comes the Sun</strong>"));
}

#[tokio::test]
async fn test_similar_without_match_prompts_search() {
    let t = test_app(false).await;
    let response = t
        .app
        .clone()
        .oneshot(post_form("/similar", "", None))
        .await
        .unwrap();
    let body = body_text(response).await;
    assert!(body.contains("Search for a song first"));
}

#[tokio::test]
async fn test_explore_theory_escapes_input() {
    let t = test_app(false).await;
    let response = t
        .app
        .clone()
        .oneshot(post_form("/explore/theory", "term=%3Cb%3Ecadence%3C%2Fb%3E", None))
        .await
        .unwrap();
    let body = body_text(response).await;
    assert!(body.contains("&lt;b&gt;cadence&lt;/b&gt;"));
    assert!(!body.contains("<b>cadence</b>"));
    assert!(body.contains("Golden light on the window"));
}

// ---------------------------------------------------------------
// JSON API
// ---------------------------------------------------------------

#[tokio::test]
async fn test_api_lookup() {
    let t = test_app(false).await;
    let response = t
        .app
        .clone()
        .oneshot(json_request("POST", "/api/lookup", r#"{"query": "birds flying"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["found"], true);
    assert_eq!(json["song"]["artist"], "Nina Simone");
    assert_eq!(json["song"]["song_title"], "Feeling Good");

    let response = t
        .app
        .clone()
        .oneshot(json_request("POST", "/api/lookup", r#"{"query": "zzz nothing"}"#))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["found"], false);
    assert!(json["song"].is_null());
}

#[tokio::test]
async fn test_api_lookup_blank_is_bad_request() {
    let t = test_app(false).await;
    let response = t
        .app
        .clone()
        .oneshot(json_request("POST", "/api/lookup", r#"{"query": "   "}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("enter some text"));
}

#[tokio::test]
async fn test_api_status_shape() {
    let t = test_app(false).await;
    let response = t.app.clone().oneshot(get("/api/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["warehouse"], "sqlite");
    assert_eq!(json["search"], "sqlite-fts5");
    assert_eq!(json["songs"], 3);
    assert_eq!(json["similarLimit"], 2);
    assert_eq!(json["completion"]["model"], "scripted-model");
    assert!(json["sessions"].is_number());
    assert_eq!(json["totalArtists"], 2);
    assert!(json["dbSizeMb"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_api_completion_config_validation() {
    let t = test_app(false).await;
    let response = t
        .app
        .clone()
        .oneshot(get("/api/completion/config", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["preferredProvider"].is_string());
    assert!(json["maxTokens"].is_number());

    let response = t
        .app
        .clone()
        .oneshot(json_request("PUT", "/api/completion/config", r#"{"temperature": 5.0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .app
        .clone()
        .oneshot(json_request("PUT", "/api/completion/config", r#"{"maxTokens": 256}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["maxTokens"], 256);
}

#[tokio::test]
async fn test_health() {
    let t = test_app(false).await;
    let response = t.app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
