//! Authenticated HTTP transport shared by the SQL, search and completion APIs.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use lylyric_core::{Error, Result, SnowflakeSettings};

const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
const TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for one Snowflake account.
#[derive(Clone)]
pub struct SnowflakeClient {
    http: Client,
    base_url: String,
    settings: SnowflakeSettings,
}

impl std::fmt::Debug for SnowflakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeClient")
            .field("base_url", &self.base_url)
            .field("user", &self.settings.user)
            .finish()
    }
}

impl SnowflakeClient {
    pub fn new(settings: SnowflakeSettings) -> Result<Self> {
        let base_url = account_url(&settings.account);
        Self::with_base_url(settings, base_url)
    }

    /// Client pointed at an explicit base URL (proxies, private links).
    pub fn with_base_url(settings: SnowflakeSettings, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("lylyric/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
        })
    }

    pub fn settings(&self) -> &SnowflakeSettings {
        &self.settings
    }

    /// Full URL for an API path such as `/api/v2/statements`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST with auth headers and a JSON body.
    pub fn post(&self, path: &str, body: &Value) -> RequestBuilder {
        debug!("POST {}", path);
        self.authorize(self.http.post(self.url(path))).json(body)
    }

    /// GET with auth headers.
    pub fn get(&self, path: &str) -> RequestBuilder {
        debug!("GET {}", path);
        self.authorize(self.http.get(self.url(path)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.settings.password)
            .header(TOKEN_TYPE_HEADER, TOKEN_TYPE)
            .header("Accept", "application/json")
    }
}

/// `https://<account>.snowflakecomputing.com`. Underscores are not valid in
/// hostnames, so the account locator is normalised to hyphens.
pub fn account_url(account: &str) -> String {
    let host = account.trim().to_lowercase().replace('_', "-");
    format!("https://{}.snowflakecomputing.com", host)
}

/// Pull `code`/`message` out of an error body, falling back to the raw text.
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => {
            let message = v["message"].as_str().unwrap_or(body);
            match v["code"].as_str() {
                Some(code) => format!("{} ({}): {}", status, code, message),
                None => format!("{}: {}", status, message),
            }
        }
        Err(_) => format!("{}: {}", status, body),
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> SnowflakeSettings {
    SnowflakeSettings {
        account: "MyOrg_Acct".into(),
        user: "lyric_app".into(),
        password: "pat".into(),
        warehouse: "COMPUTE_WH".into(),
        database: "MUSIC".into(),
        schema: "PUBLIC".into(),
        role: Some("LYRIC_ROLE".into()),
        search_service: Some("LYRICS_SEARCH".into()),
    }
}

/// Serve `router` on an ephemeral local port and return a client aimed at it.
#[cfg(test)]
pub(crate) async fn stub_client(router: axum::Router) -> SnowflakeClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    SnowflakeClient::with_base_url(test_settings(), format!("http://{}", addr)).unwrap()
}
