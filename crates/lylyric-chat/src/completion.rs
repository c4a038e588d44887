//! [`CompletionService`] backed by whichever provider the live config resolves.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, warn};

use lylyric_core::{CompletionService, Error, Result};
use lylyric_snowflake::SnowflakeClient;

use crate::config::LLMConfig;
use crate::prompts::SYSTEM_PROMPT;
use crate::providers::{self, Sampling};
use crate::types::ChatMessage;

/// Completion service that re-reads the shared config on every call, so
/// config updates take effect without a restart.
#[derive(Clone)]
pub struct ConfiguredCompletion {
    http: Client,
    config: Arc<RwLock<LLMConfig>>,
    snowflake: Option<SnowflakeClient>,
}

impl ConfiguredCompletion {
    pub fn new(config: Arc<RwLock<LLMConfig>>, snowflake: Option<SnowflakeClient>) -> Self {
        Self {
            http: Client::new(),
            config,
            snowflake,
        }
    }

    pub fn config(&self) -> &Arc<RwLock<LLMConfig>> {
        &self.config
    }
}

#[async_trait]
impl CompletionService for ConfiguredCompletion {
    fn model(&self) -> Option<String> {
        self.config.read().resolve_provider().map(|r| r.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let (resolved, sampling) = {
            let config = self.config.read();
            let sampling = Sampling {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            };
            (config.resolve_provider(), sampling)
        };

        let resolved = resolved
            .ok_or_else(|| Error::Config("No completion provider configured".into()))?;

        debug!(
            "Completion via {} ({}), prompt {} chars",
            resolved.provider,
            resolved.model,
            prompt.len()
        );

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let stream = providers::stream_llm(
            &self.http,
            self.snowflake.as_ref(),
            resolved.provider,
            messages,
            &resolved.model,
            &resolved.api_key,
            sampling,
        );

        let text = providers::collect_stream(stream).await.map_err(|e| {
            warn!("Completion failed: {}", e);
            Error::Completion(e)
        })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Completion("The model returned an empty response".into()));
        }
        Ok(text.to_string())
    }
}
