//! Selector oracle: picks the main content path from a node record sequence
//!
//! The core only depends on `SelectorOracle`. `ChatCompletionOracle` talks to an
//! OpenAI-compatible chat endpoint using ureq (simple blocking HTTP).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::document::NodeRecord;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Answers with a path expression for the primary content of a page.
///
/// The answer is returned raw; cleaning it is the caller's job.
pub trait SelectorOracle: Send + Sync {
    fn select(&self, records: &[NodeRecord]) -> Result<String, OracleError>;
}

impl<F> SelectorOracle for F
where
    F: Fn(&[NodeRecord]) -> Result<String, OracleError> + Send + Sync,
{
    fn select(&self, records: &[NodeRecord]) -> Result<String, OracleError> {
        self(records)
    }
}

const SYSTEM_PROMPT: &str = "You locate the primary content of web pages.

The user message is a JSON array of the text-bearing nodes of one HTML page, in
reading order. Each entry has a `path` (the chain of ancestor tags from the root,
for example /html/body/main/article/p) and the `text` found at that path.

Find the single top-level element that holds the page's primary content, such as
an article body or main section. Leave out navigation, headers, footers, sidebars,
cookie notices and advertising.

Answer with the path of that element and nothing else, for example:
/html/body/div/main/article";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion backed oracle
pub struct ChatCompletionOracle {
    agent: ureq::Agent,
    config: LlmConfig,
}

impl std::fmt::Debug for ChatCompletionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionOracle")
            .field("model", &self.config.model)
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

impl ChatCompletionOracle {
    pub fn new(config: LlmConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
                .build(),
        );
        Self { agent, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl SelectorOracle for ChatCompletionOracle {
    fn select(&self, records: &[NodeRecord]) -> Result<String, OracleError> {
        // same encoding the trimmer measured
        let payload = serde_json::to_string(records)?;
        let body = build_request_body(&self.config.model, self.config.temperature, &payload)?;

        debug!(
            model = %self.config.model,
            records = records.len(),
            bytes = body.len(),
            "requesting main content path"
        );

        let response = self
            .agent
            .post(&self.config.endpoint)
            .header("Authorization", &format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    warn!(status, "chat endpoint rejected request");
                    OracleError::Status(status)
                }
                other => OracleError::Transport(other.to_string()),
            })?;

        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        parse_chat_response(&text)
    }
}

/// Serialized chat request for one payload
pub fn build_request_body(
    model: &str,
    temperature: f32,
    payload: &str,
) -> Result<String, OracleError> {
    let request = ChatRequest {
        model,
        temperature,
        messages: [
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: payload,
            },
        ],
    };
    Ok(serde_json::to_string(&request)?)
}

/// Content of the first choice of a chat completion response
pub fn parse_chat_response(body: &str) -> Result<String, OracleError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| OracleError::InvalidResponse("response has no message content".to_string()))
}
