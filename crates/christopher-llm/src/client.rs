//! Multi-provider completion client.
//!
//! Supports three non-streaming endpoints:
//!
//! | Provider | Chat | Raw generate |
//! |----------|------|--------------|
//! | Ollama | `POST /api/chat` | `POST /api/generate` (with a JSON `format` schema) |
//! | OpenAI-compatible | `POST /chat/completions` | -- |
//! | Anthropic | `POST /v1/messages` | -- |
//!
//! [`LlmClient`] implements the kernel's [`CompletionBackend`], so the same
//! client can sit behind the classifier gateway and behind chat handlers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use christopher_kernel::{ClassifierError, CompletionBackend, CompletionRequest};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, Message, Role};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Ollama base URL.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// System prompt used when a chat endpoint stands in for structured output.
const JSON_ONLY_SYSTEM: &str =
    "You are a request router. Reply with a single JSON object and nothing else.";

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which API the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server.
    Ollama,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
    /// Anthropic Messages API.
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => OLLAMA_BASE_URL,
            Self::OpenAI => OPENAI_BASE_URL,
            Self::Anthropic => ANTHROPIC_BASE_URL,
        }
    }

    fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub provider: LlmProvider,
    /// API key; may be empty for Ollama.
    pub api_key: String,
    /// Base URL for the API (e.g. `http://localhost:11434`).
    pub base_url: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl LlmClientConfig {
    fn with_provider(
        provider: LlmProvider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_owned(),
            default_model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a configuration for a local Ollama server.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Ollama, String::new(), model)
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::OpenAI, api_key, model)
    }

    /// Create a configuration for the Anthropic API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Anthropic, api_key, model)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Check that `raw` is an absolute `http`/`https` URL with a host and return
/// it without a trailing slash.
pub fn validate_base_url(raw: &str) -> Result<String> {
    let invalid = |reason: &str| LlmError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    let parsed = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(raw.trim().trim_end_matches('/').to_owned())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A non-streaming client for one provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    ///
    /// Fails when the provider needs an API key and none is set, or when the
    /// base URL is not a valid http(s) URL.
    pub fn new(mut config: LlmClientConfig) -> Result<Self> {
        if config.provider.requires_api_key() && config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: config.provider.to_string(),
            });
        }
        config.base_url = validate_base_url(&config.base_url)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send a chat request and return the assistant's text.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let (path, body) = match self.config.provider {
            LlmProvider::Ollama => ("/api/chat", self.build_ollama_chat_body(request)),
            LlmProvider::OpenAI => ("/chat/completions", self.build_openai_request_body(request)),
            LlmProvider::Anthropic => ("/v1/messages", self.build_anthropic_request_body(request)),
        };

        let v = self.post_json(path, &body).await?;

        match self.config.provider {
            LlmProvider::Ollama => parse_ollama_chat_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
            LlmProvider::Anthropic => parse_anthropic_response(&v),
        }
    }

    /// Single-prompt completion via Ollama's `/api/generate`, optionally
    /// constrained by a JSON schema.
    pub async fn generate(&self, prompt: &str, format: Option<&Value>) -> Result<String> {
        if self.config.provider != LlmProvider::Ollama {
            return Err(LlmError::Unsupported {
                provider: self.config.provider.to_string(),
                operation: "generate".into(),
            });
        }
        let body = self.build_ollama_generate_body(prompt, format);
        let v = self.post_json("/api/generate", &body).await?;
        parse_ollama_generate_response(&v)
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }

    fn build_ollama_generate_body(&self, prompt: &str, format: Option<&Value>) -> Value {
        let mut body = json!({
            "model": self.config.default_model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(schema) = format {
            body["format"] = schema.clone();
        }
        body
    }

    fn build_ollama_chat_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "messages": messages_to_openai(&request.messages),
            "stream": false,
        });
        if let Some(temp) = request.temperature {
            body["options"] = json!({ "temperature": temp });
        }
        body
    }

    fn build_openai_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages_to_openai(&request.messages),
        });
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn build_anthropic_request_body(&self, request: &ChatRequest) -> Value {
        let (system_text, messages) = messages_to_anthropic(&request.messages);

        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages,
        });
        if let Some(system) = system_text {
            body["system"] = json!(system);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.config.provider {
            LlmProvider::Ollama => {}
            LlmProvider::OpenAI => {
                let auth_value = format!("Bearer {}", self.config.api_key);
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&auth_value).map_err(|e| LlmError::RequestFailed {
                        reason: format!("invalid authorization header: {e}"),
                    })?,
                );
            }
            LlmProvider::Anthropic => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                        LlmError::RequestFailed {
                            reason: format!("invalid API key header: {e}"),
                        }
                    })?,
                );
                headers.insert(
                    "anthropic-version",
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
            }
        }
        Ok(headers)
    }

    /// POST `body` to `path` and return the parsed JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.config.base_url);

        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = %self.config.provider,
            "sending LLM request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        serde_json::from_str(&text).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<String, ClassifierError> {
        let text = match self.config.provider {
            LlmProvider::Ollama => {
                self.generate(&request.prompt, Some(&request.expected_schema))
                    .await?
            }
            LlmProvider::OpenAI | LlmProvider::Anthropic => {
                let chat = ChatRequest {
                    temperature: Some(0.0),
                    ..ChatRequest::user(request.prompt.clone())
                }
                .with_system(JSON_ONLY_SYSTEM);
                self.chat(&chat).await?
            }
        };
        Ok(text)
    }
}

// ===========================================================================
// Wire format conversion (free functions)
// ===========================================================================

/// Convert messages to the OpenAI (and Ollama chat) wire format, where
/// system messages stay in the `messages` array.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect()
}

/// Split messages into Anthropic's top-level `system` string and the
/// user/assistant `messages` array.
fn messages_to_anthropic(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let system_parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let rest = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect();

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, rest)
}

/// Extract the `response` field of an Ollama `/api/generate` reply.
pub fn parse_ollama_generate_response(v: &Value) -> Result<String> {
    v["response"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| LlmError::ParseFailed {
            reason: "missing `response` string in response".into(),
        })
}

/// Extract `message.content` of an Ollama `/api/chat` reply.
pub fn parse_ollama_chat_response(v: &Value) -> Result<String> {
    v["message"]["content"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| LlmError::ParseFailed {
            reason: "missing `message.content` in response".into(),
        })
}

/// Extract `choices[0].message.content` of an OpenAI reply.
pub fn parse_openai_response(v: &Value) -> Result<String> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        return Err(LlmError::ParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }
    Ok(message["content"].as_str().unwrap_or_default().to_owned())
}

/// Concatenate the text blocks of an Anthropic reply.
pub fn parse_anthropic_response(v: &Value) -> Result<String> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| LlmError::ParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    Ok(content
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
