//! Completion client for Christopher.
//!
//! Talks to a local Ollama server, any OpenAI-compatible endpoint, or the
//! Anthropic Messages API over plain non-streaming HTTP.
//!
//! ## Modules
//!
//! - [`client`] -- [`LlmClient`], provider selection, wire-format conversion.
//! - [`types`] -- Provider-agnostic chat messages and requests.
//! - [`error`] -- Client error types and conversions into kernel errors.
//!
//! ```no_run
//! use christopher_llm::{ChatRequest, LlmClient, LlmClientConfig};
//!
//! # async fn demo() -> christopher_llm::Result<()> {
//! let client = LlmClient::new(LlmClientConfig::ollama("llama3"))?;
//! let reply = client.chat(&ChatRequest::user("Hello!")).await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{LlmClient, LlmClientConfig, LlmProvider, validate_base_url};
pub use error::{LlmError, Result};
pub use types::{ChatRequest, Message, Role};
