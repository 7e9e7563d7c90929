//! Chat-model handlers.
//!
//! [`ChatHandler`] forwards the user's text to a chat model through
//! [`LlmClient`] and returns the model's reply.  The `default`, `writing` and
//! `programming` handlers are all instances of it, differing only in id,
//! description, system prompt and client.

use async_trait::async_trait;
use christopher_kernel::{
    DEFAULT_HANDLER_ID, Handler, HandlerContext, HandlerError, HandlerOutput,
};
use christopher_llm::{ChatRequest, LlmClient};

pub const DEFAULT_DESCRIPTION: &str = "A default agent that handles general queries and tasks";

pub const WRITING_ID: &str = "writing";

pub const WRITING_DESCRIPTION: &str =
    "A writing assistant that helps with content creation, editing, and writing tasks";

pub const PROGRAMMING_ID: &str = "programming";

pub const PROGRAMMING_DESCRIPTION: &str =
    "A programming assistant that helps with coding tasks, debugging, and software development";

const WRITING_SYSTEM: &str =
    "You are a writing assistant. Help the user draft, edit and improve their text.";

const PROGRAMMING_SYSTEM: &str =
    "You are a programming assistant. Help the user write, debug and understand code.";

/// Context key whose value, when present, is sent as an extra system prompt.
pub const CONTEXT_SYSTEM_KEY: &str = "system";

/// A handler backed by one chat model.
#[derive(Debug, Clone)]
pub struct ChatHandler {
    id: String,
    description: String,
    system_prompt: Option<String>,
    client: LlmClient,
}

impl ChatHandler {
    pub fn new(id: impl Into<String>, description: impl Into<String>, client: LlmClient) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            system_prompt: None,
            client,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// General-purpose fallback handler.
    pub fn general(client: LlmClient) -> Self {
        Self::new(DEFAULT_HANDLER_ID, DEFAULT_DESCRIPTION, client)
    }

    /// Content creation and editing.
    pub fn writing(client: LlmClient) -> Self {
        Self::new(WRITING_ID, WRITING_DESCRIPTION, client).with_system_prompt(WRITING_SYSTEM)
    }

    /// Coding help.
    pub fn programming(client: LlmClient) -> Self {
        Self::new(PROGRAMMING_ID, PROGRAMMING_DESCRIPTION, client)
            .with_system_prompt(PROGRAMMING_SYSTEM)
    }

    fn request_for(&self, input: &str, context: &HandlerContext) -> ChatRequest {
        let mut request = ChatRequest {
            temperature: Some(0.0),
            ..ChatRequest::user(input)
        };
        if let Some(extra) = context.get(CONTEXT_SYSTEM_KEY) {
            request = request.with_system(extra.clone());
        }
        if let Some(system) = &self.system_prompt {
            request = request.with_system(system.clone());
        }
        request
    }
}

#[async_trait]
impl Handler for ChatHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(
        &self,
        input: &str,
        context: &HandlerContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let request = self.request_for(input, context);
        tracing::debug!(
            handler_id = %self.id,
            provider = %self.client.provider(),
            model = %self.client.default_model(),
            "calling chat model"
        );
        let reply = self.client.chat(&request).await?;
        Ok(HandlerOutput::Text(reply))
    }
}
