//! Breakdown providers: turn one chunk of text into an epic/story tree

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chunker::Chunk;
use crate::domain::Breakdown;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, StopReason};
use crate::prompts::PromptLoader;

const SYSTEM_PROMPT: &str = "You turn project descriptions into agile backlogs. You answer with JSON only.";

/// Errors from one breakdown attempt; every variant is retryable
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("failed to parse AI response as JSON: {message}\nResponse: {response}")]
    Parse { message: String, response: String },

    #[error("failed to render prompt: {0}")]
    Prompt(String),
}

/// Produces a breakdown for one chunk
#[async_trait]
pub trait BreakdownProvider: Send + Sync {
    async fn breakdown(&self, chunk: &Chunk) -> Result<Breakdown, ProviderError>;
}

/// Provider backed by an LLM completion endpoint
pub struct LlmBreakdownProvider {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl LlmBreakdownProvider {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }
}

#[async_trait]
impl BreakdownProvider for LlmBreakdownProvider {
    async fn breakdown(&self, chunk: &Chunk) -> Result<Breakdown, ProviderError> {
        debug!(index = chunk.index(), total = chunk.total(), chars = chunk.char_len(), "breakdown: called");
        let prompt = self
            .prompts
            .render_for(chunk)
            .map_err(|e| ProviderError::Prompt(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(prompt)],
            max_tokens: self.max_tokens,
        };

        let response = self.llm.complete(request).await?;
        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "breakdown: chunk {}/{} answered",
            chunk.index(),
            chunk.total()
        );

        if response.stop_reason == StopReason::MaxTokens {
            warn!(max_tokens = self.max_tokens, "breakdown: response hit the token limit, JSON may be cut off");
        }

        let text = response.content.ok_or(ProviderError::EmptyResponse)?;
        parse_breakdown(&text)
    }
}

/// Parse a model response into a breakdown
///
/// Surrounding Markdown code fences are removed first. The result must
/// satisfy the title invariants.
pub fn parse_breakdown(text: &str) -> Result<Breakdown, ProviderError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut breakdown: Breakdown = serde_json::from_str(body).map_err(|e| ProviderError::Parse {
        message: e.to_string(),
        response: body.to_string(),
    })?;

    breakdown.validate().map_err(|message| ProviderError::Parse {
        message,
        response: body.to_string(),
    })?;

    breakdown.recompute_totals();
    Ok(breakdown)
}

/// Trim whitespace and a surrounding ```` ```json ```` / ```` ``` ```` fence
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
