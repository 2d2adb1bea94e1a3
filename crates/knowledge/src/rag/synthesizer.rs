//! Final answer synthesis.

use crate::rag::types::ContextItem;
use sewana_core::{AppError, AppResult};
use sewana_llm::{LlmClient, LlmRequest};
use sewana_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Produces the answer from the question and the gathered context.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl AnswerSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    pub fn build_request(&self, question: &str, items: &[ContextItem]) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), context_block(items));

        let built = build_prompt(&self.prompt, variables)?;
        Ok(LlmRequest::new(built.user, self.model.clone()).with_optional_system(built.system))
    }

    /// One completion call; any service failure is a [`AppError::Synthesis`].
    pub async fn synthesize(&self, question: &str, items: &[ContextItem]) -> AppResult<String> {
        let request = self.build_request(question, items)?;

        if items.is_empty() {
            tracing::info!("Synthesizing without context");
        }

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        Ok(response.content.trim().to_string())
    }
}

/// Item contents joined by a blank line, in order.
pub fn context_block(items: &[ContextItem]) -> String {
    items
        .iter()
        .map(ContextItem::content)
        .collect::<Vec<_>>()
        .join("\n\n")
}
