//! Relevance grading of retrieved passages.

use crate::rag::types::{ContextItem, Relevance};
use serde_json::Value;
use sewana_core::AppResult;
use sewana_llm::{LlmClient, LlmRequest};
use sewana_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Asks the completion service whether a passage helps answer a question.
pub struct RelevanceGrader {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl RelevanceGrader {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    pub fn build_request(&self, question: &str, item: &ContextItem) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("document".to_string(), item.content().to_string());
        variables.insert("question".to_string(), question.to_string());

        let built = build_prompt(&self.prompt, variables)?;
        Ok(LlmRequest::new(built.user, self.model.clone())
            .with_optional_system(built.system)
            .with_temperature(0.0))
    }

    /// Grade one item. Never yields `Unknown`.
    ///
    /// Unrecognised output and service failures both resolve to
    /// `Irrelevant`; only prompt rendering errors propagate.
    pub async fn grade(&self, question: &str, item: &ContextItem) -> AppResult<Relevance> {
        let request = self.build_request(question, item)?;

        let raw = match self.client.complete(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                tracing::warn!("Grading call failed, treating passage as irrelevant: {}", e);
                return Ok(Relevance::Irrelevant);
            }
        };

        match parse_verdict(&raw) {
            Some(relevance) => {
                tracing::debug!(verdict = ?relevance, "Graded passage");
                Ok(relevance)
            }
            None => {
                tracing::warn!(
                    output = %raw.trim(),
                    "Ambiguous grade, treating passage as irrelevant"
                );
                Ok(Relevance::Irrelevant)
            }
        }
    }
}

/// Read a yes/no verdict from grader output.
///
/// Accepts `yes`/`no` in any case, optionally quoted or followed by a
/// period, and the `{"binary_score": "yes"}` form.
pub fn parse_verdict(raw: &str) -> Option<Relevance> {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed).ok()?;
        return value
            .get("binary_score")
            .and_then(Value::as_str)
            .and_then(parse_token);
    }

    parse_token(trimmed)
}

fn parse_token(token: &str) -> Option<Relevance> {
    let token = token
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim();

    if token.eq_ignore_ascii_case("yes") {
        Some(Relevance::Relevant)
    } else if token.eq_ignore_ascii_case("no") {
        Some(Relevance::Irrelevant)
    } else {
        None
    }
}
