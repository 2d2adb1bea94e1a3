//! Natural-language to structured query translation.

use crate::literal::parse_literal;
use crate::pipeline::StructuredQuery;
use crate::schema::{render_examples, QueryExample, SchemaDescriptor};
use serde_json::Value;
use sewana_core::{AppError, AppResult};
use sewana_llm::{LlmClient, LlmRequest};
use sewana_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a question into a [`StructuredQuery`] with one completion call.
pub struct QueryTranslator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl QueryTranslator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    /// Render the instruction sent to the completion service.
    pub fn build_request(
        &self,
        question: &str,
        schema: &SchemaDescriptor,
        examples: &[QueryExample],
    ) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("collection".to_string(), schema.collection.clone());
        variables.insert("schema".to_string(), schema.render_shape());
        variables.insert("schema_description".to_string(), schema.render_description());
        variables.insert("examples".to_string(), render_examples(examples));
        variables.insert("question".to_string(), question.to_string());

        let built = build_prompt(&self.prompt, variables)?;
        Ok(LlmRequest::new(built.user, self.model.clone())
            .with_optional_system(built.system)
            .with_temperature(0.0))
    }

    /// Translate a question. Never retries; every failure is a
    /// [`AppError::Translation`].
    pub async fn translate(
        &self,
        question: &str,
        schema: &SchemaDescriptor,
        examples: &[QueryExample],
    ) -> AppResult<StructuredQuery> {
        if question.trim().is_empty() {
            return Err(AppError::translation("question is empty", ""));
        }

        let request = self
            .build_request(question, schema, examples)
            .map_err(|e| AppError::translation(format!("prompt could not be rendered: {}", e), ""))?;
        let response = self.client.complete(&request).await.map_err(|e| {
            AppError::translation(format!("completion service failed: {}", e), "")
        })?;

        let query = parse_completion(&response.content)?;
        for field in uncast_comparisons(&query, schema) {
            tracing::warn!(
                field = %field,
                "Structured query compares a string-stored field without casting it"
            );
        }

        tracing::debug!(stages = query.len(), query = %query.to_json(), "Translated question");
        Ok(query)
    }
}

/// Parse completion text into a query.
///
/// Code fences are stripped, then strict JSON is tried before the
/// permissive literal form.
pub fn parse_completion(raw: &str) -> AppResult<StructuredQuery> {
    if raw.trim().is_empty() {
        return Err(AppError::translation("completion was empty", raw));
    }

    let body = strip_code_fences(raw);
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(json_err) => parse_literal(body).map_err(|literal_err| {
            AppError::translation(
                format!(
                    "completion is neither JSON ({}) nor a literal ({})",
                    json_err, literal_err
                ),
                raw,
            )
        })?,
    };

    StructuredQuery::from_value(value).map_err(|reason| AppError::translation(reason, raw))
}

/// Remove a surrounding ``` or ```json fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Cast-requiring fields that a `$match` compares without a prior cast.
pub fn uncast_comparisons(query: &StructuredQuery, schema: &SchemaDescriptor) -> Vec<String> {
    let cast_fields = schema.cast_fields();
    let mut found = Vec::new();

    for stage in query.stages() {
        if stage.operator() != Some("$match") {
            continue;
        }
        let Some(Value::Object(filter)) = stage.operand() else {
            continue;
        };
        for (field, condition) in filter {
            let is_cast_field = cast_fields.iter().any(|(path, _)| path == field);
            let is_range = condition.as_object().is_some_and(|ops| {
                ops.keys()
                    .any(|op| matches!(op.as_str(), "$lt" | "$lte" | "$gt" | "$gte"))
            });
            if is_cast_field && is_range && !found.contains(field) {
                found.push(field.clone());
            }
        }
    }
    found
}
