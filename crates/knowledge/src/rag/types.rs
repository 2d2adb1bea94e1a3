//! Request state and response types for the answering flow.

use crate::retriever::ScoredPassage;
use serde::{Deserialize, Serialize};
use sewana_core::{AppError, AppResult};

/// Grader verdict carried by a context item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Relevant,
    Irrelevant,
    /// Not graded (fresh retrievals and structured records)
    Unknown,
}

/// Where a context item came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    Retrieved { score: f32 },
    Structured,
}

/// One piece of evidence offered to the synthesizer.
///
/// Items are never mutated; grading produces a new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    content: String,
    relevance: Relevance,
    origin: Origin,
}

impl ContextItem {
    pub fn retrieved(passage: ScoredPassage) -> Self {
        Self {
            content: passage.text,
            relevance: Relevance::Unknown,
            origin: Origin::Retrieved {
                score: passage.score,
            },
        }
    }

    /// Item built from one structured-store record.
    pub fn structured(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            relevance: Relevance::Unknown,
            origin: Origin::Structured,
        }
    }

    /// Copy of this item carrying a verdict.
    pub fn graded(&self, relevance: Relevance) -> Self {
        Self {
            relevance,
            ..self.clone()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn relevance(&self) -> Relevance {
        self.relevance
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/// Per-request state threaded through the answering flow.
#[derive(Debug, Clone)]
pub struct RequestState {
    question: String,
    context_items: Vec<ContextItem>,
    needs_fallback: bool,
    graded: bool,
    answer: Option<String>,
}

impl RequestState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context_items: Vec::new(),
            needs_fallback: false,
            graded: false,
            answer: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn context_items(&self) -> &[ContextItem] {
        &self.context_items
    }

    pub fn set_retrieved(&mut self, items: Vec<ContextItem>) {
        self.context_items = items;
    }

    /// Record grading: `verdicts` holds every retrieved item with its
    /// verdict, in retrieval order. Only relevant ones are kept.
    ///
    /// Fallback is needed when nothing was retrieved or any item failed.
    pub fn apply_grades(&mut self, verdicts: Vec<ContextItem>) {
        self.needs_fallback = verdicts.is_empty()
            || verdicts
                .iter()
                .any(|item| item.relevance != Relevance::Relevant);
        self.context_items = verdicts
            .into_iter()
            .filter(|item| item.relevance == Relevance::Relevant)
            .collect();
        self.graded = true;
    }

    pub fn extend_context(&mut self, items: impl IntoIterator<Item = ContextItem>) {
        self.context_items.extend(items);
    }

    /// Meaningful once graded; `false` before.
    pub fn needs_fallback(&self) -> bool {
        self.graded && self.needs_fallback
    }

    pub fn is_graded(&self) -> bool {
        self.graded
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// Set the answer. A second write is an error.
    pub fn set_answer(&mut self, answer: impl Into<String>) -> AppResult<()> {
        if self.answer.is_some() {
            return Err(AppError::Other(
                "answer was already set for this request".to_string(),
            ));
        }
        self.answer = Some(answer.into());
        Ok(())
    }

    pub fn into_answer(self) -> Option<String> {
        self.answer
    }
}

/// What happened while answering one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagTrace {
    /// States entered, in order
    pub states: Vec<String>,
    pub fallback_used: bool,
    pub retrieved: usize,
    pub kept: usize,
    pub structured: usize,
}

/// Final answer plus its trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub trace: RagTrace,
}
