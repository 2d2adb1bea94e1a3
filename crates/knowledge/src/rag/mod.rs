//! Retrieval-augmented answering with a structured-query fallback.

pub mod grader;
pub mod machine;
pub mod synthesizer;
pub mod types;

pub use grader::{parse_verdict, RelevanceGrader};
pub use machine::{transition, Assistant, AssistantDeps, State};
pub use synthesizer::{context_block, AnswerSynthesizer};
pub use types::{ContextItem, Origin, RagResponse, RagTrace, Relevance, RequestState};
