//! Error types for the Sewana assistant.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, completion service, retrieval, prompts, and the
//! structured-query fallback path.

use thiserror::Error;

/// Unified error type for the Sewana assistant.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion service errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index, embedding and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The completion service produced no usable structured query.
    ///
    /// `raw` keeps the completion text for diagnostics.
    #[error("Translation failed: {reason}")]
    Translation { reason: String, raw: String },

    /// The structured store rejected the query or was unreachable
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The completion service failed while producing the final answer
    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a translation failure carrying the raw completion text.
    pub fn translation(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        AppError::Translation {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Whether the fallback search may swallow this error and continue.
    pub fn is_fallback_recoverable(&self) -> bool {
        matches!(self, AppError::Translation { .. } | AppError::Execution(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
