//! Structured-query fallback for the Sewana assistant.
//!
//! Translates a question into an aggregation pipeline with the completion
//! service and runs it against a document store:
//! - [`SchemaDescriptor`] describes the collection and carries worked examples
//! - [`QueryTranslator`] produces a [`StructuredQuery`]
//! - [`QueryExecutor`] runs it through a [`DocumentStore`]

pub mod executor;
pub mod literal;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod translator;

// Re-export main types
pub use executor::{record_to_text, DocumentStore, QueryExecutor, Record};
pub use pipeline::{CastOp, Stage, StructuredQuery};
pub use schema::{render_examples, FieldSpec, FieldType, QueryExample, SchemaDescriptor};
pub use store::InMemoryStore;
pub use translator::{parse_completion, strip_code_fences, QueryTranslator};
