//! Crate-level tests for ingestion and the answering flow.

mod common;
mod state_machine;
