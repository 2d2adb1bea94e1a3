//! Completion-service integration for the Sewana assistant.
//!
//! A provider-agnostic [`LlmClient`] trait plus Ollama and OpenAI
//! implementations. Retries and timeouts live here, in the adapters, so
//! callers see a single request/response call.
//!
//! # Example
//! ```no_run
//! use sewana_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What are the visiting hours?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use retry::RetryPolicy;
pub use types::ProviderType;
