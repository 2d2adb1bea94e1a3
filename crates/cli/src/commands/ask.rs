//! Ask command handler.

use crate::commands::setup;
use clap::Args;
use sewana_core::{config::AppConfig, AppError, AppResult};
use sewana_knowledge::RagResponse;

/// Answer one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output the answer and its trace as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.question.trim();
        if question.is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }

        let assistant = setup::assistant(config)?;

        let response = assistant.ask(question).await?;
        print_response(&response, self.json)
    }
}

pub fn print_response(response: &RagResponse, json: bool) -> AppResult<()> {
    if json {
        let output = serde_json::json!({
            "answer": response.answer,
            "trace": {
                "states": response.trace.states,
                "fallbackUsed": response.trace.fallback_used,
                "retrieved": response.trace.retrieved,
                "kept": response.trace.kept,
                "structured": response.trace.structured,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", response.answer);
    }
    Ok(())
}
