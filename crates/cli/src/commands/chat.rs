//! Chat command handler.

use crate::commands::setup;
use clap::Args;
use sewana_core::{config::AppConfig, AppError, AppResult};
use sewana_knowledge::Assistant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Answer questions read from stdin, one per line
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Output each answer and its trace as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let assistant = setup::assistant(config)?;
        let failures = self
            .answer_lines(&assistant, BufReader::new(tokio::io::stdin()))
            .await?;

        if failures > 0 {
            return Err(AppError::Other(format!(
                "{} question(s) could not be answered",
                failures
            )));
        }
        Ok(())
    }

    /// Answer each non-blank line; returns how many requests failed.
    async fn answer_lines<R>(&self, assistant: &Assistant, input: R) -> AppResult<u32>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut failures = 0u32;

        while let Some(line) = lines.next_line().await? {
            let question = line.trim();

            if question.is_empty() {
                eprintln!("Please enter a question.");
                continue;
            }

            match assistant.ask(question).await {
                Ok(response) => super::ask::print_response(&response, self.json)?,
                Err(e) => {
                    tracing::error!("Request failed: {}", e);
                    println!("{}", setup::failure_message(&e));
                    failures += 1;
                }
            }
        }

        Ok(failures)
    }
}
