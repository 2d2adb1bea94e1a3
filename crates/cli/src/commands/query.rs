//! Query command handler.
//!
//! Runs only the structured search: translate, then execute.

use crate::commands::setup;
use clap::Args;
use sewana_core::{config::AppConfig, AppError, AppResult};
use sewana_query::record_to_text;

/// Translate a question into a structured query and run it
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// The question to translate
    pub question: String,

    /// Output the query and records as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");

        let client = setup::llm_client(config)?;
        let translator = setup::translator(config, client)?;
        let executor = setup::executor(config)?;
        let schema = setup::schema(config)?;

        let query = match translator
            .translate(&self.question, &schema, &schema.examples)
            .await
        {
            Ok(query) => query,
            Err(AppError::Translation { reason, raw }) => {
                if !raw.is_empty() {
                    eprintln!("Completion was:\n{}", raw);
                }
                return Err(AppError::Translation { reason, raw });
            }
            Err(e) => return Err(e),
        };

        let records = executor.execute(&query).await?;

        if self.json {
            let output = serde_json::json!({
                "collection": executor.collection(),
                "pipeline": query,
                "records": records,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", query.to_pretty_json());
            println!();
            if records.is_empty() {
                println!("No matching records.");
            }
            for record in &records {
                println!("{}\n", record_to_text(record));
            }
        }

        Ok(())
    }
}
