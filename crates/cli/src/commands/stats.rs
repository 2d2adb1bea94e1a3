//! Stats command handler.

use clap::Args;
use sewana_core::{config::AppConfig, AppResult};

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Knowledge base name (default: retriever.base from config)
    #[arg(short, long)]
    pub base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = self.base.as_deref().unwrap_or(&config.retriever.base);
        tracing::info!("Executing stats command for base '{}'", base);

        let stats = sewana_knowledge::stats(&config.workspace, base)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks:  {}", stats.chunks_count);
            println!("  Size:    {} bytes", stats.db_size_bytes);
            match stats.last_learn_at {
                Some(at) => println!("  Learned: {}", at.to_rfc3339()),
                None => println!("  Learned: never"),
            }
        }

        Ok(())
    }
}
