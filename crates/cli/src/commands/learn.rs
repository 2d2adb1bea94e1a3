//! Learn command handler.

use clap::Args;
use sewana_core::{config::AppConfig, AppResult};
use sewana_knowledge::LearnOptions;
use std::path::PathBuf;

/// Learn documents into a knowledge base
#[derive(Args, Debug)]
pub struct LearnCommand {
    /// Files or directories to learn from
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Knowledge base name (default: retriever.base from config)
    #[arg(short, long)]
    pub base: Option<String>,

    /// Only learn paths containing one of these substrings
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing any of these substrings
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Reset base before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = self
            .base
            .clone()
            .unwrap_or_else(|| config.retriever.base.clone());
        tracing::info!("Executing learn command for base '{}'", base);

        let options = LearnOptions {
            base_name: base.clone(),
            paths: self
                .paths
                .iter()
                .map(|p| {
                    if p.is_absolute() {
                        p.clone()
                    } else {
                        config.workspace.join(p)
                    }
                })
                .collect(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            reset: self.reset,
        };

        let stats = sewana_knowledge::learn(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "sourcesCount": stats.sources_count,
                "unchangedCount": stats.unchanged_count,
                "failedCount": stats.failed_count,
                "chunksCount": stats.chunks_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} sources into '{}' ({} chunks, {} bytes) in {:.2}s; {} unchanged, {} failed",
                stats.sources_count,
                base,
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs,
                stats.unchanged_count,
                stats.failed_count
            );
        }

        Ok(())
    }
}
