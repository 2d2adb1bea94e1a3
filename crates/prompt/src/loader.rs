//! Prompt loader for YAML prompt definitions.
//!
//! A definition is looked up in `.sewana/prompts/<id>.yml` first and falls
//! back to the copy compiled into this crate.

use crate::types::PromptDefinition;
use sewana_core::{AppError, AppResult};
use std::path::Path;

/// Prompt used by the query translator.
pub const QUERY_TRANSLATE: &str = "query.translate";
/// Prompt used by the relevance grader.
pub const RAG_GRADE: &str = "rag.grade";
/// Prompt used by the answer synthesizer.
pub const RAG_ANSWER: &str = "rag.answer";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        QUERY_TRANSLATE,
        include_str!("../prompts/query.translate.yml"),
    ),
    (RAG_GRADE, include_str!("../prompts/rag.grade.yml")),
    (RAG_ANSWER, include_str!("../prompts/rag.answer.yml")),
];

/// Raw YAML of a built-in prompt, if one exists with this ID.
pub fn builtin_prompt(prompt_id: &str) -> Option<&'static str> {
    BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, yaml)| *yaml)
}

/// Load a prompt definition by ID.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.sewana/`
/// * `prompt_id` - Prompt identifier (e.g., "rag.grade")
///
/// # Example
/// ```no_run
/// use sewana_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "rag.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".sewana/prompts")
        .join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some(builtin) = builtin_prompt(prompt_id) {
        (builtin.to_string(), format!("builtin:{}", prompt_id))
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt not found: {} (no override at {:?} and no built-in)",
            prompt_id, prompt_file
        )));
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt: {} ({})", definition.id, origin);

    Ok(definition)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
