//! Wiring of configured collaborators shared by the commands.

use sewana_core::{config::AppConfig, AppError, AppResult};
use sewana_knowledge::rag::{AnswerSynthesizer, RelevanceGrader};
use sewana_knowledge::{Assistant, AssistantDeps, IndexRetriever};
use sewana_llm::{create_client, LlmClient};
use sewana_prompt::{load_prompt, QUERY_TRANSLATE, RAG_ANSWER, RAG_GRADE};
use sewana_query::{InMemoryStore, QueryExecutor, QueryTranslator, SchemaDescriptor};
use std::path::PathBuf;
use std::sync::Arc;

/// Seed data looked up when no `store.dataPath` is configured.
const DEFAULT_DATA_PATH: &str = "data/doctors.json";

/// Completion client for the active provider.
pub fn llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    config.validate()?;

    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.and_then(|pc| pc.endpoint());
    let timeout = provider_config.and_then(|pc| pc.timeout());
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint, api_key.as_deref(), timeout).map_err(AppError::Config)
}

/// Schema descriptor from `store.schemaPath`, or the built-in one.
pub fn schema(config: &AppConfig) -> AppResult<Arc<SchemaDescriptor>> {
    let schema = match config.store_schema_path() {
        Some(path) => SchemaDescriptor::load(&path)?,
        None => SchemaDescriptor::doctors()?,
    };

    if schema.collection != config.store.collection {
        tracing::warn!(
            "Schema describes '{}' but the store queries '{}'",
            schema.collection,
            config.store.collection
        );
    }
    Ok(Arc::new(schema))
}

/// Structured store loaded from the configured seed data.
pub fn store(config: &AppConfig) -> AppResult<Arc<InMemoryStore>> {
    let path: PathBuf = config
        .store_data_path()
        .unwrap_or_else(|| config.workspace.join(DEFAULT_DATA_PATH));

    if !path.exists() {
        if config.store.data_path.is_some() {
            return Err(AppError::Config(format!(
                "Structured store data not found at {:?}",
                path
            )));
        }
        tracing::warn!(
            "No structured store data at {:?}; structured search will find nothing",
            path
        );
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let store = InMemoryStore::from_json_file(&config.store.collection, &path)?;
    tracing::debug!(
        "Loaded {} documents into '{}'",
        store.count(&config.store.collection),
        config.store.collection
    );
    Ok(Arc::new(store))
}

pub fn translator(config: &AppConfig, client: Arc<dyn LlmClient>) -> AppResult<QueryTranslator> {
    let prompt = load_prompt(&config.workspace, QUERY_TRANSLATE)?;
    Ok(QueryTranslator::new(client, config.model.clone(), prompt))
}

pub fn executor(config: &AppConfig) -> AppResult<QueryExecutor> {
    Ok(QueryExecutor::new(store(config)?, config.store.collection.clone()))
}

/// Assistant with every collaborator taken from configuration.
pub fn assistant(config: &AppConfig) -> AppResult<Assistant> {
    let client = llm_client(config)?;
    let retriever = IndexRetriever::open(&config.workspace, &config.retriever)?;

    let deps = AssistantDeps {
        retriever: Arc::new(retriever),
        grader: RelevanceGrader::new(
            client.clone(),
            config.model.clone(),
            load_prompt(&config.workspace, RAG_GRADE)?,
        ),
        translator: translator(config, client.clone())?,
        executor: executor(config)?,
        synthesizer: AnswerSynthesizer::new(
            client,
            config.model.clone(),
            load_prompt(&config.workspace, RAG_ANSWER)?,
        ),
        schema: schema(config)?,
    };

    Ok(Assistant::new(deps))
}

/// User-facing text for a failed command or request.
pub fn failure_message(error: &AppError) -> String {
    match error {
        AppError::Synthesis(_) => {
            "Sorry, an answer could not be generated right now. Please try again later."
                .to_string()
        }
        other => format!("Error: {}", other),
    }
}
