//! Scripted collaborators shared by the crate-level tests.

use crate::rag::{AnswerSynthesizer, Assistant, AssistantDeps, RelevanceGrader};
use crate::retriever::{Retriever, ScoredPassage};
use async_trait::async_trait;
use sewana_core::{AppError, AppResult};
use sewana_llm::{LlmClient, LlmRequest, LlmResponse};
use sewana_prompt::{builtin_prompt, PromptDefinition, QUERY_TRANSLATE, RAG_ANSWER, RAG_GRADE};
use sewana_query::{InMemoryStore, QueryExecutor, QueryTranslator, SchemaDescriptor};
use std::sync::{Arc, Mutex};

pub const DOCTORS_JSON: &str = include_str!("../../../../data/doctors.json");

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// Completion client answering through a closure and recording requests.
pub struct ScriptedLlm {
    respond: Responder,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(respond: impl Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_| Err(AppError::Llm("connection refused".to_string())))
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let content = (self.respond)(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: Default::default(),
        })
    }
}

/// Retriever returning fixed passages, or failing.
pub struct FixedRetriever {
    passages: Option<Vec<ScoredPassage>>,
}

impl FixedRetriever {
    pub fn with(texts: &[&str]) -> Arc<Self> {
        let passages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| ScoredPassage {
                text: text.to_string(),
                score: 0.9 - i as f32 * 0.05,
                source_id: "hospital.md".to_string(),
                position: i as u32,
            })
            .collect();
        Arc::new(Self {
            passages: Some(passages),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { passages: None })
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn search(&self, _question: &str) -> AppResult<Vec<ScoredPassage>> {
        self.passages
            .clone()
            .ok_or_else(|| AppError::Knowledge("index unavailable".to_string()))
    }
}

pub fn prompt(id: &str) -> PromptDefinition {
    serde_yaml::from_str(builtin_prompt(id).unwrap()).unwrap()
}

pub fn doctors_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_json_str("doctors", DOCTORS_JSON).unwrap())
}

/// Synthesizer reply: "I don't know." when told there is no context,
/// otherwise the number of context paragraphs it saw.
pub fn echo_synthesizer() -> Arc<ScriptedLlm> {
    ScriptedLlm::new(|request| {
        if request.prompt.contains("No context is available") {
            return Ok("I don't know.".to_string());
        }
        let context = request
            .prompt
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nAnswer:").next())
            .unwrap_or("");
        Ok(format!("answered from {} items", context.trim().split("\n\n").count()))
    })
}

/// Collaborators under test, with handles to their scripted clients.
pub struct Harness {
    pub assistant: Assistant,
    pub grader: Arc<ScriptedLlm>,
    pub translator: Arc<ScriptedLlm>,
    pub synthesizer: Arc<ScriptedLlm>,
}

pub fn harness(
    retriever: Arc<dyn Retriever>,
    grader: Arc<ScriptedLlm>,
    translator: Arc<ScriptedLlm>,
    store: Arc<InMemoryStore>,
    synthesizer: Arc<ScriptedLlm>,
) -> Harness {
    harness_with_translate_prompt(
        retriever,
        grader,
        translator,
        store,
        synthesizer,
        prompt(QUERY_TRANSLATE),
    )
}

pub fn harness_with_translate_prompt(
    retriever: Arc<dyn Retriever>,
    grader: Arc<ScriptedLlm>,
    translator: Arc<ScriptedLlm>,
    store: Arc<InMemoryStore>,
    synthesizer: Arc<ScriptedLlm>,
    translate_prompt: PromptDefinition,
) -> Harness {
    let schema = Arc::new(SchemaDescriptor::doctors().unwrap());
    let deps = AssistantDeps {
        retriever,
        grader: RelevanceGrader::new(grader.clone(), "test-model", prompt(RAG_GRADE)),
        translator: QueryTranslator::new(translator.clone(), "test-model", translate_prompt),
        executor: QueryExecutor::new(store, "doctors"),
        synthesizer: AnswerSynthesizer::new(synthesizer.clone(), "test-model", prompt(RAG_ANSWER)),
        schema,
    };

    Harness {
        assistant: Assistant::new(deps),
        grader,
        translator,
        synthesizer,
    }
}
