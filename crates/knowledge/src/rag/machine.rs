//! The answering state machine.
//!
//! ```text
//! Retrieve -> Grade -> FallbackSearch -> Synthesize -> Done
//!                  \________________________/
//! ```
//!
//! Each request runs its states in sequence; [`transition`] decides the next
//! state from the current one and the request state alone.

use crate::rag::grader::RelevanceGrader;
use crate::rag::synthesizer::AnswerSynthesizer;
use crate::rag::types::{ContextItem, RagResponse, RagTrace, RequestState};
use crate::retriever::Retriever;
use sewana_core::{AppError, AppResult};
use sewana_query::{record_to_text, QueryExecutor, QueryTranslator, SchemaDescriptor};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Retrieve,
    Grade,
    FallbackSearch,
    Synthesize,
    Done,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::Grade => "grade",
            Self::FallbackSearch => "fallback_search",
            Self::Synthesize => "synthesize",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next state after `state` has run against `request`.
pub fn transition(state: State, request: &RequestState) -> State {
    match state {
        State::Retrieve => State::Grade,
        State::Grade if request.needs_fallback() => State::FallbackSearch,
        State::Grade => State::Synthesize,
        State::FallbackSearch => State::Synthesize,
        State::Synthesize | State::Done => State::Done,
    }
}

/// Collaborators of an [`Assistant`].
pub struct AssistantDeps {
    pub retriever: Arc<dyn Retriever>,
    pub grader: RelevanceGrader,
    pub translator: QueryTranslator,
    pub executor: QueryExecutor,
    pub synthesizer: AnswerSynthesizer,
    pub schema: Arc<SchemaDescriptor>,
}

/// Answers questions; one instance serves many concurrent requests.
pub struct Assistant {
    deps: AssistantDeps,
}

impl Assistant {
    pub fn new(deps: AssistantDeps) -> Self {
        Self { deps }
    }

    /// Answer one question.
    ///
    /// Retrieval and synthesis failures abort the request; translation and
    /// execution failures during the fallback search do not.
    pub async fn ask(&self, question: &str) -> AppResult<RagResponse> {
        let span = tracing::info_span!("rag_request", question_len = question.len());
        self.run(question).instrument(span).await
    }

    async fn run(&self, question: &str) -> AppResult<RagResponse> {
        let mut request = RequestState::new(question);
        let mut trace = RagTrace::default();
        let mut state = State::Retrieve;

        loop {
            trace.states.push(state.as_str().to_string());
            tracing::debug!(state = %state, "Entering state");

            match state {
                State::Retrieve => self.retrieve(&mut request, &mut trace).await?,
                State::Grade => self.grade(&mut request, &mut trace).await?,
                State::FallbackSearch => self.fallback_search(&mut request, &mut trace).await?,
                State::Synthesize => self.synthesize(&mut request).await?,
                State::Done => break,
            }

            state = transition(state, &request);
        }

        let answer = request
            .into_answer()
            .ok_or_else(|| AppError::Synthesis("no answer was produced".to_string()))?;

        tracing::info!(
            fallback = trace.fallback_used,
            retrieved = trace.retrieved,
            kept = trace.kept,
            structured = trace.structured,
            "Answered question"
        );

        Ok(RagResponse { answer, trace })
    }

    async fn retrieve(&self, request: &mut RequestState, trace: &mut RagTrace) -> AppResult<()> {
        let passages = self.deps.retriever.search(request.question()).await?;
        trace.retrieved = passages.len();
        request.set_retrieved(passages.into_iter().map(ContextItem::retrieved).collect());
        Ok(())
    }

    async fn grade(&self, request: &mut RequestState, trace: &mut RagTrace) -> AppResult<()> {
        let mut verdicts = Vec::with_capacity(request.context_items().len());
        for item in request.context_items() {
            let relevance = self.deps.grader.grade(request.question(), item).await?;
            verdicts.push(item.graded(relevance));
        }

        request.apply_grades(verdicts);
        trace.kept = request.context_items().len();
        trace.fallback_used = request.needs_fallback();

        if request.needs_fallback() {
            tracing::info!(
                retrieved = trace.retrieved,
                kept = trace.kept,
                "Retrieved context insufficient, using structured search"
            );
        }
        Ok(())
    }

    async fn fallback_search(
        &self,
        request: &mut RequestState,
        trace: &mut RagTrace,
    ) -> AppResult<()> {
        let schema = self.deps.schema.as_ref();
        let outcome = async {
            let query = self
                .deps
                .translator
                .translate(request.question(), schema, &schema.examples)
                .await?;
            self.deps.executor.execute(&query).await
        }
        .await;

        match outcome {
            Ok(records) => {
                trace.structured = records.len();
                request.extend_context(
                    records
                        .iter()
                        .map(|record| ContextItem::structured(record_to_text(record))),
                );
                Ok(())
            }
            Err(e) if e.is_fallback_recoverable() => {
                tracing::warn!("Structured search failed, continuing without it: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn synthesize(&self, request: &mut RequestState) -> AppResult<()> {
        let answer = self
            .deps
            .synthesizer
            .synthesize(request.question(), request.context_items())
            .await?;
        request.set_answer(answer)
    }
}
