//! End-to-end runs of the answering flow against scripted collaborators.

use super::common::*;
use crate::rag::Origin;
use sewana_core::AppError;
use sewana_query::InMemoryStore;
use std::sync::Arc;

const VISITING: &str = "Visiting hours for general wards are 9am to 8pm daily.";
const PHARMACY: &str = "The pharmacy is on the ground floor near the main entrance.";

const TAMIL_PIPELINE: &str = r#"```json
[
  {"$addFields": {"fee_num": {"$toInt": "$consultation_fee"}}},
  {"$match": {"languages": "Tamil", "fee_num": {"$lte": 2000}}},
  {"$project": {"_id": 0, "name": 1, "specialization": 1, "consultation_fee": 1}}
]
```"#;

const NO_MATCH_PIPELINE: &str = r#"[{"$match": {"specialization": "Neurologist"}}]"#;

fn states(trace: &crate::RagTrace) -> Vec<&str> {
    trace.states.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_zero_retrieved_triggers_fallback() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h
        .assistant
        .ask("Which doctors speak Tamil and charge 2000 or less?")
        .await
        .unwrap();

    assert!(response.trace.fallback_used);
    assert_eq!(
        states(&response.trace),
        vec!["retrieve", "grade", "fallback_search", "synthesize", "done"]
    );
    assert_eq!(response.trace.retrieved, 0);
    assert_eq!(response.trace.structured, 1);
    assert_eq!(response.answer, "answered from 1 items");
    assert_eq!(h.grader.calls(), 0);
    assert_eq!(h.translator.calls(), 1);

    let synth_prompt = &h.synthesizer.requests()[0].prompt;
    assert!(synth_prompt.contains("name: Dr. Saman Jayawardena"));
    assert!(synth_prompt.contains("consultation_fee: 2000"));
}

#[tokio::test]
async fn test_all_relevant_skips_fallback() {
    let h = harness(
        FixedRetriever::with(&[VISITING, PHARMACY]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("When can I visit?").await.unwrap();

    assert!(!response.trace.fallback_used);
    assert_eq!(
        states(&response.trace),
        vec!["retrieve", "grade", "synthesize", "done"]
    );
    assert_eq!(response.trace.kept, 2);
    assert_eq!(response.answer, "answered from 2 items");
    assert_eq!(h.grader.calls(), 2);
    assert_eq!(h.translator.calls(), 0);
}

#[tokio::test]
async fn test_any_irrelevant_triggers_fallback() {
    let grader = ScriptedLlm::new(|request| {
        Ok(if request.prompt.contains("pharmacy") { "no" } else { "yes" }.to_string())
    });
    let h = harness(
        FixedRetriever::with(&[VISITING, PHARMACY]),
        grader,
        ScriptedLlm::replying(NO_MATCH_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("When can I visit?").await.unwrap();

    assert!(response.trace.fallback_used);
    assert_eq!(response.trace.kept, 1);
    assert_eq!(response.trace.structured, 0);

    let synth_prompt = &h.synthesizer.requests()[0].prompt;
    assert!(synth_prompt.contains(VISITING));
    assert!(!synth_prompt.contains(PHARMACY));
}

#[tokio::test]
async fn test_ambiguous_grade_excludes_item_and_falls_back() {
    let h = harness(
        FixedRetriever::with(&[VISITING]),
        ScriptedLlm::replying("maybe"),
        ScriptedLlm::replying(NO_MATCH_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("When can I visit?").await.unwrap();

    assert!(response.trace.fallback_used);
    assert_eq!(response.trace.kept, 0);
    assert!(!h.synthesizer.requests()[0].prompt.contains(VISITING));
}

#[tokio::test]
async fn test_grader_failure_counts_as_irrelevant() {
    let h = harness(
        FixedRetriever::with(&[VISITING]),
        ScriptedLlm::failing(),
        ScriptedLlm::replying(NO_MATCH_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("When can I visit?").await.unwrap();
    assert!(response.trace.fallback_used);
    assert_eq!(response.trace.kept, 0);
}

#[tokio::test]
async fn test_no_context_answers_dont_know() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(NO_MATCH_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Who is the neurologist?").await.unwrap();

    assert_eq!(response.answer, "I don't know.");
    let synth_prompt = &h.synthesizer.requests()[0].prompt;
    assert!(synth_prompt.contains("reply that you don't know"));
    assert!(!synth_prompt.contains("Context:"));
}

#[tokio::test]
async fn test_translation_failure_is_swallowed() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying("Sorry, I can only answer medical questions."),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Who is the neurologist?").await.unwrap();
    assert_eq!(response.answer, "I don't know.");
    assert_eq!(response.trace.structured, 0);
}

#[tokio::test]
async fn test_translation_service_failure_is_swallowed() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::failing(),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Who is the neurologist?").await.unwrap();
    assert_eq!(response.answer, "I don't know.");
}

#[tokio::test]
async fn test_execution_failure_is_swallowed() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(r#"[{"$lookup": {"from": "hospitals"}}]"#),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Which hospitals have cardiologists?").await.unwrap();
    assert_eq!(response.answer, "I don't know.");
    assert!(response.trace.fallback_used);
}

#[tokio::test]
async fn test_broken_translate_prompt_does_not_abort() {
    let mut translate_prompt = prompt(sewana_prompt::QUERY_TRANSLATE);
    translate_prompt.template = "Question: {{question".to_string();

    let h = harness_with_translate_prompt(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
        translate_prompt,
    );

    let response = h.assistant.ask("Who is the neurologist?").await.unwrap();

    assert_eq!(
        states(&response.trace),
        vec!["retrieve", "grade", "fallback_search", "synthesize", "done"]
    );
    assert_eq!(response.answer, "I don't know.");
    assert_eq!(h.translator.calls(), 0);
}

#[tokio::test]
async fn test_deeply_nested_translation_is_swallowed() {
    let reply = format!("{}{}", "[".repeat(200), "]".repeat(200));
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(&reply),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Who is the neurologist?").await.unwrap();
    assert!(response.trace.fallback_used);
    assert_eq!(response.trace.structured, 0);
    assert_eq!(response.answer, "I don't know.");
}

#[tokio::test]
async fn test_missing_collection_yields_no_records() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        Arc::new(InMemoryStore::new()),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("Tamil speaking doctors?").await.unwrap();
    assert_eq!(response.trace.structured, 0);
    assert_eq!(response.answer, "I don't know.");
}

#[tokio::test]
async fn test_retrieval_failure_aborts() {
    let h = harness(
        FixedRetriever::failing(),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );

    let result = h.assistant.ask("When can I visit?").await;
    assert!(matches!(result, Err(AppError::Knowledge(_))));
    assert_eq!(h.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_synthesis_failure_is_fatal() {
    let h = harness(
        FixedRetriever::with(&[VISITING]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        ScriptedLlm::failing(),
    );

    let result = h.assistant.ask("When can I visit?").await;
    assert!(matches!(result, Err(AppError::Synthesis(_))));
}

#[tokio::test]
async fn test_synthesizer_called_once_with_items_in_order() {
    let h = harness(
        FixedRetriever::with(&[]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(r#"[{"$sort": {"_id": 1}}, {"$project": {"_id": 0, "name": 1}}]"#),
        doctors_store(),
        echo_synthesizer(),
    );

    let response = h.assistant.ask("List all doctors").await.unwrap();

    assert_eq!(h.synthesizer.calls(), 1);
    assert_eq!(response.answer, "answered from 3 items");
    let prompt = &h.synthesizer.requests()[0].prompt;
    let nimal = prompt.find("Dr. Nimal Perera").unwrap();
    let saman = prompt.find("Dr. Saman Jayawardena").unwrap();
    let priya = prompt.find("Dr. Priya Fernando").unwrap();
    assert!(nimal < saman && saman < priya);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_assistant() {
    let h = harness(
        FixedRetriever::with(&[VISITING]),
        ScriptedLlm::replying("yes"),
        ScriptedLlm::replying(TAMIL_PIPELINE),
        doctors_store(),
        echo_synthesizer(),
    );
    let assistant = Arc::new(h.assistant);

    let first = tokio::spawn({
        let assistant = assistant.clone();
        async move { assistant.ask("When can I visit?").await }
    });
    let second = tokio::spawn({
        let assistant = assistant.clone();
        async move { assistant.ask("Visiting hours?").await }
    });

    assert_eq!(first.await.unwrap().unwrap().answer, "answered from 1 items");
    assert_eq!(second.await.unwrap().unwrap().answer, "answered from 1 items");
    assert_eq!(h.synthesizer.calls(), 2);
}

#[tokio::test]
async fn test_structured_items_carry_origin() {
    use crate::rag::{ContextItem, RequestState};

    let mut request = RequestState::new("q");
    request.apply_grades(Vec::new());
    request.extend_context(vec![ContextItem::structured("name: Dr. Priya Fernando")]);

    assert_eq!(request.context_items()[0].origin(), Origin::Structured);
}
