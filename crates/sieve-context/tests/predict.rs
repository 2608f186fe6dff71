use std::sync::Mutex;

use async_trait::async_trait;
use sieve_core::{parse_examples, Example, SieveError};
use sieve_context::{
    parse_generated, predict_all_candidates, predict_with_classifier, predict_with_generator,
    AnswerGenerator, CandidateClassifier, ContextBuilder, ContextStrategy,
};

fn examples() -> Vec<Example> {
    parse_examples(
        r#"[
        {"id": 1, "cluster_id": 1, "question": "capital of France?",
         "candidates": [{"uri": "a", "text": "Paris"}, {"uri": "b", "text": "Lyon"}, {"uri": "c", "text": "Nice"}]},
        {"id": "two", "cluster_id": 1, "question": "capital of Italy?",
         "candidates": [{"uri": "d", "text": "Rome"}]}
    ]"#,
    )
    .unwrap()
}

/// Says yes when the context mentions a capital; records batch sizes.
#[derive(Default)]
struct CapitalClassifier {
    batches: Mutex<Vec<usize>>,
}

#[async_trait]
impl CandidateClassifier for CapitalClassifier {
    async fn classify(&self, contexts: &[String]) -> Result<Vec<bool>, SieveError> {
        self.batches.lock().unwrap().push(contexts.len());
        Ok(contexts
            .iter()
            .map(|c| c.starts_with("Paris") || c.starts_with("Rome") || c.starts_with("Nice"))
            .collect())
    }
}

struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, contexts: &[String]) -> Result<Vec<String>, SieveError> {
        Ok(contexts
            .iter()
            .map(|c| format!("{c}, Paris , ,Paris, x"))
            .collect())
    }
}

struct ShortGenerator;

#[async_trait]
impl AnswerGenerator for ShortGenerator {
    async fn generate(&self, _contexts: &[String]) -> Result<Vec<String>, SieveError> {
        Ok(Vec::new())
    }
}

#[test]
fn generated_text_splits_on_commas() {
    assert_eq!(
        parse_generated(" Paris, Lyon ,, Paris ,Nice "),
        vec!["Paris", "Lyon", "Nice"]
    );
    assert!(parse_generated("  ").is_empty());
}

#[test]
fn baseline_predicts_every_candidate_in_order() {
    let preds = predict_all_candidates(&examples());
    assert_eq!(
        preds.get("1"),
        Some(&["Paris".to_string(), "Lyon".into(), "Nice".into()][..])
    );
    assert_eq!(preds.get("two"), Some(&["Rome".to_string()][..]));
}

#[tokio::test]
async fn classifier_positives_keep_candidate_order() -> Result<(), SieveError> {
    let classifier = CapitalClassifier::default();
    let builder = ContextBuilder::new(ContextStrategy::BinaryNl);
    let preds = predict_with_classifier(&examples(), &builder, &classifier, 3).await?;

    assert_eq!(
        preds.get("1"),
        Some(&["Paris".to_string(), "Nice".into()][..])
    );
    assert_eq!(preds.get("two"), Some(&["Rome".to_string()][..]));
    assert_eq!(*classifier.batches.lock().unwrap(), vec![3, 1]);
    Ok(())
}

#[tokio::test]
async fn generator_outputs_are_parsed_per_example() -> Result<(), SieveError> {
    let builder = ContextBuilder::new(ContextStrategy::QuestionNl);
    let preds = predict_with_generator(&examples(), &builder, &EchoGenerator, 8).await?;
    assert_eq!(
        preds.get("1"),
        Some(&["capital of France?".to_string(), "Paris".into(), "x".into()][..])
    );
    Ok(())
}

#[tokio::test]
async fn short_model_output_is_an_error() {
    let builder = ContextBuilder::new(ContextStrategy::QuestionNl);
    let err = predict_with_generator(&examples(), &builder, &ShortGenerator, 8)
        .await
        .unwrap_err();
    assert!(matches!(err, SieveError::Model(_)));
}

#[tokio::test]
async fn wrong_strategy_kind_is_rejected() {
    let builder = ContextBuilder::new(ContextStrategy::Question);
    let err = predict_with_classifier(&examples(), &builder, &CapitalClassifier::default(), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, SieveError::Config(_)));
}
