use sieve_core::{parse_examples, Predictions, SieveError};
use sieve_eval::{align_predictions, evaluate_files, write_metrics};

const DATA: &str = r#"[
    {"id": 1, "cluster_id": 1, "question": "q1",
     "candidates": [{"uri": "Q1", "text": "Paris", "is_answer": true},
                    {"uri": "Q2", "text": "London", "is_answer": false}],
     "complete_answer": [{"uri": "Q1", "text": "Paris"}]},
    {"id": 2, "cluster_id": 1, "question": "q2",
     "candidates": [{"uri": "Q3", "text": "Rome", "is_answer": false}],
     "complete_answer": []},
    {"id": "three", "cluster_id": 2, "question": "q3",
     "candidates": [{"uri": "Q4", "text": "Oslo", "is_answer": true}],
     "complete_answer": [{"uri": "Q4", "text": "Oslo"}, {"uri": "Q5", "text": "Bergen"}]}
]"#;

#[test]
fn examples_without_complete_answers_are_filtered() -> Result<(), SieveError> {
    let examples = parse_examples(DATA)?;
    let preds = Predictions::parse(r#"{"1": ["Paris"], "2": [], "three": ["Oslo", "Oslo"]}"#)?;
    let (kept, aligned) = align_predictions(examples, &preds)?;

    assert_eq!(kept.len(), 2);
    assert_eq!(aligned[0], vec!["Paris".to_string()]);
    assert_eq!(aligned[1], vec!["Oslo".to_string()]);
    Ok(())
}

#[test]
fn prediction_count_must_match_raw_dataset() {
    let examples = parse_examples(DATA).unwrap();
    let preds = Predictions::parse(r#"{"1": ["Paris"], "three": ["Oslo"]}"#).unwrap();
    let err = align_predictions(examples, &preds).unwrap_err();
    assert!(err.to_string().contains("expected 3 predictions but found 2"));
}

#[test]
fn missing_prediction_for_kept_example_is_fatal() {
    let examples = parse_examples(DATA).unwrap();
    let preds = Predictions::parse(r#"{"1": ["Paris"], "2": [], "4": ["Oslo"]}"#).unwrap();
    let err = align_predictions(examples, &preds).unwrap_err();
    assert!(matches!(err, SieveError::Validation(_)));
    assert!(err.to_string().contains("three"));
}

#[tokio::test]
async fn evaluates_files_and_writes_sorted_metrics() -> Result<(), SieveError> {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dev.json");
    let pred = dir.path().join("pred.dev.json");
    let out = dir.path().join("eval.json");
    tokio::fs::write(&data, DATA).await.unwrap();
    tokio::fs::write(&pred, r#"{"1": ["Paris", "London"], "2": ["Rome"], "three": ["Oslo"]}"#)
        .await
        .unwrap();

    let eval = evaluate_files(&data, &pred).await?;
    assert_eq!(eval.per_example.len(), 2);
    assert!((eval.metrics["complete_recall_@k1"] - 0.75).abs() < 1e-12);
    assert_eq!(eval.metrics["complete_acc_@kNone"], 0.0);

    write_metrics(&out, &eval.metrics).await?;
    let text = tokio::fs::read_to_string(&out).await.unwrap();
    let keys: Vec<&str> = text
        .lines()
        .filter_map(|l| l.trim().strip_prefix('"'))
        .filter_map(|l| l.split('"').next())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(keys.contains(&"cluster_min_f1"));
    Ok(())
}
