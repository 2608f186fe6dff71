use std::collections::HashSet;

use sieve_core::{Answer, Candidate, Example, RecordId, SieveError};
use sieve_eval::{evaluate, evaluate_gold, Evaluation};

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn example(id: i64, cluster: i64, answers: &[&str], others: &[&str], complete: &[&str]) -> Example {
    let mut candidates: Vec<Candidate> = answers
        .iter()
        .map(|a| Candidate::new(format!("Q{a}"), *a).with_answer(true))
        .collect();
    candidates.extend(
        others
            .iter()
            .map(|o| Candidate::new(format!("Q{o}"), *o).with_answer(false)),
    );
    Example {
        id: RecordId::Int(id),
        cluster_id: RecordId::Int(cluster),
        question: format!("question {id}"),
        constraints: Vec::new(),
        candidates,
        complete_answer: complete
            .iter()
            .map(|c| Answer {
                uri: format!("Q{c}"),
                text: c.to_string(),
                aliases: Vec::new(),
                desc: None,
            })
            .collect(),
        retrieved: None,
    }
}

#[test]
fn hardest_paraphrase_sets_the_cluster_score() -> Result<(), SieveError> {
    let clusters = [RecordId::Int(1), RecordId::Int(1)];
    let gold = [set(&["a"]), set(&["a"])];
    let preds = [list(&["a"]), list(&["b"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();

    let (metrics, per_example) = evaluate_gold(&clusters, &gold, &preds)?;
    assert_eq!(per_example[0].f1, 1.0);
    assert_eq!(per_example[1].f1, 0.0);
    assert_eq!(metrics["f1"], 0.5);
    assert_eq!(metrics["cluster_min_f1"], 0.0);
    assert_eq!(metrics["cluster_min_acc"], 0.0);
    Ok(())
}

#[test]
fn cluster_minimums_are_averaged_across_clusters() -> Result<(), SieveError> {
    let clusters = [
        RecordId::Int(1),
        RecordId::Int(1),
        RecordId::from("two"),
        RecordId::Int(3),
    ];
    let gold = [set(&["a"]), set(&["a"]), set(&["b"]), set(&["c", "d"])];
    let preds = [list(&["a"]), list(&["x"]), list(&["b"]), list(&["c"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();

    let (metrics, _) = evaluate_gold(&clusters, &gold, &preds)?;
    // cluster mins: 0.0, 1.0, 2/3
    assert!((metrics["cluster_min_f1"] - (0.0 + 1.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
    assert!((metrics["cluster_min_recall"] - (0.0 + 1.0 + 0.5) / 3.0).abs() < 1e-12);
    assert!((metrics["cluster_min_acc"] - 1.0 / 3.0).abs() < 1e-12);
    assert!(metrics["cluster_min_f1"] <= metrics["f1"]);
    Ok(())
}

#[test]
fn mismatched_lengths_are_rejected() {
    let preds = [list(&["a"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();
    let err = evaluate_gold(&[RecordId::Int(1)], &[], &preds).unwrap_err();
    assert!(matches!(err, SieveError::Validation(_)));

    let err = evaluate(&[], &[list(&["a"])]).unwrap_err();
    assert!(err.to_string().contains("expected 0 predictions but found 1"));
}

fn sample() -> (Vec<Example>, Vec<Vec<String>>) {
    let examples = vec![
        example(1, 10, &["Paris"], &["London", "Rome"], &["Paris", "Lyon"]),
        example(2, 10, &["Paris"], &["Berlin"], &["Paris", "Lyon"]),
        example(3, 20, &["Rome"], &["Milan"], &["Rome"]),
    ];
    let predictions = vec![
        list(&["London", "Paris", "Lyon"]),
        list(&["Paris"]),
        list(&["Rome", "Milan"]),
    ];
    (examples, predictions)
}

#[test]
fn report_has_base_cluster_and_truncated_keys() -> Result<(), SieveError> {
    let (examples, predictions) = sample();
    let Evaluation {
        metrics,
        per_example,
        per_depth,
    } = evaluate(&examples, &predictions)?;

    for key in ["acc", "f1", "precision", "recall", "cluster_min_f1", "cluster_min_acc"] {
        assert!(metrics.contains_key(key), "missing {key}");
    }
    for depth in ["1", "10", "100", "None"] {
        for name in ["acc", "f1", "precision", "recall", "cluster_min_f1"] {
            let key = format!("complete_{name}_@k{depth}");
            assert!(metrics.contains_key(&key), "missing {key}");
        }
        assert_eq!(per_depth[depth].len(), 3);
    }
    assert_eq!(per_example.len(), 3);
    assert_eq!(metrics["acc"], 1.0 / 3.0);
    Ok(())
}

#[test]
fn truncation_uses_prefixes_of_the_ranked_list() -> Result<(), SieveError> {
    let (examples, predictions) = sample();
    let eval = evaluate(&examples, &predictions)?;

    // Example 1 at depth 1 only keeps "London": no overlap with the complete answers.
    assert_eq!(eval.per_depth["1"][0].recall, 0.0);
    assert_eq!(eval.per_depth["10"][0].recall, 1.0);
    assert!(!eval.per_depth["10"][0].acc);
    assert_eq!(eval.per_depth["None"][2].precision, 0.5);
    Ok(())
}

#[test]
fn recall_never_drops_as_depth_grows() -> Result<(), SieveError> {
    let examples: Vec<Example> = (0..6)
        .map(|i| example(i, i % 2, &["a"], &["b"], &["a", "c", "d"]))
        .collect();
    let predictions = vec![
        list(&["b", "a"]),
        list(&["c", "x", "d", "a"]),
        list(&["a"]),
        list(&[]),
        list(&["x", "y"]),
        list(&["d", "c", "a"]),
    ];
    let m = evaluate(&examples, &predictions)?.metrics;

    for name in ["recall", "cluster_min_recall"] {
        let at = |d: &str| m[&format!("complete_{name}_@k{d}")];
        assert!(at("1") <= at("10"));
        assert!(at("10") <= at("100"));
        assert!(at("100") <= at("None"));
    }
    Ok(())
}

#[test]
fn prediction_lists_are_scored_as_given() -> Result<(), SieveError> {
    let examples = vec![example(1, 1, &["a"], &[], &["a"])];
    // Depth 1 keeps the first entry exactly as ranked by the caller.
    let eval = evaluate(&examples, &[list(&["x", "a"])])?;
    assert_eq!(eval.per_depth["1"][0].recall, 0.0);
    assert_eq!(eval.per_depth["None"][0].recall, 1.0);
    Ok(())
}
