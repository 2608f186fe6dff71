use std::collections::HashSet;

use sieve_eval::{Accuracy, Metric, SetF1};

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn partial_overlap_scores() {
    let pred = list(&["Paris", "London"]);
    let gold = set(&["Paris"]);
    let s = SetF1::scores(&pred, &gold);
    assert!((s.precision - 0.5).abs() < 1e-12);
    assert!((s.recall - 1.0).abs() < 1e-12);
    assert!((s.f1 - 2.0 / 3.0).abs() < 1e-12);
    assert!(!Accuracy::matches(&pred, &gold));
}

#[test]
fn f1_is_one_exactly_when_sets_match() {
    let cases: &[(&[&str], &[&str])] = &[
        (&["a"], &["a"]),
        (&["a", "b"], &["b", "a"]),
        (&["a"], &["a", "b"]),
        (&["a", "c"], &["a", "b"]),
        (&[], &["a"]),
        (&["a"], &[]),
        (&[], &[]),
    ];
    for (pred, gold) in cases {
        let pred = list(pred);
        let gold = set(gold);
        let s = SetF1::scores(&pred, &gold);
        assert!((0.0..=1.0).contains(&s.f1));
        let same = Accuracy::matches(&pred, &gold);
        let both_non_empty = !pred.is_empty() && !gold.is_empty();
        assert_eq!(s.f1 == 1.0, same && both_non_empty, "{pred:?} vs {gold:?}");
    }
}

#[test]
fn subset_prediction_has_full_precision() {
    let s = SetF1::scores(&list(&["a", "b"]), &set(&["a", "b", "c"]));
    assert_eq!(s.precision, 1.0);
    assert!(s.recall < 1.0);
}

#[test]
fn empty_prediction_against_empty_gold_is_accurate_but_zero_f1() {
    let s = SetF1::scores(&[], &HashSet::new());
    assert_eq!(s.f1, 0.0);
    assert!(Accuracy::matches(&[], &HashSet::new()));
}

#[test]
fn ignore_empty_skips_blank_gold_sets() {
    let preds = [list(&["a"]), list(&["b"]), list(&["c"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();
    let golds = [set(&["a"]), set(&[]), set(&[""])];

    let kept = SetF1::ignoring_empty().forward(&preds, &golds);
    assert_eq!(kept["f1"], 1.0);

    let all = SetF1::new().forward(&preds, &golds);
    assert!((all["f1"] - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn all_skipped_leaves_metric_undefined() {
    let preds = [list(&["a"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();
    let out = SetF1::ignoring_empty().forward(&preds, &[set(&[])]);
    assert!(out.is_empty());
}

#[test]
fn accuracy_averages_matches() {
    let preds = [list(&["a"]), list(&["x"]), list(&["b", "c"]), list(&["c", "b"])];
    let preds: Vec<&[String]> = preds.iter().map(Vec::as_slice).collect();
    let golds = [set(&["a"]), set(&["a"]), set(&["b", "c"]), set(&["b"])];
    let out = Accuracy.forward(&preds, &golds);
    assert!((out["acc"] - 0.5).abs() < 1e-12);
}
