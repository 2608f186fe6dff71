use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sieve_core::{Example, RecordId, SieveError};

use crate::metric::{Accuracy, Metric, Metrics, SetF1};

/// Prediction-list cutoffs for the complete-answer metrics; `None` is unbounded.
pub const TRUNCATION_DEPTHS: [Option<usize>; 4] = [Some(1), Some(10), Some(100), None];

/// Label of a cutoff as used in metric names: `1`, `10`, `100` or `None`.
pub fn depth_label(depth: Option<usize>) -> String {
    match depth {
        Some(k) => k.to_string(),
        None => "None".to_string(),
    }
}

/// Scores of a single example.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExampleScores {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub acc: bool,
}

impl ExampleScores {
    pub fn compute(pred: &[String], gold: &HashSet<String>) -> Self {
        let set = SetF1::scores(pred, gold);
        Self {
            f1: set.f1,
            precision: set.precision,
            recall: set.recall,
            acc: Accuracy::matches(pred, gold),
        }
    }

    /// Field-wise minimum.
    fn min(self, other: Self) -> Self {
        Self {
            f1: self.f1.min(other.f1),
            precision: self.precision.min(other.precision),
            recall: self.recall.min(other.recall),
            acc: self.acc && other.acc,
        }
    }
}

/// Aggregate and per-example results of [`evaluate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
    /// Flat metric table: base, `cluster_min_*` and `complete_*_@k{depth}`.
    pub metrics: Metrics,
    /// Scores against the annotated gold answers.
    pub per_example: Vec<ExampleScores>,
    /// Scores against the complete gold answers, keyed by depth label.
    pub per_depth: BTreeMap<String, Vec<ExampleScores>>,
}

/// Score predictions against one gold view.
///
/// Dataset means use set-F1 with empty gold sets skipped, plus accuracy over
/// every example. Cluster-robust metrics take, per cluster, the minimum of
/// each score over its members and average those minimums across clusters.
pub fn evaluate_gold(
    cluster_ids: &[RecordId],
    gold: &[HashSet<String>],
    pred: &[&[String]],
) -> Result<(Metrics, Vec<ExampleScores>), SieveError> {
    if cluster_ids.len() != pred.len() || gold.len() != pred.len() {
        return Err(SieveError::Validation(format!(
            "{} predictions for {} gold sets and {} cluster ids",
            pred.len(),
            gold.len(),
            cluster_ids.len()
        )));
    }

    let mut metrics = SetF1::ignoring_empty().forward(pred, gold);
    metrics.extend(Accuracy.forward(pred, gold));

    let per_example: Vec<ExampleScores> = pred
        .iter()
        .zip(gold)
        .map(|(p, g)| ExampleScores::compute(p, g))
        .collect();

    let mut cluster_mins: BTreeMap<&RecordId, ExampleScores> = BTreeMap::new();
    for (cluster, scores) in cluster_ids.iter().zip(&per_example) {
        cluster_mins
            .entry(cluster)
            .and_modify(|m| *m = m.min(*scores))
            .or_insert(*scores);
    }

    if !cluster_mins.is_empty() {
        let n = cluster_mins.len() as f64;
        let mean = |f: fn(&ExampleScores) -> f64| cluster_mins.values().map(f).sum::<f64>() / n;
        metrics.insert("cluster_min_f1".into(), mean(|s| s.f1));
        metrics.insert("cluster_min_precision".into(), mean(|s| s.precision));
        metrics.insert("cluster_min_recall".into(), mean(|s| s.recall));
        metrics.insert(
            "cluster_min_acc".into(),
            mean(|s| if s.acc { 1.0 } else { 0.0 }),
        );
    }

    Ok((metrics, per_example))
}

/// Evaluate ranked predictions, one list per example in the same order.
///
/// Base metrics compare against the candidates annotated as answers. The
/// complete gold answers are then scored at every cutoff in
/// [`TRUNCATION_DEPTHS`], producing `complete_{name}_@k{depth}` entries.
/// Prediction lists are used as given: never deduplicated or reordered.
pub fn evaluate(examples: &[Example], predictions: &[Vec<String>]) -> Result<Evaluation, SieveError> {
    if examples.len() != predictions.len() {
        return Err(SieveError::Validation(format!(
            "expected {} predictions but found {}",
            examples.len(),
            predictions.len()
        )));
    }

    let cluster_ids: Vec<RecordId> = examples.iter().map(|ex| ex.cluster_id.clone()).collect();
    let gold: Vec<HashSet<String>> = examples.iter().map(Example::gold_answers).collect();
    let complete: Vec<HashSet<String>> = examples.iter().map(Example::complete_answers).collect();
    let full: Vec<&[String]> = predictions.iter().map(Vec::as_slice).collect();

    let (mut metrics, per_example) = evaluate_gold(&cluster_ids, &gold, &full)?;

    let mut per_depth = BTreeMap::new();
    for depth in TRUNCATION_DEPTHS {
        let truncated: Vec<&[String]> = full
            .iter()
            .map(|p| match depth {
                Some(k) => &p[..k.min(p.len())],
                None => *p,
            })
            .collect();
        let label = depth_label(depth);
        let (at_depth, scores) = evaluate_gold(&cluster_ids, &complete, &truncated)?;
        for (name, value) in at_depth {
            metrics.insert(format!("complete_{name}_@k{label}"), value);
        }
        per_depth.insert(label, scores);
    }

    tracing::debug!(examples = examples.len(), metrics = metrics.len(), "evaluation done");
    Ok(Evaluation {
        metrics,
        per_example,
        per_depth,
    })
}
