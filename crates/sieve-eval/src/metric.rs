use std::collections::{BTreeMap, HashSet};

/// Metric name to value.
pub type Metrics = BTreeMap<String, f64>;

/// A per-example metric averaged over a dataset.
///
/// `pred` is a ranked, duplicate-free answer list; it is compared to `gold`
/// as a set.
pub trait Metric {
    /// Scores for a single example as `(name, value)` pairs.
    fn compute_one(&self, pred: &[String], gold: &HashSet<String>) -> Vec<(&'static str, f64)>;

    /// Whether an example is left out of the average.
    fn skips(&self, _gold: &HashSet<String>) -> bool {
        false
    }

    /// Mean of each score over the examples that are not skipped. A name is
    /// absent when every example was skipped.
    fn forward(&self, preds: &[&[String]], golds: &[HashSet<String>]) -> Metrics {
        let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
        for (pred, gold) in preds.iter().zip(golds) {
            if self.skips(gold) {
                continue;
            }
            for (name, value) in self.compute_one(pred, gold) {
                let entry = sums.entry(name).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(name, (sum, n))| (name.to_string(), sum / n as f64))
            .collect()
    }
}

fn as_set(pred: &[String]) -> HashSet<&str> {
    pred.iter().map(String::as_str).collect()
}

/// Exact set match, reported as `acc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Accuracy {
    pub fn matches(pred: &[String], gold: &HashSet<String>) -> bool {
        let pred = as_set(pred);
        pred.len() == gold.len() && pred.iter().all(|p| gold.contains(*p))
    }
}

impl Metric for Accuracy {
    fn compute_one(&self, pred: &[String], gold: &HashSet<String>) -> Vec<(&'static str, f64)> {
        vec![("acc", if Self::matches(pred, gold) { 1.0 } else { 0.0 })]
    }
}

/// Precision, recall and F1 of one prediction against one gold set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetScores {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Set-level precision, recall and F1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetF1 {
    /// Skip examples whose gold set is empty or only the empty string.
    pub ignore_empty: bool,
}

impl SetF1 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignoring_empty() -> Self {
        Self { ignore_empty: true }
    }

    pub fn scores(pred: &[String], gold: &HashSet<String>) -> SetScores {
        let pred = as_set(pred);
        let common = pred.iter().filter(|p| gold.contains(**p)).count() as f64;
        let precision = common / pred.len().max(1) as f64;
        let recall = common / gold.len().max(1) as f64;
        let denom = precision + recall;
        let f1 = if denom > 0.0 {
            2.0 * precision * recall / denom
        } else {
            0.0
        };
        SetScores {
            f1,
            precision,
            recall,
        }
    }
}

impl Metric for SetF1 {
    fn compute_one(&self, pred: &[String], gold: &HashSet<String>) -> Vec<(&'static str, f64)> {
        let s = Self::scores(pred, gold);
        vec![("f1", s.f1), ("precision", s.precision), ("recall", s.recall)]
    }

    fn skips(&self, gold: &HashSet<String>) -> bool {
        self.ignore_empty && (gold.is_empty() || (gold.len() == 1 && gold.contains("")))
    }
}
