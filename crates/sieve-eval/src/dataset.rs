use std::path::Path;

use sieve_core::{load_examples, Example, Predictions, SieveError};

use crate::evaluator::{evaluate, Evaluation};
use crate::metric::Metrics;

/// Pair examples with their predictions.
///
/// The prediction file must cover the raw dataset: its size has to equal the
/// number of examples before filtering. Examples without complete answers
/// are then dropped, and every remaining example must have a prediction.
pub fn align_predictions(
    examples: Vec<Example>,
    predictions: &Predictions,
) -> Result<(Vec<Example>, Vec<Vec<String>>), SieveError> {
    if predictions.len() != examples.len() {
        return Err(SieveError::Validation(format!(
            "expected {} predictions but found {}",
            examples.len(),
            predictions.len()
        )));
    }

    let kept: Vec<Example> = examples
        .into_iter()
        .filter(|ex| !ex.complete_answer.is_empty())
        .collect();
    let aligned = kept
        .iter()
        .map(|ex| {
            let id = ex.id.to_string();
            predictions
                .get(&id)
                .map(<[String]>::to_vec)
                .ok_or_else(|| SieveError::Validation(format!("no prediction for example {id}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((kept, aligned))
}

/// Load a dataset and a prediction file and evaluate them.
pub async fn evaluate_files(
    data_path: impl AsRef<Path>,
    prediction_path: impl AsRef<Path>,
) -> Result<Evaluation, SieveError> {
    let examples = load_examples(data_path).await?;
    let predictions = Predictions::load(prediction_path).await?;
    let total = examples.len();
    let (examples, aligned) = align_predictions(examples, &predictions)?;
    tracing::info!(
        examples = examples.len(),
        skipped = total - examples.len(),
        "evaluating examples with complete answers"
    );
    evaluate(&examples, &aligned)
}

/// Write metrics as pretty-printed JSON with sorted keys.
pub async fn write_metrics(path: impl AsRef<Path>, metrics: &Metrics) -> Result<(), SieveError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(metrics)
        .map_err(|e| SieveError::Parsing(format!("failed to serialize metrics: {e}")))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| SieveError::Io(format!("failed to write {}: {e}", path.display())))
}
