use async_trait::async_trait;
use sieve_core::{dedup_ordered, Example, Predictions, SieveError};

use crate::{ContextBuilder, ContextKind};

/// External yes/no model: one label per context.
#[async_trait]
pub trait CandidateClassifier: Send + Sync {
    async fn classify(&self, contexts: &[String]) -> Result<Vec<bool>, SieveError>;
}

/// External generative model: one output string per context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, contexts: &[String]) -> Result<Vec<String>, SieveError>;
}

/// Split generated text on commas into a ranked, duplicate-free answer list.
pub fn parse_generated(text: &str) -> Vec<String> {
    dedup_ordered(
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Baseline that predicts every candidate, in candidate order.
pub fn predict_all_candidates(examples: &[Example]) -> Predictions {
    examples
        .iter()
        .map(|ex| {
            (
                ex.id.to_string(),
                ex.candidates.iter().map(|c| c.text.clone()).collect(),
            )
        })
        .collect()
}

fn require_kind(builder: &ContextBuilder, kind: ContextKind) -> Result<(), SieveError> {
    if builder.strategy().kind() != kind {
        return Err(SieveError::Config(format!(
            "strategy {} does not produce {kind:?} contexts",
            builder.strategy()
        )));
    }
    Ok(())
}

fn check_outputs<T>(outputs: &[T], inputs: usize) -> Result<(), SieveError> {
    if outputs.len() != inputs {
        return Err(SieveError::Model(format!(
            "model returned {} outputs for {inputs} contexts",
            outputs.len()
        )));
    }
    Ok(())
}

/// Classify every candidate and predict the positives, in candidate order.
pub async fn predict_with_classifier(
    examples: &[Example],
    builder: &ContextBuilder,
    classifier: &dyn CandidateClassifier,
    batch_size: usize,
) -> Result<Predictions, SieveError> {
    require_kind(builder, ContextKind::Binary)?;

    let mut owners = Vec::new();
    let mut contexts = Vec::new();
    for (i, ex) in examples.iter().enumerate() {
        for record in builder.records(ex)? {
            owners.push(i);
            contexts.push(record.context);
        }
    }

    let mut labels = Vec::with_capacity(contexts.len());
    for batch in contexts.chunks(batch_size.max(1)) {
        let out = classifier.classify(batch).await?;
        check_outputs(&out, batch.len())?;
        labels.extend(out);
    }

    let mut answers: Vec<Vec<String>> = vec![Vec::new(); examples.len()];
    let mut next = vec![0usize; examples.len()];
    for (&owner, positive) in owners.iter().zip(labels) {
        let candidate = &examples[owner].candidates[next[owner]];
        next[owner] += 1;
        if positive {
            answers[owner].push(candidate.text.clone());
        }
    }

    tracing::info!(
        examples = examples.len(),
        contexts = contexts.len(),
        strategy = %builder.strategy(),
        "candidates classified"
    );
    Ok(examples
        .iter()
        .zip(answers)
        .map(|(ex, a)| (ex.id.to_string(), a))
        .collect())
}

/// Generate an answer list for every example.
pub async fn predict_with_generator(
    examples: &[Example],
    builder: &ContextBuilder,
    generator: &dyn AnswerGenerator,
    batch_size: usize,
) -> Result<Predictions, SieveError> {
    require_kind(builder, ContextKind::Generative)?;

    let contexts = examples
        .iter()
        .map(|ex| builder.example_context(ex))
        .collect::<Result<Vec<_>, _>>()?;

    let mut generated = Vec::with_capacity(contexts.len());
    for batch in contexts.chunks(batch_size.max(1)) {
        let out = generator.generate(batch).await?;
        check_outputs(&out, batch.len())?;
        generated.extend(out);
    }

    tracing::info!(
        examples = examples.len(),
        strategy = %builder.strategy(),
        "answers generated"
    );
    Ok(examples
        .iter()
        .zip(generated)
        .map(|(ex, text)| (ex.id.to_string(), parse_generated(&text)))
        .collect())
}
