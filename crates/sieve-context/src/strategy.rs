use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sieve_core::{Candidate, Constraint, EvidenceResult, Example, PropDir, SieveError};

/// Render constraints as a query phrase.
///
/// Truthy constraints are joined with ` and `; negated ones follow after
/// ` but not `, joined with ` and not `. A subject-direction constraint reads
/// `{prop} {other}`, an object-direction one `{other} {prop}`.
pub fn construct_query(constraints: &[Constraint]) -> String {
    let mut yes = Vec::new();
    let mut no = Vec::new();
    for c in constraints {
        let phrase = match c.prop_dir {
            PropDir::Subj => format!("{} {}", c.prop.text, c.other_ent.text),
            PropDir::Obj => format!("{} {}", c.other_ent.text, c.prop.text),
        };
        if c.truthy {
            yes.push(phrase);
        } else {
            no.push(phrase);
        }
    }
    let mut query = yes.join(" and ");
    if !no.is_empty() {
        query.push_str(" but not ");
        query.push_str(&no.join(" and not "));
    }
    query
}

/// Which dense sentences make it into a candidate context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvidencePolicy {
    /// Sentences scoring below this are dropped (default 0.65).
    pub min_score: f32,
    /// At most this many sentences are kept (default 10).
    pub max_sentences: usize,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            min_score: 0.65,
            max_sentences: 10,
        }
    }
}

impl EvidencePolicy {
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences;
        self
    }

    /// Sentences above the floor, capped; the best sentence alone when none pass.
    pub fn select<'a>(&self, evidence: &'a EvidenceResult) -> Vec<&'a str> {
        let keep: Vec<&str> = evidence
            .sentences
            .iter()
            .zip(&evidence.scores)
            .filter(|(_, score)| **score >= self.min_score)
            .map(|(s, _)| s.as_str())
            .take(self.max_sentences)
            .collect();
        if keep.is_empty() {
            evidence.sentences.iter().take(1).map(String::as_str).collect()
        } else {
            keep
        }
    }
}

/// Whether a strategy yields one context per example or one per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Input to an answer generator.
    Generative,
    /// Input to a yes/no candidate classifier.
    Binary,
}

/// Named formatting policy for model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextStrategy {
    /// `what {query}?`
    #[default]
    Question,
    /// `{question}`
    QuestionNl,
    /// `what {query}? {evidence ; ...}`
    QuestionDense,
    /// `{question} : {evidence ; ...}`
    QuestionDenseNl,
    /// `is {candidate} the {query}?`
    Binary,
    /// `{candidate} ; {question}`
    BinaryNl,
    /// `is {candidate} the {query}? {evidence}`
    BinaryDense,
    /// `{candidate} ; {question} ; {evidence}`
    BinaryDenseNl,
    /// `is {candidate} the {query}? {gold evidence}`
    BinaryGoldEvidence,
    /// `{candidate} ; {question} ; {gold evidence}`
    BinaryGoldEvidenceNl,
}

impl ContextStrategy {
    pub const ALL: [ContextStrategy; 10] = [
        ContextStrategy::Question,
        ContextStrategy::QuestionNl,
        ContextStrategy::QuestionDense,
        ContextStrategy::QuestionDenseNl,
        ContextStrategy::Binary,
        ContextStrategy::BinaryNl,
        ContextStrategy::BinaryDense,
        ContextStrategy::BinaryDenseNl,
        ContextStrategy::BinaryGoldEvidence,
        ContextStrategy::BinaryGoldEvidenceNl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContextStrategy::Question => "question",
            ContextStrategy::QuestionNl => "question-nl",
            ContextStrategy::QuestionDense => "question-dense",
            ContextStrategy::QuestionDenseNl => "question-dense-nl",
            ContextStrategy::Binary => "binary",
            ContextStrategy::BinaryNl => "binary-nl",
            ContextStrategy::BinaryDense => "binary-dense",
            ContextStrategy::BinaryDenseNl => "binary-dense-nl",
            ContextStrategy::BinaryGoldEvidence => "binary-gold-evidence",
            ContextStrategy::BinaryGoldEvidenceNl => "binary-gold-evidence-nl",
        }
    }

    pub fn kind(self) -> ContextKind {
        match self {
            ContextStrategy::Question
            | ContextStrategy::QuestionNl
            | ContextStrategy::QuestionDense
            | ContextStrategy::QuestionDenseNl => ContextKind::Generative,
            _ => ContextKind::Binary,
        }
    }
}

impl fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContextStrategy {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
                SieveError::Config(format!(
                    "unknown context strategy {s:?} (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// One model input, with enough identity to route the model's answer back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub example_id: String,
    pub cluster_id: String,
    /// Candidate text for binary strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    pub context: String,
    /// Gold label when known: `is_answer` for binary strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<bool>,
}

/// Builds model inputs from examples under a configured strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder {
    strategy: ContextStrategy,
    policy: EvidencePolicy,
}

impl ContextBuilder {
    pub fn new(strategy: ContextStrategy) -> Self {
        Self {
            strategy,
            policy: EvidencePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EvidencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strategy(&self) -> ContextStrategy {
        self.strategy
    }

    fn missing_evidence(example: &Example, whose: &str) -> SieveError {
        SieveError::Validation(format!(
            "example {}: {whose} has no retrieved evidence; run the rerank stage first",
            example.id
        ))
    }

    /// The single context of an example under a generative strategy.
    pub fn example_context(&self, example: &Example) -> Result<String, SieveError> {
        let dense = || -> Result<String, SieveError> {
            let evidence = example
                .retrieved
                .as_ref()
                .ok_or_else(|| Self::missing_evidence(example, "the question"))?;
            Ok(evidence.sentences.join(" ; "))
        };
        match self.strategy {
            ContextStrategy::Question => {
                Ok(format!("what {}?", construct_query(&example.constraints)))
            }
            ContextStrategy::QuestionNl => Ok(example.question.clone()),
            ContextStrategy::QuestionDense => Ok(format!(
                "what {}? {}",
                construct_query(&example.constraints),
                dense()?
            )),
            ContextStrategy::QuestionDenseNl => Ok(format!("{} : {}", example.question, dense()?)),
            binary => Err(SieveError::Config(format!(
                "strategy {binary} builds one context per candidate"
            ))),
        }
    }

    /// The context of one candidate under a binary strategy.
    pub fn candidate_context(
        &self,
        example: &Example,
        candidate: &Candidate,
    ) -> Result<String, SieveError> {
        let query = || construct_query(&example.constraints);
        let dense = || -> Result<String, SieveError> {
            let evidence = candidate.retrieved.as_ref().ok_or_else(|| {
                Self::missing_evidence(example, &format!("candidate {:?}", candidate.text))
            })?;
            Ok(self.policy.select(evidence).join(" "))
        };
        let gold = || {
            candidate
                .evidence
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };

        match self.strategy {
            ContextStrategy::Binary => Ok(format!("is {} the {}?", candidate.text, query())),
            ContextStrategy::BinaryNl => Ok(format!("{} ; {}", candidate.text, example.question)),
            ContextStrategy::BinaryDense => Ok(format!(
                "is {} the {}? {}",
                candidate.text,
                query(),
                dense()?
            )),
            ContextStrategy::BinaryDenseNl => Ok(format!(
                "{} ; {} ; {}",
                candidate.text,
                example.question,
                dense()?
            )),
            ContextStrategy::BinaryGoldEvidence => Ok(format!(
                "is {} the {}? {}",
                candidate.text,
                query(),
                gold()
            )),
            ContextStrategy::BinaryGoldEvidenceNl => Ok(format!(
                "{} ; {} ; {}",
                candidate.text,
                example.question,
                gold()
            )),
            generative => Err(SieveError::Config(format!(
                "strategy {generative} builds one context per example"
            ))),
        }
    }

    /// Every model input of an example: one for generative strategies, one
    /// per candidate (in candidate order) for binary ones.
    pub fn records(&self, example: &Example) -> Result<Vec<ContextRecord>, SieveError> {
        let example_id = example.id.to_string();
        let cluster_id = example.cluster_id.to_string();
        match self.strategy.kind() {
            ContextKind::Generative => Ok(vec![ContextRecord {
                example_id,
                cluster_id,
                candidate: None,
                context: self.example_context(example)?,
                label: None,
            }]),
            ContextKind::Binary => example
                .candidates
                .iter()
                .map(|candidate| {
                    Ok(ContextRecord {
                        example_id: example_id.clone(),
                        cluster_id: cluster_id.clone(),
                        candidate: Some(candidate.text.clone()),
                        context: self.candidate_context(example, candidate)?,
                        label: candidate.is_answer,
                    })
                })
                .collect(),
        }
    }
}
