mod predict;
mod strategy;

pub use predict::{
    parse_generated, predict_all_candidates, predict_with_classifier, predict_with_generator,
    AnswerGenerator, CandidateClassifier,
};
pub use strategy::{
    construct_query, ContextBuilder, ContextKind, ContextRecord, ContextStrategy, EvidencePolicy,
};
