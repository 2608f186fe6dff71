mod dataset;
mod evaluator;
mod metric;

pub use dataset::{align_predictions, evaluate_files, write_metrics};
pub use evaluator::{
    depth_label, evaluate, evaluate_gold, ExampleScores, Evaluation, TRUNCATION_DEPTHS,
};
pub use metric::{Accuracy, Metric, Metrics, SetF1, SetScores};
