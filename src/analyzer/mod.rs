mod classifier;
mod evaluator;
mod markers;

pub use classifier::{Aggregator, classify};
pub use evaluator::{Assessment, Evaluator, EvaluatorConfig, MarkerPolicy};
pub use markers::{MarkerHit, MarkerScanner};
