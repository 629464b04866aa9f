mod evaluator;

pub use evaluator::{CodeEvaluator, ExecutionRequest, Verdict};
