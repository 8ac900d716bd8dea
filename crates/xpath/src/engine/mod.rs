pub mod evaluator;
pub mod functions;
pub mod runtime;
pub mod tracker;
