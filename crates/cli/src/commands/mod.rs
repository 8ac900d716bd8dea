pub mod eval;
pub mod parse;
pub mod snapshot;
