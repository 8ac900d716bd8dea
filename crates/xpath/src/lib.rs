//! XPath 1.0 parser and evaluator for form computations.
//!
//! The evaluator is generic over the host tree through [`DataModel`]; every
//! evaluation can report the nodes it read ([`evaluate_tracked`]) so a host
//! can recompute exactly the expressions affected by a change.

pub mod cache;
pub mod engine;
pub mod model;
pub mod parser;
pub mod simple_node;
pub mod xdm;

pub use cache::ExpressionCache;
pub use engine::evaluator::{evaluate, evaluate_str, evaluate_tracked};
pub use engine::runtime::{
    CallCtx, Error, ErrorCode, EvalContext, EvalContextBuilder, FunctionRegistry, RegistrationError,
};
pub use engine::tracker::{DependencyTracker, Evaluation};
pub use model::{DataModel, NodeHandle, NodeKind};
pub use parser::{XPathParseError, XPathParser, parse_xpath};
pub use simple_node::{SimpleDocument, SimpleNodeId};
pub use xdm::{AtomicValue, Value, ValueType};
