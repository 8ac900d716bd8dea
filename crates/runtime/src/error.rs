use std::fmt;

use thiserror::Error;
use xforms_core::DefinitionError;
use xforms_xpath::XPathParseError;

use crate::scheduler::OutputKind;
use crate::tree::NodeId;

/// Failure to load a form. Nothing is materialized when this is returned.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("invalid {bind} expression on {reference}: {source}")]
    Syntax {
        reference: String,
        bind: String,
        #[source]
        source: XPathParseError,
    },
}

/// Rejected mutation. The tree is left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("no repeat instance at index {index} in {reference} ({len} instances)")]
    IndexOutOfRange { reference: String, index: isize, len: usize },
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("no node matches {0}")]
    UnknownReference(String),
    #[error("{0} is not a repeat range")]
    NotARepeat(String),
    #[error("{0} is not a value node")]
    NotAValueNode(String),
    #[error("{0} is not a select")]
    NotASelect(String),
    #[error("{0} is not relevant")]
    NotRelevant(String),
    #[error("{0} is read-only")]
    ReadOnly(String),
    #[error("'{item}' is not an item of {reference}")]
    UnknownItem { reference: String, item: String },
    #[error("{operation} is not supported on {reference}")]
    UnsupportedOperation { reference: String, operation: &'static str },
    #[error("template {template} cannot be used for {reference}")]
    TemplateMismatch { reference: String, template: String },
}

/// An output that did not settle within the per-pass evaluation cap.
/// It keeps the value computed by its last evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDiagnostic {
    pub reference: String,
    pub output: OutputKind,
    pub evaluations: usize,
}

impl fmt::Display for CycleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency cycle: {} of {} did not settle after {} evaluations",
            self.output, self.reference, self.evaluations
        )
    }
}
