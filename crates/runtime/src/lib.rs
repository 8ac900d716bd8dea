//! Reactive computation core for XForms-style forms.
//!
//! A [`Form`] materializes a [`xforms_core::FormDefinition`] into a live
//! instance tree, evaluates every bind expression against it and keeps the
//! computed state current as values change and repeat instances come and go.

mod binds;
mod config;
mod error;
mod form;
mod model;
mod scheduler;
mod snapshot;
mod tree;

pub use config::EngineConfig;
pub use error::{CycleDiagnostic, FormError, MutationError};
pub use form::Form;
pub use model::XNode;
pub use scheduler::OutputKind;
pub use tree::NodeId;
