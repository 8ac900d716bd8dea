//! Immutable form definitions and the snapshot types a running form exposes.

pub mod builder;
pub mod definition;
pub mod error;
pub mod snapshot;

pub use builder::{BuilderKind, FormDefinition, NodeBuilder};
pub use definition::{
    BindDefinition, BindKind, Category, DefinitionKind, ItemsetDefinition, NodeDefinition,
    NodeType, SelectItem, SelectMode,
};
pub use error::DefinitionError;
pub use snapshot::{ItemSnapshot, NodeSnapshot};
