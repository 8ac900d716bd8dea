use thiserror::Error;

/// Problems found while turning a [`crate::NodeBuilder`] into a definition tree.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("repeat {reference} declares more than one template")]
    DuplicateTemplate { reference: String },
    #[error("select {reference} declares both static items and an itemset")]
    ConflictingItems { reference: String },
    #[error("invalid node name '{name}' below {parent}")]
    InvalidName { name: String, parent: String },
    #[error("the form root must be a group, found {kind}")]
    InvalidRoot { kind: String },
    #[error("malformed form description: {0}")]
    Json(#[from] serde_json::Error),
}
