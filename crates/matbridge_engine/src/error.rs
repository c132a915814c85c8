// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine error taxonomy.

use matbridge_document::DocumentError;
use matbridge_tree::TreeError;

/// Error raised by the translation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A value could not be coerced to the declared type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// No editable node class covers a document node's category
    #[error("no node class for category '{0}'")]
    NoMatchingClass(String),

    /// A class exists but no definition variant accepts the node signature
    #[error("no matching definition for {0}")]
    NoMatchingDefinition(String),

    /// The document has no material root to import from
    #[error("document has no material output node")]
    NoOutputNode,

    /// A host operator has no document counterpart
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// An operator sub-mode has no document counterpart
    #[error("unsupported sub-mode '{0}'")]
    UnsupportedSubMode(String),

    /// The document contains a reference cycle
    #[error("cyclic node reference through '{0}'")]
    CyclicGraph(String),

    /// A connection crosses containers in an unsupported direction
    #[error("inconsistent node containers: {0}")]
    InconsistentGraphs(String),

    /// A referenced image or file resource is unavailable
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// Document-level failure
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Tree-level failure
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// File I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
