// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph-document model for portable material descriptions.
//!
//! A [`Document`] holds typed nodes, named subgraphs ([`NodeGraph`]) with
//! declared outputs, operator signatures ([`NodeDef`]) and legacy
//! material declarations, and serializes to the XML-based interchange
//! format. The translation engine consumes this crate as its document API;
//! the format schema lives entirely here.

pub mod document;
pub mod element;
pub mod types;
pub mod xml;

pub use document::{split_path, Document, DOCUMENT_VERSION};
pub use element::{
    BindInput, DefInput, DefOutput, DocNode, GraphOutput, Input, InputBinding, LegacyMaterial,
    NodeDef, NodeGraph, ShaderRef,
};
pub use types::ValueType;

/// Error raised by document construction or serialization.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed document text
    #[error("parse error: {0}")]
    Parse(String),

    /// Unknown value type string
    #[error("unknown value type '{0}'")]
    UnknownType(String),

    /// Name collision within a container
    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    /// A referenced path does not exist
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// An include directive could not be resolved against the search path
    #[error("include not found: {0}")]
    IncludeNotFound(String),

    /// File I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
