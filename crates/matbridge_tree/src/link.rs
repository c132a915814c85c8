// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the shader tree.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// A link between a producer output and a consumer input.
///
/// Links whose endpoint types differ are kept but flagged invalid; the
/// export traversal and UI ignore them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Producer node
    pub from_node: NodeId,
    /// Producer output socket name
    pub from_output: String,
    /// Consumer node
    pub to_node: NodeId,
    /// Consumer input socket name
    pub to_input: String,
    /// Whether the endpoint types structurally match
    pub valid: bool,
}

impl Link {
    /// Create a link; validity is computed by the owning tree.
    pub fn new(
        from_node: NodeId,
        from_output: impl Into<String>,
        to_node: NodeId,
        to_input: impl Into<String>,
    ) -> Self {
        Self {
            id: LinkId::new(),
            from_node,
            from_output: from_output.into(),
            to_node,
            to_input: to_input.into(),
            valid: true,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}
