// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tree data structure containing nodes and links, with link-type
//! revalidation after every structural edit.

use crate::link::{Link, LinkId};
use crate::node::{NodeId, ShaderNode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A shader node tree owned by a host material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderTree {
    /// Tree name
    pub name: String,
    /// Nodes in the tree
    nodes: IndexMap<NodeId, ShaderNode>,
    /// Links between nodes
    links: IndexMap<LinkId, Link>,
    /// Suppresses revalidation during bulk edits
    #[serde(skip)]
    suppress_update: bool,
}

impl ShaderTree {
    /// Create a new empty tree
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            suppress_update: false,
        }
    }

    /// Add a node to the tree
    pub fn add_node(&mut self, node: ShaderNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<ShaderNode> {
        self.links.retain(|_, l| !l.involves_node(node_id));
        let node = self.nodes.swap_remove(&node_id);
        self.changed();
        node
    }

    /// Remove all nodes and links
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&ShaderNode> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut ShaderNode> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &ShaderNode> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find a node by display name
    pub fn node_by_name(&self, name: &str) -> Option<&ShaderNode> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Add a link between named sockets.
    ///
    /// Both sockets must exist and the input must be free; a type mismatch
    /// does not reject the link, it only clears its validity flag.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_output: &str,
        to_node: NodeId,
        to_input: &str,
    ) -> Result<LinkId, TreeError> {
        let source = self
            .nodes
            .get(&from_node)
            .ok_or(TreeError::NodeNotFound(from_node))?;
        let target = self
            .nodes
            .get(&to_node)
            .ok_or(TreeError::NodeNotFound(to_node))?;

        source
            .output(from_output)
            .ok_or_else(|| TreeError::SocketNotFound(from_output.to_string()))?;
        target
            .input(to_input)
            .ok_or_else(|| TreeError::SocketNotFound(to_input.to_string()))?;

        if from_node == to_node {
            return Err(TreeError::SelfLoop);
        }
        if self
            .links
            .values()
            .any(|l| l.to_node == to_node && l.to_input == to_input)
        {
            return Err(TreeError::InputOccupied(to_input.to_string()));
        }

        let link = Link::new(from_node, from_output, to_node, to_input);
        let id = link.id;
        self.links.insert(id, link);
        self.changed();
        Ok(id)
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.swap_remove(&link_id);
        self.changed();
        link
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// The link feeding a named input, if any
    pub fn link_to(&self, node_id: NodeId, input: &str) -> Option<&Link> {
        self.links
            .values()
            .find(|l| l.to_node == node_id && l.to_input == input)
    }

    /// The valid link feeding a named input, if any.
    ///
    /// Invalid links are excluded from traversal; a required input fed only
    /// by an invalid link behaves as unconnected.
    pub fn valid_link_to(&self, node_id: NodeId, input: &str) -> Option<&Link> {
        self.link_to(node_id, input).filter(|l| l.valid)
    }

    /// Run a bulk edit with revalidation suppressed, then revalidate once.
    pub fn bulk_edit<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.suppress_update {
            // already inside a bulk scope, reuse it
            return f(self);
        }
        self.suppress_update = true;
        let result = f(self);
        self.suppress_update = false;
        self.update_links();
        result
    }

    /// Recompute validity flags on all links: strict structural equality of
    /// the declared endpoint socket types, no coercion.
    pub fn update_links(&mut self) {
        let mut validity = Vec::with_capacity(self.links.len());
        for (id, link) in &self.links {
            let from_ty = self
                .nodes
                .get(&link.from_node)
                .and_then(|n| n.output(&link.from_output))
                .map(|s| s.ty);
            let to_ty = self
                .nodes
                .get(&link.to_node)
                .and_then(|n| n.input(&link.to_input))
                .map(|s| s.ty);
            let valid = matches!((from_ty, to_ty), (Some(a), Some(b)) if a == b);
            validity.push((*id, valid));
        }
        for (id, valid) in validity {
            if let Some(link) = self.links.get_mut(&id) {
                link.valid = valid;
            }
        }
    }

    fn changed(&mut self) {
        if !self.suppress_update {
            self.update_links();
        }
    }
}

impl Default for ShaderTree {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when editing the tree
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Node not found
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("socket not found: {0}")]
    SocketNotFound(String),

    /// Input already has an incoming link
    #[error("input already connected: {0}")]
    InputOccupied(String),

    /// Self-loop not allowed
    #[error("self-loop not allowed")]
    SelfLoop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MathOp, OpKind};

    fn math_node() -> ShaderNode {
        ShaderNode::op(OpKind::Math {
            op: MathOp::Add,
            clamp: false,
        })
    }

    #[test]
    fn test_connect_and_validity() {
        let mut tree = ShaderTree::new("test");
        let a = tree.add_node(math_node());
        let b = tree.add_node(math_node());

        let id = tree.connect(a, "Value", b, "Value1").unwrap();
        assert!(tree.links().next().unwrap().valid);
        assert!(tree.valid_link_to(b, "Value1").is_some());
        tree.disconnect(id);
        assert_eq!(tree.link_count(), 0);
    }

    #[test]
    fn test_type_mismatch_flags_invalid() {
        let mut tree = ShaderTree::new("test");
        let rgb = tree.add_node(ShaderNode::op(OpKind::Rgb));
        let math = tree.add_node(math_node());

        // color3 output into a float input: link exists but is invalid
        tree.connect(rgb, "Color", math, "Value1").unwrap();
        let link = tree.links().next().unwrap();
        assert!(!link.valid);
        assert!(tree.link_to(math, "Value1").is_some());
        assert!(tree.valid_link_to(math, "Value1").is_none());
    }

    #[test]
    fn test_input_occupied() {
        let mut tree = ShaderTree::new("test");
        let a = tree.add_node(math_node());
        let b = tree.add_node(math_node());
        let c = tree.add_node(math_node());

        tree.connect(a, "Value", c, "Value1").unwrap();
        assert!(matches!(
            tree.connect(b, "Value", c, "Value1"),
            Err(TreeError::InputOccupied(_))
        ));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut tree = ShaderTree::new("test");
        let a = tree.add_node(math_node());
        assert!(matches!(
            tree.connect(a, "Value", a, "Value1"),
            Err(TreeError::SelfLoop)
        ));
    }

    #[test]
    fn test_bulk_edit_validates_once_at_end() {
        let mut tree = ShaderTree::new("test");
        let rgb = tree.add_node(ShaderNode::op(OpKind::Rgb));
        let math = tree.add_node(math_node());

        tree.bulk_edit(|t| {
            t.connect(rgb, "Color", math, "Value1").unwrap();
            // inside the bulk scope the flag is still the optimistic default
            assert!(t.links().next().unwrap().valid);
        });
        // one validation pass ran at scope exit
        assert!(!tree.links().next().unwrap().valid);
    }

    #[test]
    fn test_remove_node_drops_links() {
        let mut tree = ShaderTree::new("test");
        let a = tree.add_node(math_node());
        let b = tree.add_node(math_node());
        tree.connect(a, "Value", b, "Value1").unwrap();

        tree.remove_node(a);
        assert_eq!(tree.link_count(), 0);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_serialization() {
        let mut tree = ShaderTree::new("ser");
        let a = tree.add_node(math_node());
        let b = tree.add_node(math_node());
        tree.connect(a, "Value", b, "Value2").unwrap();

        let text = ron::to_string(&tree).unwrap();
        let loaded: ShaderTree = ron::from_str(&text).unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.link_count(), 1);
        assert_eq!(loaded.name, "ser");
    }
}
