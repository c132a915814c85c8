// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic layered layout for imported trees.
//!
//! Nodes are layered by longest distance from the output node: a
//! producer always sits one layer past its furthest consumer, so shared
//! producers land left of everything that reads them. Layers grow
//! leftwards; within a layer nodes stagger down and slightly left in
//! discovery order.

use matbridge_tree::{NodeId, ShaderTree};
use std::collections::HashMap;

/// Horizontal distance between adjacent layers.
const NODE_LAYER_SEPARATION_WIDTH: f32 = 280.0;

/// Horizontal stagger between nodes within a layer.
const NODE_LAYER_SHIFT_X: f32 = 30.0;

/// Vertical stagger between nodes within a layer.
const NODE_LAYER_SHIFT_Y: f32 = 100.0;

/// Assign canvas positions to all nodes reachable from `root`.
pub fn arrange(tree: &mut ShaderTree, root: NodeId) {
    let mut layers: HashMap<NodeId, usize> = HashMap::new();
    layers.insert(root, 0);
    let mut frontier = vec![root];
    while let Some(consumer) = frontier.pop() {
        let next = layers[&consumer] + 1;
        let producers: Vec<NodeId> = tree
            .links()
            .filter(|l| l.to_node == consumer)
            .map(|l| l.from_node)
            .collect();
        for producer in producers {
            if layers.get(&producer).map_or(true, |&layer| layer < next) {
                layers.insert(producer, next);
                frontier.push(producer);
            }
        }
    }

    let max_layer = layers.values().copied().max().unwrap_or(0);
    let ids: Vec<NodeId> = tree.node_ids().collect();
    let mut layer_x = 0.0f32;
    for layer in 0..=max_layer {
        let mut x = layer_x;
        let mut y = 0.0f32;
        for id in ids.iter().filter(|id| layers.get(id) == Some(&layer)) {
            if let Some(node) = tree.node_mut(*id) {
                node.position = [x, y];
            }
            x -= NODE_LAYER_SHIFT_X;
            y -= NODE_LAYER_SHIFT_Y;
        }
        layer_x -= NODE_LAYER_SEPARATION_WIDTH;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matbridge_tree::{MathOp, OpKind, ShaderNode};

    fn math() -> ShaderNode {
        ShaderNode::op(OpKind::Math {
            op: MathOp::Add,
            clamp: false,
        })
    }

    #[test]
    fn test_chain_layers() {
        let mut tree = ShaderTree::new("t");
        let a = tree.add_node(math());
        let b = tree.add_node(math());
        let c = tree.add_node(math());
        tree.connect(a, "Value", b, "Value1").unwrap();
        tree.connect(b, "Value", c, "Value1").unwrap();

        arrange(&mut tree, c);
        assert_eq!(tree.node(c).unwrap().position, [0.0, 0.0]);
        assert_eq!(tree.node(b).unwrap().position, [-280.0, 0.0]);
        assert_eq!(tree.node(a).unwrap().position, [-560.0, 0.0]);
    }

    #[test]
    fn test_producer_sits_past_furthest_consumer() {
        // a feeds both b (layer 1) and d (layer 3): a must land on layer 4
        let mut tree = ShaderTree::new("t");
        let root = tree.add_node(math());
        let b = tree.add_node(math());
        let c = tree.add_node(math());
        let d = tree.add_node(math());
        let a = tree.add_node(math());
        tree.connect(b, "Value", root, "Value1").unwrap();
        tree.connect(c, "Value", b, "Value1").unwrap();
        tree.connect(d, "Value", c, "Value1").unwrap();
        tree.connect(a, "Value", b, "Value2").unwrap();
        tree.connect(a, "Value", d, "Value1").unwrap();

        arrange(&mut tree, root);
        assert_eq!(tree.node(a).unwrap().position[0], -4.0 * 280.0);
        assert_eq!(tree.node(d).unwrap().position[0], -3.0 * 280.0);
    }

    #[test]
    fn test_siblings_stagger_within_layer() {
        let mut tree = ShaderTree::new("t");
        let root = tree.add_node(math());
        let p1 = tree.add_node(math());
        let p2 = tree.add_node(math());
        tree.connect(p1, "Value", root, "Value1").unwrap();
        tree.connect(p2, "Value", root, "Value2").unwrap();

        arrange(&mut tree, root);
        assert_eq!(tree.node(p1).unwrap().position, [-280.0, 0.0]);
        assert_eq!(tree.node(p2).unwrap().position, [-310.0, -100.0]);
    }
}
