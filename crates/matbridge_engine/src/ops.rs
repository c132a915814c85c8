// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression building over document nodes.
//!
//! An [`Item`] is either a literal host value or a handle to a document
//! node already emitted. Operators fold literal operands componentwise
//! (a lone float broadcasts) and only emit document nodes when at least
//! one operand is a node handle. Non-shader nodes are placed in the
//! value nodegraph; shader-typed nodes live at the document root, and
//! bindings across that boundary go through synthesized graph outputs.

use crate::coerce::{coerce_value, literal_type, value_of_type};
use crate::error::EngineError;
use matbridge_document::{split_path, Document, ValueType};
use matbridge_tree::SocketValue;

/// Name of the nodegraph holding all non-shader nodes of an export.
pub const VALUE_GRAPH: &str = "NG";

/// A value flowing through expression building.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A literal host value, not yet materialized in the document
    Literal(SocketValue),
    /// A handle to an emitted document node
    Node {
        /// Document path of the node
        path: String,
        /// Value type the handle carries
        ty: ValueType,
        /// Selected output, for multi-output producers
        output: Option<String>,
    },
}

impl Item {
    /// Wrap a host value.
    pub fn lit(value: SocketValue) -> Self {
        Self::Literal(value)
    }

    /// The value type this item carries.
    pub fn ty(&self) -> ValueType {
        match self {
            Self::Literal(v) => literal_type(v),
            Self::Node { ty, .. } => *ty,
        }
    }

    /// The literal value, when this item is one.
    pub fn as_literal(&self) -> Option<&SocketValue> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Node { .. } => None,
        }
    }
}

/// Emits nodes and bindings into a document being exported.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    doc: &'a mut Document,
}

impl<'a> GraphBuilder<'a> {
    /// Wrap a document.
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc }
    }

    /// Create a node, placing shader-typed nodes at the root and values
    /// in the value nodegraph.
    pub fn add(&mut self, category: &str, ty: ValueType) -> Item {
        let path = if ty.is_shader() {
            self.doc.add_node(category, ty)
        } else {
            let name = self.doc.add_nodegraph(VALUE_GRAPH).add_node(category, ty);
            format!("{VALUE_GRAPH}/{name}")
        };
        Item::Node {
            path,
            ty,
            output: None,
        }
    }

    /// Bind an input of an emitted node to an item, with the declared type.
    ///
    /// A literal is serialized in place. A node handle in the same
    /// container becomes a direct reference; a handle inside the value
    /// nodegraph consumed at the root goes through a synthesized graph
    /// output named after the producer, reused when it already exists.
    pub fn bind(
        &mut self,
        node: &Item,
        input: &str,
        ty: ValueType,
        item: &Item,
    ) -> Result<(), EngineError> {
        let Item::Node { path: consumer, .. } = node else {
            return Err(EngineError::TypeMismatch(
                "cannot bind an input on a literal".to_string(),
            ));
        };
        let consumer = consumer.clone();
        match item {
            Item::Literal(value) => {
                let text = coerce_value(value, ty)?;
                self.node_mut(&consumer)?.set_value_input(input, ty, text);
            }
            Item::Node { path, output, .. } => {
                let (consumer_graph, _) = split_path(&consumer);
                let (producer_graph, producer) = split_path(path);
                if consumer_graph == producer_graph {
                    let producer = producer.to_string();
                    let output = output.clone();
                    self.node_mut(&consumer)?
                        .set_node_input(input, ty, producer, output);
                } else if consumer_graph.is_none() {
                    let Some(graph) = producer_graph else {
                        return Err(EngineError::InconsistentGraphs(format!(
                            "{consumer} <- {path}"
                        )));
                    };
                    let out_name = match output {
                        Some(o) => format!("out_{producer}_{o}"),
                        None => format!("out_{producer}"),
                    };
                    let item_ty = item.ty();
                    let producer = producer.to_string();
                    let graph = graph.to_string();
                    let output = output.clone();
                    let ng = self.doc.nodegraph_mut(&graph).ok_or_else(|| {
                        EngineError::InconsistentGraphs(format!("missing nodegraph '{graph}'"))
                    })?;
                    if ng.output(Some(&out_name)).is_none() {
                        ng.add_output(out_name.clone(), item_ty, producer, output);
                    }
                    self.node_mut(&consumer)?
                        .set_graph_input(input, ty, graph, out_name);
                } else {
                    return Err(EngineError::InconsistentGraphs(format!(
                        "{consumer} <- {path}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn node_mut(
        &mut self,
        path: &str,
    ) -> Result<&mut matbridge_document::DocNode, EngineError> {
        self.doc.node_by_path_mut(path).ok_or_else(|| {
            EngineError::Document(matbridge_document::DocumentError::PathNotFound(
                path.to_string(),
            ))
        })
    }
}

// --- literal folding helpers ---

fn map1(value: &SocketValue, f: impl Fn(f32) -> f32) -> Option<SocketValue> {
    let comps: Vec<f32> = value.components()?.iter().map(|c| f(*c)).collect();
    value_of_type(literal_type(value), &comps)
        .or_else(|| Some(SocketValue::Tuple(comps)))
}

fn zip2(a: &SocketValue, b: &SocketValue, f: impl Fn(f32, f32) -> f32) -> Option<SocketValue> {
    let ca = a.components()?;
    let cb = b.components()?;
    let n = ca.len().max(cb.len());
    if (ca.len() != n && ca.len() != 1) || (cb.len() != n && cb.len() != 1) {
        return None;
    }
    let pick = |c: &[f32], i: usize| if c.len() == 1 { c[0] } else { c[i] };
    let comps: Vec<f32> = (0..n).map(|i| f(pick(&ca, i), pick(&cb, i))).collect();
    let template = if ca.len() >= cb.len() { a } else { b };
    value_of_type(literal_type(template), &comps).or_else(|| Some(SocketValue::Tuple(comps)))
}

/// The wider of two item types, by component count.
fn promote(a: &Item, b: &Item) -> ValueType {
    let ta = a.ty();
    let tb = b.ty();
    if tb.arity().unwrap_or(0) > ta.arity().unwrap_or(0) {
        tb
    } else {
        ta
    }
}

/// Broadcast a scalar literal to a tuple type, leaving node handles alone.
fn broadcast_literal(item: Item, ty: ValueType) -> Item {
    if let Item::Literal(value) = &item {
        if let (Some(comps), Some(arity)) = (value.components(), ty.arity()) {
            if comps.len() == 1 && arity > 1 {
                if let Some(v) = value_of_type(ty, &vec![comps[0]; arity]) {
                    return Item::Literal(v);
                }
            }
        }
    }
    item
}

/// Apply a one-operand operator, folding literals.
pub fn unary(
    g: &mut GraphBuilder,
    category: &str,
    f: impl Fn(f32) -> f32,
    a: Item,
) -> Result<Item, EngineError> {
    if let Item::Literal(v) = &a {
        if let Some(r) = map1(v, &f) {
            return Ok(Item::Literal(r));
        }
    }
    let ty = a.ty();
    let node = g.add(category, ty);
    g.bind(&node, "in", ty, &a)?;
    Ok(node)
}

/// Apply a two-operand operator, folding literals componentwise with
/// scalar broadcast.
pub fn binary(
    g: &mut GraphBuilder,
    category: &str,
    f: impl Fn(f32, f32) -> f32,
    a: Item,
    b: Item,
) -> Result<Item, EngineError> {
    if let (Item::Literal(x), Item::Literal(y)) = (&a, &b) {
        if let Some(r) = zip2(x, y, &f) {
            return Ok(Item::Literal(r));
        }
    }
    let ty = promote(&a, &b);
    let a = broadcast_literal(a, ty);
    let b = broadcast_literal(b, ty);
    let node = g.add(category, ty);
    g.bind(&node, "in1", a.ty(), &a)?;
    g.bind(&node, "in2", b.ty(), &b)?;
    Ok(node)
}

/// a + b
pub fn add(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "add", |x, y| x + y, a, b)
}

/// a - b
pub fn subtract(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "subtract", |x, y| x - y, a, b)
}

/// a * b
pub fn multiply(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "multiply", |x, y| x * y, a, b)
}

/// a / b
pub fn divide(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "divide", |x, y| x / y, a, b)
}

/// min(a, b)
pub fn minimum(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "min", f32::min, a, b)
}

/// max(a, b)
pub fn maximum(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(g, "max", f32::max, a, b)
}

/// |a|
pub fn absolute(g: &mut GraphBuilder, a: Item) -> Result<Item, EngineError> {
    unary(g, "absval", f32::abs, a)
}

/// floor(a)
pub fn floor(g: &mut GraphBuilder, a: Item) -> Result<Item, EngineError> {
    unary(g, "floor", f32::floor, a)
}

/// Euclidean remainder of a by b, never negative
pub fn modulo(g: &mut GraphBuilder, a: Item, b: Item) -> Result<Item, EngineError> {
    binary(
        g,
        "modulo",
        |x, y| if y == 0.0 { 0.0 } else { x.rem_euclid(y) },
        a,
        b,
    )
}

/// a mod 1
pub fn fract(g: &mut GraphBuilder, a: Item) -> Result<Item, EngineError> {
    modulo(g, a, Item::lit(SocketValue::Float(1.0)))
}

/// Clamp to [0, 1].
pub fn clamp01(g: &mut GraphBuilder, a: Item) -> Result<Item, EngineError> {
    if let Item::Literal(v) = &a {
        if let Some(r) = map1(v, |x| x.clamp(0.0, 1.0)) {
            return Ok(Item::Literal(r));
        }
    }
    let ty = a.ty();
    let node = g.add("clamp", ty);
    g.bind(&node, "in", ty, &a)?;
    g.bind(&node, "low", ty, &Item::lit(SocketValue::Float(0.0)))?;
    g.bind(&node, "high", ty, &Item::lit(SocketValue::Float(1.0)))?;
    Ok(node)
}

/// Factor blend: a when fac is 0, b when fac is 1.
///
/// The document mix operator returns `fg * mix + bg * (1 - mix)`, so the
/// blend target goes to `fg` and the base to `bg`.
pub fn blend(g: &mut GraphBuilder, fac: Item, a: Item, b: Item) -> Result<Item, EngineError> {
    if let (Item::Literal(f), Item::Literal(x), Item::Literal(y)) = (&fac, &a, &b) {
        let folded = f.components().and_then(|fc| {
            let t = *fc.first()?;
            zip2(x, y, |xa, yb| xa * (1.0 - t) + yb * t)
        });
        if let Some(r) = folded {
            return Ok(Item::Literal(r));
        }
    }
    let ty = promote(&a, &b);
    let a = broadcast_literal(a, ty);
    let b = broadcast_literal(b, ty);
    let node = g.add("mix", ty);
    g.bind(&node, "fg", b.ty(), &b)?;
    g.bind(&node, "bg", a.ty(), &a)?;
    g.bind(&node, "mix", ValueType::Float, &fac)?;
    Ok(node)
}

/// in1 when value1 >= value2, in2 otherwise.
pub fn ifgreatereq(
    g: &mut GraphBuilder,
    value1: Item,
    value2: Item,
    in1: Item,
    in2: Item,
) -> Result<Item, EngineError> {
    if let (Item::Literal(v1), Item::Literal(v2)) = (&value1, &value2) {
        let cond = match (v1.components(), v2.components()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(a[0] >= b[0]),
            _ => None,
        };
        if let Some(cond) = cond {
            return Ok(if cond { in1 } else { in2 });
        }
    }
    let ty = promote(&in1, &in2);
    let in1 = broadcast_literal(in1, ty);
    let in2 = broadcast_literal(in2, ty);
    let node = g.add("ifgreatereq", ty);
    g.bind(&node, "value1", ValueType::Float, &value1)?;
    g.bind(&node, "value2", ValueType::Float, &value2)?;
    g.bind(&node, "in1", in1.ty(), &in1)?;
    g.bind(&node, "in2", in2.ty(), &in2)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matbridge_document::InputBinding;

    fn lit(v: f32) -> Item {
        Item::lit(SocketValue::Float(v))
    }

    fn color(c: [f32; 3]) -> Item {
        Item::lit(SocketValue::Color3(c))
    }

    #[test]
    fn test_fold_binary_with_broadcast() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);

        let r = multiply(&mut g, color([0.5, 1.0, 0.0]), lit(2.0)).unwrap();
        assert_eq!(r, Item::Literal(SocketValue::Color3([1.0, 2.0, 0.0])));
        assert!(doc.nodegraphs.is_empty());
    }

    #[test]
    fn test_fold_round_semantics() {
        // round(x) = floor(x) + (1 if fract(x) >= 0.5 else 0)
        let round = |v: f32| {
            let mut doc = Document::new();
            let mut g = GraphBuilder::new(&mut doc);
            let f = floor(&mut g, lit(v)).unwrap();
            let r = fract(&mut g, lit(v)).unwrap();
            let up = add(&mut g, f.clone(), lit(1.0)).unwrap();
            let out = ifgreatereq(&mut g, r, lit(0.5), up, f).unwrap();
            match out {
                Item::Literal(SocketValue::Float(x)) => x,
                other => panic!("expected literal, got {other:?}"),
            }
        };
        assert_eq!(round(2.4), 2.0);
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-0.3), 0.0);
    }

    #[test]
    fn test_fract_negative() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let r = fract(&mut g, lit(-0.3)).unwrap();
        match r {
            Item::Literal(SocketValue::Float(x)) => assert!((x - 0.7).abs() < 1e-6),
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn test_clamp01_fold() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let r = clamp01(&mut g, color([1.5, -0.5, 0.25])).unwrap();
        assert_eq!(r, Item::Literal(SocketValue::Color3([1.0, 0.0, 0.25])));
    }

    #[test]
    fn test_blend_boundary_factors() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let a = color([1.0, 0.0, 0.0]);
        let b = color([0.0, 1.0, 0.0]);
        assert_eq!(
            blend(&mut g, lit(0.0), a.clone(), b.clone()).unwrap(),
            a.clone()
        );
        assert_eq!(blend(&mut g, lit(1.0), a, b.clone()).unwrap(), b);
    }

    #[test]
    fn test_node_emission_in_value_graph() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let tex = g.add("image", ValueType::Color3);
        let r = multiply(&mut g, tex, color([0.5, 0.5, 0.5])).unwrap();

        let Item::Node { path, ty, .. } = &r else {
            panic!("expected node");
        };
        assert_eq!(*ty, ValueType::Color3);
        let node = doc.node_by_path(path).unwrap();
        assert_eq!(node.category, "multiply");
        assert!(matches!(
            &node.input("in1").unwrap().binding,
            InputBinding::Node { node, .. } if node.starts_with("image")
        ));
        assert_eq!(
            node.input("in2").unwrap().binding,
            InputBinding::Value("0.5, 0.5, 0.5".to_string())
        );
    }

    #[test]
    fn test_cross_graph_binding_reuses_output() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let value = g.add("image", ValueType::Color3);
        let shader = g.add("standard_surface", ValueType::Surfaceshader);
        g.bind(&shader, "base_color", ValueType::Color3, &value)
            .unwrap();
        g.bind(&shader, "emission_color", ValueType::Color3, &value)
            .unwrap();

        let ng = doc.nodegraph(VALUE_GRAPH).unwrap();
        assert_eq!(ng.outputs.len(), 1);
        assert!(ng.output(Some("out_image_1")).is_some());
        let node = doc.node_of_category("standard_surface").unwrap();
        assert!(matches!(
            &node.input("base_color").unwrap().binding,
            InputBinding::Graph { nodegraph, output }
                if nodegraph == VALUE_GRAPH && output == "out_image_1"
        ));
    }

    #[test]
    fn test_value_to_shader_binding_rejected() {
        let mut doc = Document::new();
        let mut g = GraphBuilder::new(&mut doc);
        let shader = g.add("surface", ValueType::Surfaceshader);
        let consumer = g.add("multiply", ValueType::Color3);
        assert!(matches!(
            g.bind(&consumer, "in1", ValueType::Color3, &shader),
            Err(EngineError::InconsistentGraphs(_))
        ));
    }
}
