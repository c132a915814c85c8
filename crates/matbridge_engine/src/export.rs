// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export of a host shader tree into a material document.
//!
//! The traversal walks backwards from the active material output node,
//! memoizing per node so shared producers emit exactly once. Operator
//! rules build document expressions through [`crate::ops`]; a rule that
//! cannot export logs a warning and poisons its consumers, while the
//! texture rule degrades to a flat error color instead.

use crate::error::EngineError;
use crate::ops::{self, GraphBuilder, Item};
use crate::session::Session;
use matbridge_document::{Document, ValueType};
use matbridge_tree::{
    ImageHandle, MathOp, MixMode, NodeId, NodeKind, NormalSpace, OpKind, ShaderNode, ShaderTree,
    SocketValue,
};
use std::collections::HashMap;
use tracing::warn;

/// Flat color substituted for unavailable textures.
pub const ERROR_COLOR: [f32; 3] = [1.0, 0.0, 1.0];

/// Marker for a node whose export rule failed; the cause is already
/// logged where it occurred.
struct ExportFailed;

type OpResult = Result<Item, ExportFailed>;

fn emit<T>(node_name: &str, r: Result<T, EngineError>) -> Result<T, ExportFailed> {
    r.map_err(|e| {
        warn!(node = %node_name, error = %e, "expression build failed");
        ExportFailed
    })
}

/// Export a tree into a new document.
///
/// The root is the first active material output node whose surface
/// input carries a valid link. Returns `None` when no output node
/// qualifies or the surface does not export; partial failures inside
/// the tree degrade per node instead.
pub fn export_tree(tree: &ShaderTree, session: &Session) -> Option<Document> {
    let output = tree.nodes().find(|n| {
        matches!(n.op_kind(), Some(OpKind::OutputMaterial { active: true }))
            && tree.valid_link_to(n.id, "Surface").is_some()
    });
    let Some(output) = output else {
        warn!(tree = %tree.name, "no active material output with a connected surface");
        return None;
    };
    let output = output.clone();

    let mut ex = Exporter {
        tree,
        session,
        doc: Document::new(),
        memo: HashMap::new(),
    };
    let surface = match ex.item_opt(&output, "Surface") {
        Ok(Some(item)) => item,
        _ => {
            warn!(tree = %tree.name, "material surface input did not export");
            return None;
        }
    };

    let shader = match surface.ty() {
        ValueType::Surfaceshader => surface,
        ValueType::Bsdf => {
            let mut g = GraphBuilder::new(&mut ex.doc);
            let node = g.add("surface", ValueType::Surfaceshader);
            if g.bind(&node, "bsdf", ValueType::Bsdf, &surface).is_err() {
                return None;
            }
            node
        }
        ValueType::Edf => {
            let mut g = GraphBuilder::new(&mut ex.doc);
            let node = g.add("surface", ValueType::Surfaceshader);
            if g.bind(&node, "edf", ValueType::Edf, &surface).is_err() {
                return None;
            }
            node
        }
        other => {
            warn!(tree = %tree.name, ty = %other, "unrecognized shader output type");
            return None;
        }
    };

    let material = if tree.name.is_empty() {
        ex.doc.add_node("surfacematerial", ValueType::Material)
    } else {
        match ex
            .doc
            .add_node_named(&tree.name, "surfacematerial", ValueType::Material)
        {
            Ok(node) => node.name.clone(),
            Err(_) => ex.doc.add_node("surfacematerial", ValueType::Material),
        }
    };
    let material = Item::Node {
        path: material,
        ty: ValueType::Material,
        output: None,
    };
    let mut g = GraphBuilder::new(&mut ex.doc);
    if g.bind(&material, "surfaceshader", ValueType::Surfaceshader, &shader)
        .is_err()
    {
        return None;
    }
    Some(ex.doc)
}

struct Exporter<'a> {
    tree: &'a ShaderTree,
    session: &'a Session,
    doc: Document,
    memo: HashMap<NodeId, Option<Item>>,
}

impl Exporter<'_> {
    fn export_node(&mut self, id: NodeId) -> Option<Item> {
        if let Some(cached) = self.memo.get(&id) {
            return cached.clone();
        }
        let result = self.export_node_inner(id);
        self.memo.insert(id, result.clone());
        result
    }

    fn export_node_inner(&mut self, id: NodeId) -> Option<Item> {
        let node = self.tree.node(id)?.clone();
        let result = match &node.kind {
            NodeKind::Op(op) => self.export_op(&node, op),
            NodeKind::Definition { class, data_type } => {
                self.export_definition(&node, class, data_type)
            }
        };
        match result {
            Ok(item) => Some(item),
            Err(ExportFailed) => {
                warn!(node = %node.name, "node export failed");
                None
            }
        }
    }

    /// The item feeding a named input: the exported producer over a valid
    /// link, or the socket default. `Ok(None)` means genuinely unset.
    fn item_opt(&mut self, node: &ShaderNode, input: &str) -> Result<Option<Item>, ExportFailed> {
        if let Some(link) = self.tree.valid_link_to(node.id, input) {
            let from_node = link.from_node;
            let from_output = link.from_output.clone();
            let item = self.export_node(from_node).ok_or(ExportFailed)?;
            let producer = self.tree.node(from_node).ok_or(ExportFailed)?;
            return Ok(Some(select_output(item, producer, &from_output)));
        }
        Ok(node
            .input(input)
            .and_then(|s| s.default.clone())
            .map(Item::Literal))
    }

    fn item(&mut self, node: &ShaderNode, input: &str) -> OpResult {
        self.item_opt(node, input)?.ok_or(ExportFailed)
    }

    fn export_op(&mut self, node: &ShaderNode, op: &OpKind) -> OpResult {
        match op {
            OpKind::Value => Ok(Item::Literal(
                node.output("Value")
                    .and_then(|s| s.default.clone())
                    .unwrap_or(SocketValue::Float(0.0)),
            )),
            OpKind::Rgb => Ok(Item::Literal(
                node.output("Color")
                    .and_then(|s| s.default.clone())
                    .unwrap_or(SocketValue::Color3([0.0, 0.0, 0.0])),
            )),
            OpKind::Math { op, clamp } => self.export_math(node, *op, *clamp),
            OpKind::MixColor { mode, clamp } => self.export_mix(node, *mode, *clamp),
            OpKind::Invert => {
                let fac = self.item(node, "Fac")?;
                let color = self.item(node, "Color")?;
                let name = node.name.clone();
                let mut g = GraphBuilder::new(&mut self.doc);
                let inverted = emit(
                    &name,
                    ops::subtract(&mut g, Item::lit(SocketValue::Float(1.0)), color.clone()),
                )?;
                emit(&name, ops::blend(&mut g, fac, color, inverted))
            }
            OpKind::TexImage { image } => self.export_tex_image(node, image.as_ref()),
            OpKind::NormalMap { space } => self.export_normal_map(node, *space),
            OpKind::BsdfDiffuse => self.export_bsdf_diffuse(node),
            OpKind::BsdfPrincipled => self.export_bsdf_principled(node),
            OpKind::Emission => self.export_emission(node),
            OpKind::OutputMaterial { .. } => {
                warn!(node = %node.name, "output node cannot feed another node");
                Err(ExportFailed)
            }
        }
    }

    fn export_math(&mut self, node: &ShaderNode, op: MathOp, clamp: bool) -> OpResult {
        let name = node.name.clone();
        let a = self.item(node, "Value1")?;
        let result = match op.operand_count() {
            1 => {
                let mut g = GraphBuilder::new(&mut self.doc);
                let r = match op {
                    MathOp::Sine => ops::unary(&mut g, "sin", f32::sin, a),
                    MathOp::Cosine => ops::unary(&mut g, "cos", f32::cos, a),
                    MathOp::Tangent => ops::unary(&mut g, "tan", f32::tan, a),
                    MathOp::Arcsine => ops::unary(&mut g, "asin", f32::asin, a),
                    MathOp::Arccosine => ops::unary(&mut g, "acos", f32::acos, a),
                    MathOp::Arctangent => ops::unary(&mut g, "atan", f32::atan, a),
                    MathOp::Logarithm => ops::unary(&mut g, "ln", f32::ln, a),
                    MathOp::Absolute => ops::absolute(&mut g, a),
                    MathOp::Floor => ops::floor(&mut g, a),
                    MathOp::Ceil => ops::unary(&mut g, "ceil", f32::ceil, a),
                    MathOp::Fract => ops::fract(&mut g, a),
                    MathOp::Round => round_expr(&mut g, a),
                    other => Err(EngineError::UnsupportedOperator(format!("{other:?}"))),
                };
                emit(&name, r)?
            }
            2 => {
                let b = self.item(node, "Value2")?;
                let mut g = GraphBuilder::new(&mut self.doc);
                let r = match op {
                    MathOp::Add => ops::add(&mut g, a, b),
                    MathOp::Subtract => ops::subtract(&mut g, a, b),
                    MathOp::Multiply => ops::multiply(&mut g, a, b),
                    MathOp::Divide => ops::divide(&mut g, a, b),
                    MathOp::Power => ops::binary(&mut g, "power", f32::powf, a, b),
                    MathOp::Minimum => ops::minimum(&mut g, a, b),
                    MathOp::Maximum => ops::maximum(&mut g, a, b),
                    other => Err(EngineError::UnsupportedOperator(format!("{other:?}"))),
                };
                emit(&name, r)?
            }
            _ => {
                let b = self.item(node, "Value2")?;
                let c = self.item(node, "Value3")?;
                let mut g = GraphBuilder::new(&mut self.doc);
                let r = ops::multiply(&mut g, a, b).and_then(|m| ops::add(&mut g, m, c));
                emit(&name, r)?
            }
        };
        if clamp {
            let mut g = GraphBuilder::new(&mut self.doc);
            emit(&name, ops::clamp01(&mut g, result))
        } else {
            Ok(result)
        }
    }

    fn export_mix(&mut self, node: &ShaderNode, mode: MixMode, clamp: bool) -> OpResult {
        let fac = self.item(node, "Fac")?;
        let c1 = self.item(node, "Color1")?;
        let c2 = self.item(node, "Color2")?;
        let name = node.name.clone();

        let mode = match mode {
            MixMode::Saturation | MixMode::Hue | MixMode::Burn | MixMode::Overlay => {
                let e = EngineError::UnsupportedSubMode(format!("{mode:?}"));
                warn!(node = %name, error = %e, "exporting as plain mix");
                MixMode::Mix
            }
            other => other,
        };

        let mut g = GraphBuilder::new(&mut self.doc);
        let result = emit(&name, mix_expr(&mut g, mode, fac, c1, c2))?;
        if clamp {
            emit(&name, ops::clamp01(&mut g, result))
        } else {
            Ok(result)
        }
    }

    fn export_tex_image(&mut self, node: &ShaderNode, image: Option<&ImageHandle>) -> OpResult {
        let magenta = Item::lit(SocketValue::Color3(ERROR_COLOR));
        let Some(handle) = image else {
            warn!(node = %node.name, "texture node has no image, using error color");
            return Ok(magenta);
        };
        let path = match self.session.image_cache.resolve(handle) {
            Ok(p) => p,
            Err(e) => {
                warn!(node = %node.name, error = %e, "texture unavailable, using error color");
                return Ok(magenta);
            }
        };
        let uv = self.item_opt(node, "Vector")?;
        let name = node.name.clone();
        let mut g = GraphBuilder::new(&mut self.doc);
        let uv = match uv {
            Some(item) => item,
            None => g.add("texcoord", ValueType::Vector2),
        };
        let image_node = g.add("image", ValueType::Color3);
        let file = Item::lit(SocketValue::String(path.to_string_lossy().into_owned()));
        emit(&name, g.bind(&image_node, "file", ValueType::Filename, &file))?;
        emit(&name, g.bind(&image_node, "texcoord", ValueType::Vector2, &uv))?;
        Ok(image_node)
    }

    fn export_normal_map(&mut self, node: &ShaderNode, space: NormalSpace) -> OpResult {
        let strength = self.item(node, "Strength")?;
        let color = self.item(node, "Color")?;
        let name = node.name.clone();
        let space = match space {
            NormalSpace::Tangent => {
                warn!(node = %name, "explicit UV map selection is not honored in tangent space");
                "tangent"
            }
            NormalSpace::Object => "object",
            NormalSpace::LegacyObject => {
                warn!(node = %name, "legacy object space treated as object space");
                "object"
            }
            NormalSpace::World | NormalSpace::LegacyWorld => {
                warn!(node = %name, "world space normals are not supported, using object space");
                "object"
            }
        };
        let mut g = GraphBuilder::new(&mut self.doc);
        let nm = g.add("normalmap", ValueType::Vector3);
        emit(&name, g.bind(&nm, "in", ValueType::Vector3, &color))?;
        emit(&name, g.bind(&nm, "scale", ValueType::Float, &strength))?;
        let space = Item::lit(SocketValue::String(space.to_string()));
        emit(&name, g.bind(&nm, "space", ValueType::String, &space))?;
        Ok(nm)
    }

    fn export_bsdf_diffuse(&mut self, node: &ShaderNode) -> OpResult {
        let color = self.item(node, "Color")?;
        let roughness = self.item(node, "Roughness")?;
        let normal = self.item_opt(node, "Normal")?;
        let name = node.name.clone();
        let mut g = GraphBuilder::new(&mut self.doc);
        let bsdf = g.add("oren_nayar_diffuse_bsdf", ValueType::Bsdf);
        emit(&name, g.bind(&bsdf, "color", ValueType::Color3, &color))?;
        emit(&name, g.bind(&bsdf, "roughness", ValueType::Float, &roughness))?;
        if let Some(normal) = normal {
            emit(&name, g.bind(&bsdf, "normal", ValueType::Vector3, &normal))?;
        }
        Ok(bsdf)
    }

    fn export_bsdf_principled(&mut self, node: &ShaderNode) -> OpResult {
        let base_color = self.item(node, "Base Color")?;
        let metallic = self.item(node, "Metallic")?;
        let roughness = self.item(node, "Roughness")?;
        let alpha = self.item(node, "Alpha")?;
        let emission_color = self.item(node, "Emission Color")?;
        let emission_strength = self.item(node, "Emission Strength")?;
        let normal = self.item_opt(node, "Normal")?;
        let name = node.name.clone();

        let mut g = GraphBuilder::new(&mut self.doc);
        let shader = g.add("standard_surface", ValueType::Surfaceshader);
        emit(&name, g.bind(&shader, "base_color", ValueType::Color3, &base_color))?;
        emit(&name, g.bind(&shader, "metalness", ValueType::Float, &metallic))?;
        emit(
            &name,
            g.bind(&shader, "specular_roughness", ValueType::Float, &roughness),
        )?;
        emit(
            &name,
            g.bind(&shader, "emission", ValueType::Float, &emission_strength),
        )?;
        emit(
            &name,
            g.bind(&shader, "emission_color", ValueType::Color3, &emission_color),
        )?;
        match &alpha {
            Item::Literal(SocketValue::Float(a)) if *a != 1.0 => {
                emit(&name, g.bind(&shader, "opacity", ValueType::Color3, &alpha))?;
            }
            Item::Literal(_) => {}
            Item::Node { .. } => {
                warn!(node = %name, "connected alpha is not supported, ignoring");
            }
        }
        if let Some(normal) = normal {
            emit(&name, g.bind(&shader, "normal", ValueType::Vector3, &normal))?;
        }
        Ok(shader)
    }

    fn export_emission(&mut self, node: &ShaderNode) -> OpResult {
        let color = self.item(node, "Color")?;
        let strength = self.item(node, "Strength")?;
        let name = node.name.clone();
        let mut g = GraphBuilder::new(&mut self.doc);
        let color = emit(&name, ops::multiply(&mut g, color, strength))?;
        let edf = g.add("uniform_edf", ValueType::Edf);
        emit(&name, g.bind(&edf, "color", ValueType::Color3, &color))?;
        Ok(edf)
    }

    fn export_definition(&mut self, node: &ShaderNode, class: &str, data_type: &str) -> OpResult {
        let Some(def) = self.session.registry.variant_def(class, data_type).cloned() else {
            warn!(node = %node.name, class, data_type, "unknown definition variant");
            return Err(ExportFailed);
        };

        let mut bound = Vec::new();
        for def_input in &def.inputs {
            if def_input.uniform {
                if let Some(value) = node.params.get(&def_input.name) {
                    bound.push((def_input.name.clone(), def_input.ty, Item::lit(value.clone())));
                }
                continue;
            }
            if let Some(item) = self.item_opt(node, &def_input.name)? {
                bound.push((def_input.name.clone(), def_input.ty, item));
            }
        }

        let name = node.name.clone();
        let mut g = GraphBuilder::new(&mut self.doc);
        let out = g.add(&def.category, def.ty);
        for (input, ty, item) in &bound {
            emit(&name, g.bind(&out, input, *ty, item))?;
        }
        Ok(out)
    }
}

/// Rewrap a multi-output producer handle for one selected output.
fn select_output(item: Item, producer: &ShaderNode, from_output: &str) -> Item {
    match item {
        Item::Node {
            path,
            ty: ValueType::Multioutput,
            ..
        } => {
            let ty = producer
                .output(from_output)
                .map(|s| s.ty)
                .unwrap_or(ValueType::Multioutput);
            Item::Node {
                path,
                ty,
                output: Some(from_output.to_string()),
            }
        }
        other => other,
    }
}

/// Round to nearest with halves rounding up, composed from floor and a
/// threshold select on the fractional part.
fn round_expr(g: &mut GraphBuilder, a: Item) -> Result<Item, EngineError> {
    let floored = ops::floor(g, a.clone())?;
    let frac = ops::fract(g, a)?;
    let up = ops::add(g, floored.clone(), Item::lit(SocketValue::Float(1.0)))?;
    ops::ifgreatereq(g, frac, Item::lit(SocketValue::Float(0.5)), up, floored)
}

/// Build one mix sub-mode expression. Factor zero always yields the base
/// color unchanged.
fn mix_expr(
    g: &mut GraphBuilder,
    mode: MixMode,
    fac: Item,
    c1: Item,
    c2: Item,
) -> Result<Item, EngineError> {
    let one = Item::lit(SocketValue::Float(1.0));
    match mode {
        MixMode::Mix | MixMode::Saturation | MixMode::Hue | MixMode::Burn | MixMode::Overlay => {
            ops::blend(g, fac, c1, c2)
        }
        MixMode::Add => {
            let s = ops::add(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, s)
        }
        MixMode::Multiply => {
            let s = ops::multiply(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, s)
        }
        MixMode::Subtract => {
            let s = ops::subtract(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, s)
        }
        MixMode::Divide => {
            let s = ops::divide(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, s)
        }
        MixMode::Difference => {
            let d = ops::subtract(g, c1.clone(), c2)?;
            let d = ops::absolute(g, d)?;
            ops::blend(g, fac, c1, d)
        }
        MixMode::Darken => {
            let m = ops::minimum(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, m)
        }
        MixMode::Lighten => {
            let m = ops::maximum(g, c1.clone(), c2)?;
            ops::blend(g, fac, c1, m)
        }
        MixMode::Value => Ok(c1),
        MixMode::Screen => {
            // 1 - (1 - fac*c2) * (1 - c1)
            let fc2 = ops::multiply(g, c2, fac)?;
            let lhs = ops::subtract(g, one.clone(), fc2)?;
            let rhs = ops::subtract(g, one.clone(), c1)?;
            let m = ops::multiply(g, lhs, rhs)?;
            ops::subtract(g, one, m)
        }
        MixMode::SoftLight => {
            let inv1 = ops::subtract(g, one.clone(), c1.clone())?;
            let inv2 = ops::subtract(g, one.clone(), c2.clone())?;
            let scr_m = ops::multiply(g, inv1.clone(), inv2)?;
            let scr = ops::subtract(g, one, scr_m)?;
            let c1c2 = ops::multiply(g, c1.clone(), c2)?;
            let lo = ops::multiply(g, inv1, c1c2)?;
            let hi = ops::multiply(g, c1.clone(), scr)?;
            let soft = ops::add(g, lo, hi)?;
            ops::blend(g, fac, c1, soft)
        }
        MixMode::LinearLight => {
            let doubled = ops::multiply(g, c2, Item::lit(SocketValue::Float(2.0)))?;
            let shifted = ops::subtract(g, doubled, one)?;
            let lin = ops::add(g, c1.clone(), shifted)?;
            ops::blend(g, fac, c1, lin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::VALUE_GRAPH;
    use matbridge_document::InputBinding;

    fn session() -> (tempfile::TempDir, Session) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let dir = tempfile::tempdir().unwrap();
        let session = Session::with_cache_dir(dir.path().join("cache")).unwrap();
        (dir, session)
    }

    fn output_node() -> ShaderNode {
        ShaderNode::op(OpKind::OutputMaterial { active: true })
    }

    #[test]
    fn test_export_principled_material() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("mat");
        let bsdf = tree.add_node(
            ShaderNode::op(OpKind::BsdfPrincipled)
                .with_input_default("Base Color", SocketValue::Color3([0.1, 0.2, 0.3])),
        );
        let out = tree.add_node(output_node());
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

        let doc = export_tree(&tree, &session).unwrap();
        let shader = doc.node_of_category("standard_surface").unwrap();
        assert_eq!(
            shader.input("base_color").unwrap().binding,
            InputBinding::Value("0.1, 0.2, 0.3".to_string())
        );
        let material = doc.nodes.get("mat").unwrap();
        assert_eq!(material.category, "surfacematerial");
        assert!(matches!(
            &material.input("surfaceshader").unwrap().binding,
            InputBinding::Node { node, .. } if *node == shader.name
        ));
        // all inputs were literal, so no value nodegraph was created
        assert!(doc.nodegraphs.is_empty());
    }

    #[test]
    fn test_export_without_output_node() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("mat");
        tree.add_node(ShaderNode::op(OpKind::BsdfPrincipled));
        assert!(export_tree(&tree, &session).is_none());
    }

    #[test]
    fn test_export_rejects_inactive_output() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("mat");
        let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfPrincipled));
        let out = tree.add_node(ShaderNode::op(OpKind::OutputMaterial { active: false }));
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();
        // connected but inactive: not an export root
        assert!(export_tree(&tree, &session).is_none());
    }

    #[test]
    fn test_export_skips_unconnected_active_output() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("mat");
        tree.add_node(output_node());
        let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfPrincipled));
        let out = tree.add_node(output_node());
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

        // the dangling active output does not shadow the connected one
        let doc = export_tree(&tree, &session).unwrap();
        assert!(doc.node_of_category("standard_surface").is_some());
    }

    #[test]
    fn test_export_emission_wrapped_in_surface() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("glow");
        let emission = tree.add_node(
            ShaderNode::op(OpKind::Emission)
                .with_input_default("Strength", SocketValue::Float(2.0)),
        );
        let out = tree.add_node(output_node());
        tree.connect(emission, "Emission", out, "Surface").unwrap();

        let doc = export_tree(&tree, &session).unwrap();
        let edf = doc.node_of_category("uniform_edf").unwrap();
        // color * strength folded into one literal
        assert_eq!(
            edf.input("color").unwrap().binding,
            InputBinding::Value("2.0, 2.0, 2.0".to_string())
        );
        let surface = doc.node_of_category("surface").unwrap();
        assert!(matches!(
            &surface.input("edf").unwrap().binding,
            InputBinding::Node { node, .. } if *node == edf.name
        ));
    }

    #[test]
    fn test_export_shared_texture_emits_once() {
        let (dir, session) = session();
        let tex_path = dir.path().join("wood.png");
        std::fs::write(&tex_path, b"png bytes").unwrap();

        let mut tree = ShaderTree::new("mat");
        let tex = tree.add_node(ShaderNode::op(OpKind::TexImage {
            image: Some(ImageHandle::from_file(&tex_path)),
        }));
        let mix = tree.add_node(ShaderNode::op(OpKind::MixColor {
            mode: MixMode::Mix,
            clamp: false,
        }));
        let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfDiffuse));
        let out = tree.add_node(output_node());
        tree.connect(tex, "Color", mix, "Color1").unwrap();
        tree.connect(tex, "Color", mix, "Color2").unwrap();
        tree.connect(mix, "Color", bsdf, "Color").unwrap();
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

        let doc = export_tree(&tree, &session).unwrap();
        let ng = doc.nodegraph(VALUE_GRAPH).unwrap();
        let images: Vec<_> = ng.nodes.values().filter(|n| n.category == "image").collect();
        assert_eq!(images.len(), 1);
        // texcoord is synthesized for the image lookup
        assert!(ng.nodes.values().any(|n| n.category == "texcoord"));
    }

    #[test]
    fn test_export_skips_invalid_links() {
        let (dir, session) = session();
        let tex_path = dir.path().join("mask.png");
        std::fs::write(&tex_path, b"png bytes").unwrap();

        let mut tree = ShaderTree::new("mat");
        let tex = tree.add_node(ShaderNode::op(OpKind::TexImage {
            image: Some(ImageHandle::from_file(&tex_path)),
        }));
        let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfDiffuse));
        let out = tree.add_node(output_node());
        // color3 into a float input: link is created but invalid
        tree.connect(tex, "Color", bsdf, "Roughness").unwrap();
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

        let doc = export_tree(&tree, &session).unwrap();
        // the invalid link is not traversed, so the texture never exports
        assert!(doc.nodegraph(VALUE_GRAPH).is_none());
        let shader = doc.node_of_category("oren_nayar_diffuse_bsdf").unwrap();
        assert_eq!(
            shader.input("roughness").unwrap().binding,
            InputBinding::Value("0.0".to_string())
        );
    }

    #[test]
    fn test_export_missing_texture_uses_error_color() {
        let (_dir, session) = session();
        let mut tree = ShaderTree::new("mat");
        let tex = tree.add_node(ShaderNode::op(OpKind::TexImage { image: None }));
        let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfDiffuse));
        let out = tree.add_node(output_node());
        tree.connect(tex, "Color", bsdf, "Color").unwrap();
        tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

        let doc = export_tree(&tree, &session).unwrap();
        let shader = doc.node_of_category("oren_nayar_diffuse_bsdf").unwrap();
        assert_eq!(
            shader.input("color").unwrap().binding,
            InputBinding::Value("1.0, 0.0, 1.0".to_string())
        );
    }

    #[test]
    fn test_mix_modes_keep_base_at_zero_factor() {
        use MixMode::*;
        let c1 = SocketValue::Color3([0.3, 0.5, 0.2]);
        let c2 = SocketValue::Color3([0.8, 0.1, 0.9]);
        for mode in [
            Mix, Add, Multiply, Subtract, Divide, Difference, Darken, Lighten, Value, Screen,
            SoftLight, LinearLight,
        ] {
            let mut doc = Document::new();
            let mut g = GraphBuilder::new(&mut doc);
            let out = mix_expr(
                &mut g,
                mode,
                Item::lit(SocketValue::Float(0.0)),
                Item::lit(c1.clone()),
                Item::lit(c2.clone()),
            )
            .unwrap();
            let Item::Literal(SocketValue::Color3(r)) = out else {
                panic!("mode {mode:?} did not fold to a color");
            };
            for (got, want) in r.iter().zip([0.3, 0.5, 0.2]) {
                assert!((got - want).abs() < 1e-6, "mode {mode:?}: {r:?}");
            }
        }
    }

    #[test]
    fn test_mix_modes_blend_at_full_factor() {
        let cases = [
            (MixMode::Multiply, [0.24, 0.05, 0.18]),
            (MixMode::Darken, [0.3, 0.1, 0.2]),
            (MixMode::Lighten, [0.8, 0.5, 0.9]),
            (MixMode::Difference, [0.5, 0.4, 0.7]),
        ];
        for (mode, want) in cases {
            let mut doc = Document::new();
            let mut g = GraphBuilder::new(&mut doc);
            let out = mix_expr(
                &mut g,
                mode,
                Item::lit(SocketValue::Float(1.0)),
                Item::lit(SocketValue::Color3([0.3, 0.5, 0.2])),
                Item::lit(SocketValue::Color3([0.8, 0.1, 0.9])),
            )
            .unwrap();
            let Item::Literal(SocketValue::Color3(r)) = out else {
                panic!("mode {mode:?} did not fold to a color");
            };
            for (got, want) in r.iter().zip(want) {
                assert!((got - want).abs() < 1e-6, "mode {mode:?}: {r:?}");
            }
        }
    }

    #[test]
    fn test_export_normal_map_space() {
        let (_dir, session) = session();
        for (space, expect) in [
            (NormalSpace::Tangent, "tangent"),
            (NormalSpace::Object, "object"),
            (NormalSpace::World, "object"),
        ] {
            let mut tree = ShaderTree::new("mat");
            let nm = tree.add_node(ShaderNode::op(OpKind::NormalMap { space }));
            let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfDiffuse));
            let out = tree.add_node(output_node());
            tree.connect(nm, "Normal", bsdf, "Normal").unwrap();
            tree.connect(bsdf, "BSDF", out, "Surface").unwrap();

            let doc = export_tree(&tree, &session).unwrap();
            let ng = doc.nodegraph(VALUE_GRAPH).unwrap();
            let node = ng.nodes.values().find(|n| n.category == "normalmap").unwrap();
            assert_eq!(
                node.input("space").unwrap().binding,
                InputBinding::Value(expect.to_string()),
                "{space:?}"
            );
        }
    }

    #[test]
    fn test_unmapped_mix_modes_export_as_plain_mix() {
        let (_dir, session) = session();
        let build = |mode| {
            let mut tree = ShaderTree::new("mat");
            let mix = tree.add_node(
                ShaderNode::op(OpKind::MixColor { mode, clamp: false })
                    .with_input_default("Fac", SocketValue::Float(1.0))
                    .with_input_default("Color1", SocketValue::Color3([0.1, 0.2, 0.3]))
                    .with_input_default("Color2", SocketValue::Color3([0.9, 0.8, 0.7])),
            );
            let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfDiffuse));
            let out = tree.add_node(output_node());
            tree.connect(mix, "Color", bsdf, "Color").unwrap();
            tree.connect(bsdf, "BSDF", out, "Surface").unwrap();
            export_tree(&tree, &session).unwrap().write_to_xml_string()
        };
        let plain = build(MixMode::Mix);
        for mode in [MixMode::Saturation, MixMode::Hue, MixMode::Burn, MixMode::Overlay] {
            assert_eq!(build(mode), plain, "{mode:?}");
        }
    }

    #[test]
    fn test_export_is_deterministic() {
        let (dir, session) = session();
        let tex_path = dir.path().join("wood.png");
        std::fs::write(&tex_path, b"png bytes").unwrap();

        let build = || {
            let mut tree = ShaderTree::new("mat");
            let tex = tree.add_node(ShaderNode::op(OpKind::TexImage {
                image: Some(ImageHandle::from_file(&tex_path)),
            }));
            let bsdf = tree.add_node(ShaderNode::op(OpKind::BsdfPrincipled));
            let out = tree.add_node(output_node());
            tree.connect(tex, "Color", bsdf, "Base Color").unwrap();
            tree.connect(bsdf, "BSDF", out, "Surface").unwrap();
            tree
        };
        let a = export_tree(&build(), &session).unwrap().write_to_xml_string();
        let b = export_tree(&build(), &session).unwrap().write_to_xml_string();
        assert_eq!(a, b);
    }
}
