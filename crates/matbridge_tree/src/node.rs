// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the shader tree.

use crate::socket::{ImageHandle, Socket, SocketValue};
use indexmap::IndexMap;
use matbridge_document::ValueType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Math operator variants, split by operand count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOp {
    /// sin(x)
    Sine,
    /// cos(x)
    Cosine,
    /// tan(x)
    Tangent,
    /// asin(x)
    Arcsine,
    /// acos(x)
    Arccosine,
    /// atan(x)
    Arctangent,
    /// ln(x)
    Logarithm,
    /// |x|
    Absolute,
    /// floor(x)
    Floor,
    /// x mod 1
    Fract,
    /// ceil(x)
    Ceil,
    /// round to nearest, halves up
    Round,
    /// a + b
    Add,
    /// a - b
    Subtract,
    /// a * b
    Multiply,
    /// a / b
    Divide,
    /// a ^ b
    Power,
    /// min(a, b)
    Minimum,
    /// max(a, b)
    Maximum,
    /// a * b + c
    MultiplyAdd,
}

impl MathOp {
    /// Number of operands this operator consumes.
    pub fn operand_count(&self) -> usize {
        match self {
            Self::Sine
            | Self::Cosine
            | Self::Tangent
            | Self::Arcsine
            | Self::Arccosine
            | Self::Arctangent
            | Self::Logarithm
            | Self::Absolute
            | Self::Floor
            | Self::Fract
            | Self::Ceil
            | Self::Round => 1,
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Power
            | Self::Minimum
            | Self::Maximum => 2,
            Self::MultiplyAdd => 3,
        }
    }
}

/// Color-mix blending sub-modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixMode {
    /// Plain factor blend
    Mix,
    /// color1 + color2
    Add,
    /// color1 * color2
    Multiply,
    /// color1 - color2
    Subtract,
    /// color1 / color2
    Divide,
    /// |color1 - color2|
    Difference,
    /// min(color1, color2)
    Darken,
    /// max(color1, color2)
    Lighten,
    /// color1 passes through unchanged
    Value,
    /// Screen blend
    Screen,
    /// Soft light blend
    SoftLight,
    /// Linear light blend
    LinearLight,
    /// Not mapped; falls back to plain mix
    Saturation,
    /// Not mapped; falls back to plain mix
    Hue,
    /// Not mapped; falls back to plain mix
    Burn,
    /// Not mapped; falls back to plain mix
    Overlay,
}

/// Normal map space selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalSpace {
    /// Tangent space
    Tangent,
    /// Object space
    Object,
    /// World space (unsupported at export)
    World,
    /// Legacy object space (unsupported at export)
    LegacyObject,
    /// Legacy world space (unsupported at export)
    LegacyWorld,
}

/// Procedural operator kinds, a closed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    /// Constant float
    Value,
    /// Constant color
    Rgb,
    /// Math operator
    Math {
        /// Operator variant
        op: MathOp,
        /// Clamp result to [0, 1]
        clamp: bool,
    },
    /// Color mix operator
    MixColor {
        /// Blending sub-mode
        mode: MixMode,
        /// Clamp result to [0, 1]
        clamp: bool,
    },
    /// Color inversion
    Invert,
    /// Image texture lookup
    TexImage {
        /// Bound image resource
        image: Option<ImageHandle>,
    },
    /// Normal map
    NormalMap {
        /// Space selector
        space: NormalSpace,
    },
    /// Diffuse BSDF
    BsdfDiffuse,
    /// Principled BSDF
    BsdfPrincipled,
    /// Emission shader
    Emission,
    /// Material output
    OutputMaterial {
        /// Whether this output node is the authoritative one
        active: bool,
    },
}

impl OpKind {
    /// Operator tag used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Rgb => "rgb",
            Self::Math { .. } => "math",
            Self::MixColor { .. } => "mix_color",
            Self::Invert => "invert",
            Self::TexImage { .. } => "tex_image",
            Self::NormalMap { .. } => "normal_map",
            Self::BsdfDiffuse => "bsdf_diffuse",
            Self::BsdfPrincipled => "bsdf_principled",
            Self::Emission => "emission",
            Self::OutputMaterial { .. } => "output_material",
        }
    }
}

/// What a tree node is: a procedural operator or an editable node bound
/// to a document node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Procedural host operator
    Op(OpKind),
    /// Editable node bound to a definition variant
    Definition {
        /// Editable class id, e.g. "MxNode_STD_add"
        class: String,
        /// Selected data-type variant, e.g. "color3"
        data_type: String,
    },
}

/// A node instance in the shader tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderNode {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name; import uses the document node path
    pub name: String,
    /// Operator or definition binding
    pub kind: NodeKind,
    /// Input sockets
    pub inputs: Vec<Socket>,
    /// Output sockets
    pub outputs: Vec<Socket>,
    /// Uniform literal parameters (never connected)
    pub params: IndexMap<String, SocketValue>,
    /// Position in the editor canvas
    pub position: [f32; 2],
}

impl ShaderNode {
    /// Create a procedural operator node with its standard socket layout.
    pub fn op(kind: OpKind) -> Self {
        let (inputs, outputs) = op_sockets(&kind);
        Self {
            id: NodeId::new(),
            name: kind.tag().to_string(),
            kind: NodeKind::Op(kind),
            inputs,
            outputs,
            params: IndexMap::new(),
            position: [0.0, 0.0],
        }
    }

    /// Create an editable node bound to a definition variant.
    pub fn definition(
        class: impl Into<String>,
        data_type: impl Into<String>,
        inputs: Vec<Socket>,
        outputs: Vec<Socket>,
    ) -> Self {
        let class = class.into();
        Self {
            id: NodeId::new(),
            name: class.clone(),
            kind: NodeKind::Definition {
                class,
                data_type: data_type.into(),
            },
            inputs,
            outputs,
            params: IndexMap::new(),
            position: [0.0, 0.0],
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set an input socket's default value, by name.
    pub fn with_input_default(mut self, name: &str, value: SocketValue) -> Self {
        if let Some(s) = self.inputs.iter_mut().find(|s| s.name == name) {
            s.default = Some(value);
        }
        self
    }

    /// Set an output socket's default value, by name (constant nodes).
    pub fn with_output_default(mut self, name: &str, value: SocketValue) -> Self {
        if let Some(s) = self.outputs.iter_mut().find(|s| s.name == name) {
            s.default = Some(value);
        }
        self
    }

    /// Get an input socket by name.
    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Get an output socket by name.
    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }

    /// Get the procedural operator kind, when this is a procedural node.
    pub fn op_kind(&self) -> Option<&OpKind> {
        match &self.kind {
            NodeKind::Op(op) => Some(op),
            NodeKind::Definition { .. } => None,
        }
    }
}

/// Standard socket layouts for procedural operators.
fn op_sockets(kind: &OpKind) -> (Vec<Socket>, Vec<Socket>) {
    use ValueType as T;
    let shader = T::Surfaceshader;
    match kind {
        OpKind::Value => (
            vec![],
            vec![Socket::new("Value", T::Float).with_default(SocketValue::Float(0.0))],
        ),
        OpKind::Rgb => (
            vec![],
            vec![Socket::new("Color", T::Color3)
                .with_default(SocketValue::Color3([0.5, 0.5, 0.5]))],
        ),
        OpKind::Math { .. } => (
            vec![
                Socket::new("Value1", T::Float).with_default(SocketValue::Float(0.5)),
                Socket::new("Value2", T::Float).with_default(SocketValue::Float(0.5)),
                Socket::new("Value3", T::Float).with_default(SocketValue::Float(0.0)),
            ],
            vec![Socket::new("Value", T::Float)],
        ),
        OpKind::MixColor { .. } => (
            vec![
                Socket::new("Fac", T::Float).with_default(SocketValue::Float(0.5)),
                Socket::new("Color1", T::Color3)
                    .with_default(SocketValue::Color3([0.5, 0.5, 0.5])),
                Socket::new("Color2", T::Color3)
                    .with_default(SocketValue::Color3([0.5, 0.5, 0.5])),
            ],
            vec![Socket::new("Color", T::Color3)],
        ),
        OpKind::Invert => (
            vec![
                Socket::new("Fac", T::Float).with_default(SocketValue::Float(1.0)),
                Socket::new("Color", T::Color3)
                    .with_default(SocketValue::Color3([0.0, 0.0, 0.0])),
            ],
            vec![Socket::new("Color", T::Color3)],
        ),
        OpKind::TexImage { .. } => (
            vec![Socket::new("Vector", T::Vector2)],
            vec![
                Socket::new("Color", T::Color3),
                Socket::new("Alpha", T::Float),
            ],
        ),
        OpKind::NormalMap { .. } => (
            vec![
                Socket::new("Strength", T::Float).with_default(SocketValue::Float(1.0)),
                Socket::new("Color", T::Color3)
                    .with_default(SocketValue::Color3([0.5, 0.5, 1.0])),
            ],
            vec![Socket::new("Normal", T::Vector3)],
        ),
        OpKind::BsdfDiffuse => (
            vec![
                Socket::new("Color", T::Color3)
                    .with_default(SocketValue::Color3([0.8, 0.8, 0.8])),
                Socket::new("Roughness", T::Float).with_default(SocketValue::Float(0.0)),
                Socket::new("Normal", T::Vector3),
            ],
            vec![Socket::new("BSDF", shader)],
        ),
        OpKind::BsdfPrincipled => (
            vec![
                Socket::new("Base Color", T::Color3)
                    .with_default(SocketValue::Color3([0.8, 0.8, 0.8])),
                Socket::new("Metallic", T::Float).with_default(SocketValue::Float(0.0)),
                Socket::new("Roughness", T::Float).with_default(SocketValue::Float(0.5)),
                Socket::new("Alpha", T::Float).with_default(SocketValue::Float(1.0)),
                Socket::new("Emission Color", T::Color3)
                    .with_default(SocketValue::Color3([0.0, 0.0, 0.0])),
                Socket::new("Emission Strength", T::Float).with_default(SocketValue::Float(0.0)),
                Socket::new("Normal", T::Vector3),
            ],
            vec![Socket::new("BSDF", shader)],
        ),
        OpKind::Emission => (
            vec![
                Socket::new("Color", T::Color3)
                    .with_default(SocketValue::Color3([1.0, 1.0, 1.0])),
                Socket::new("Strength", T::Float).with_default(SocketValue::Float(1.0)),
            ],
            vec![Socket::new("Emission", shader)],
        ),
        OpKind::OutputMaterial { .. } => (vec![Socket::new("Surface", shader)], vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_counts() {
        assert_eq!(MathOp::Sine.operand_count(), 1);
        assert_eq!(MathOp::Power.operand_count(), 2);
        assert_eq!(MathOp::MultiplyAdd.operand_count(), 3);
    }

    #[test]
    fn test_op_socket_layouts() {
        let math = ShaderNode::op(OpKind::Math {
            op: MathOp::Add,
            clamp: false,
        });
        assert_eq!(math.inputs.len(), 3);
        assert!(math.input("Value1").is_some());
        assert!(math.output("Value").is_some());

        let out = ShaderNode::op(OpKind::OutputMaterial { active: true });
        assert!(out.input("Surface").is_some());
        assert!(out.outputs.is_empty());
    }

    #[test]
    fn test_output_default() {
        let rgb = ShaderNode::op(OpKind::Rgb)
            .with_output_default("Color", SocketValue::Color3([1.0, 0.0, 0.0]));
        assert_eq!(
            rgb.output("Color").unwrap().default,
            Some(SocketValue::Color3([1.0, 0.0, 0.0]))
        );
    }
}
