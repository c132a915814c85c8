// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document elements: nodes, nodegraphs, node definitions and legacy
//! material declarations.

use crate::types::ValueType;
use indexmap::IndexMap;

/// How a named input gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum InputBinding {
    /// Literal value in serialized form
    Value(String),
    /// Output of another node in the same container
    Node {
        /// Producer node name
        node: String,
        /// Producer output name, required when the producer is multi-output
        output: Option<String>,
    },
    /// Named output of a nodegraph
    Graph {
        /// Producing nodegraph name
        nodegraph: String,
        /// Output name on that nodegraph
        output: String,
    },
}

/// A typed input slot on a document node.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    /// Declared type
    pub ty: ValueType,
    /// Value or connection
    pub binding: InputBinding,
}

/// A node entry in a document or nodegraph.
#[derive(Debug, Clone, PartialEq)]
pub struct DocNode {
    /// Name, unique within the owning container
    pub name: String,
    /// Operator category, e.g. "add", "image", "surfacematerial"
    pub category: String,
    /// Declared output type
    pub ty: ValueType,
    /// Named inputs in declaration order
    pub inputs: IndexMap<String, Input>,
}

impl DocNode {
    /// Create a node with no inputs.
    pub fn new(name: impl Into<String>, category: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            ty,
            inputs: IndexMap::new(),
        }
    }

    /// Bind an input to a literal value.
    pub fn set_value_input(&mut self, name: impl Into<String>, ty: ValueType, value: impl Into<String>) {
        self.inputs.insert(
            name.into(),
            Input {
                ty,
                binding: InputBinding::Value(value.into()),
            },
        );
    }

    /// Bind an input to another node's output in the same container.
    pub fn set_node_input(
        &mut self,
        name: impl Into<String>,
        ty: ValueType,
        node: impl Into<String>,
        output: Option<String>,
    ) {
        self.inputs.insert(
            name.into(),
            Input {
                ty,
                binding: InputBinding::Node {
                    node: node.into(),
                    output,
                },
            },
        );
    }

    /// Bind an input to a named nodegraph output.
    pub fn set_graph_input(
        &mut self,
        name: impl Into<String>,
        ty: ValueType,
        nodegraph: impl Into<String>,
        output: impl Into<String>,
    ) {
        self.inputs.insert(
            name.into(),
            Input {
                ty,
                binding: InputBinding::Graph {
                    nodegraph: nodegraph.into(),
                    output: output.into(),
                },
            },
        );
    }

    /// Get an input by name.
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }
}

/// A declared output of a nodegraph, referencing one interior node.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutput {
    /// Output name
    pub name: String,
    /// Output type
    pub ty: ValueType,
    /// Interior node producing this output
    pub node: String,
    /// Named output on the interior node when it is multi-output
    pub output: Option<String>,
}

/// A named subgraph: a container of nodes plus declared outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeGraph {
    /// Graph name, unique within the document
    pub name: String,
    /// Relative path prefix applied to filename values inside this graph
    pub fileprefix: String,
    /// Name of the node definition this graph implements, if any
    pub nodedef: Option<String>,
    /// Interior nodes
    pub nodes: IndexMap<String, DocNode>,
    /// Declared outputs
    pub outputs: IndexMap<String, GraphOutput>,
}

impl NodeGraph {
    /// Create an empty nodegraph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a node with a generated category-based name, returning the name.
    pub fn add_node(&mut self, category: &str, ty: ValueType) -> String {
        let name = crate::document::unique_name(&self.nodes, category);
        self.nodes
            .insert(name.clone(), DocNode::new(name.clone(), category, ty));
        name
    }

    /// Get an interior node by name.
    pub fn node(&self, name: &str) -> Option<&DocNode> {
        self.nodes.get(name)
    }

    /// Get a mutable interior node by name.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut DocNode> {
        self.nodes.get_mut(name)
    }

    /// Get a declared output by name, or the first one when `name` is None.
    pub fn output(&self, name: Option<&str>) -> Option<&GraphOutput> {
        match name {
            Some(n) => self.outputs.get(n),
            None => self.outputs.values().next(),
        }
    }

    /// Declare an output referencing an interior node.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        ty: ValueType,
        node: impl Into<String>,
        output: Option<String>,
    ) -> &GraphOutput {
        let name = name.into();
        self.outputs.insert(
            name.clone(),
            GraphOutput {
                name: name.clone(),
                ty,
                node: node.into(),
                output,
            },
        );
        &self.outputs[&name]
    }
}

/// A typed input slot declared by a node definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DefInput {
    /// Input name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Uniform inputs must be literal parameters, never graph connections
    pub uniform: bool,
    /// Serialized default value
    pub default: Option<String>,
}

/// A typed output declared by a node definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DefOutput {
    /// Output name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
}

/// A declared operator signature.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    /// Definition name, e.g. "ND_add_color3"
    pub name: String,
    /// Operator category this definition implements
    pub category: String,
    /// Declared type; `Multioutput` when several outputs exist
    pub ty: ValueType,
    /// Ordered inputs
    pub inputs: Vec<DefInput>,
    /// Ordered outputs
    pub outputs: Vec<DefOutput>,
}

impl NodeDef {
    /// Get a declared input by name.
    pub fn input(&self, name: &str) -> Option<&DefInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Get a declared output by name, or the first one when `name` is None.
    pub fn output(&self, name: Option<&str>) -> Option<&DefOutput> {
        match name {
            Some(n) => self.outputs.iter().find(|o| o.name == n),
            None => self.outputs.first(),
        }
    }
}

/// An input bound on a legacy shader reference.
#[derive(Debug, Clone, PartialEq)]
pub struct BindInput {
    /// Input name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Literal value, when bound directly
    pub value: Option<String>,
    /// Producing nodegraph, when bound to a graph output
    pub nodegraph: Option<String>,
    /// Output name on the producing nodegraph
    pub output: Option<String>,
}

/// Legacy shader-reference object inside a material declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderRef {
    /// Reference name
    pub name: String,
    /// Shader operator category
    pub category: String,
    /// Bound inputs
    pub inputs: Vec<BindInput>,
}

/// Legacy material declaration (shader-reference encoding).
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMaterial {
    /// Material name
    pub name: String,
    /// Shader references, usually exactly one
    pub shader_refs: Vec<ShaderRef>,
}
