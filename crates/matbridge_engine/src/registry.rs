// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editable node class registry, derived from the bundled definition
//! library.
//!
//! Every definition category yields one node class whose variants are the
//! definitions sharing that category. A document node resolves to a
//! variant by signature-subset matching: the node's signature (its typed
//! inputs plus its output token) must be a subset of the definition's.

use crate::error::EngineError;
use indexmap::IndexMap;
use matbridge_document::{DocNode, Document, NodeDef, ValueType};
use std::collections::BTreeSet;

/// Class id prefix for definitions from the bundled library.
const STD_CLASS_PREFIX: &str = "MxNode_STD_";

/// Bundled definition library, parsed once per registry.
pub const STD_LIBRARY: &str = include_str!("../libraries/std_defs.mtlx");

/// File name the bundled library is written under when references are
/// copied next to an exported document.
pub const STD_LIBRARY_FILE: &str = "std_defs.mtlx";

/// One definition variant of a node class.
#[derive(Debug, Clone)]
pub struct DefVariant {
    /// Definition name, e.g. "ND_add_color3"
    pub nodedef: String,
    /// Data-type suffix distinguishing this variant, e.g. "color3"
    pub data_type: String,
}

/// An editable node class: all definition variants of one category.
#[derive(Debug, Clone)]
pub struct NodeClass {
    /// Class id, e.g. "MxNode_STD_add"
    pub id: String,
    /// Operator category shared by all variants
    pub category: String,
    /// Variants in library declaration order
    pub variants: Vec<DefVariant>,
}

/// A resolved definition match for a document node.
#[derive(Debug)]
pub struct DefMatch<'a> {
    /// Matched class id
    pub class_id: &'a str,
    /// Matched variant data type
    pub data_type: &'a str,
    /// The matched definition
    pub nodedef: &'a NodeDef,
}

/// Registry of editable node classes.
#[derive(Debug)]
pub struct NodeClassRegistry {
    defs: IndexMap<String, NodeDef>,
    classes: IndexMap<String, NodeClass>,
    by_category: IndexMap<String, String>,
}

impl NodeClassRegistry {
    /// Build the registry from the bundled definition library.
    pub fn load_builtin() -> Result<Self, EngineError> {
        let library = Document::read_from_xml_string(STD_LIBRARY)?;
        let mut registry = Self {
            defs: IndexMap::new(),
            classes: IndexMap::new(),
            by_category: IndexMap::new(),
        };
        for def in library.nodedefs.values() {
            registry.register(def.clone());
        }
        tracing::debug!(
            classes = registry.classes.len(),
            definitions = registry.defs.len(),
            "loaded definition library"
        );
        Ok(registry)
    }

    fn register(&mut self, def: NodeDef) {
        let class_id = format!("{STD_CLASS_PREFIX}{}", def.category);
        let prefix = format!("ND_{}_", def.category);
        let data_type = def
            .name
            .strip_prefix(&prefix)
            .map(str::to_string)
            .unwrap_or_else(|| def.ty.as_str().to_string());

        let class = self
            .classes
            .entry(class_id.clone())
            .or_insert_with(|| NodeClass {
                id: class_id.clone(),
                category: def.category.clone(),
                variants: Vec::new(),
            });
        class.variants.push(DefVariant {
            nodedef: def.name.clone(),
            data_type,
        });
        self.by_category.insert(def.category.clone(), class_id);
        self.defs.insert(def.name.clone(), def);
    }

    /// Get a definition by name.
    pub fn nodedef(&self, name: &str) -> Option<&NodeDef> {
        self.defs.get(name)
    }

    /// Get a class by id.
    pub fn class(&self, id: &str) -> Option<&NodeClass> {
        self.classes.get(id)
    }

    /// The definition behind a class variant.
    pub fn variant_def(&self, class_id: &str, data_type: &str) -> Option<&NodeDef> {
        let class = self.classes.get(class_id)?;
        let variant = class.variants.iter().find(|v| v.data_type == data_type)?;
        self.defs.get(&variant.nodedef)
    }

    /// Resolve a document node to a class variant by signature subset.
    pub fn resolve(&self, node: &DocNode) -> Result<DefMatch<'_>, EngineError> {
        let class_id = self
            .by_category
            .get(&node.category)
            .ok_or_else(|| EngineError::NoMatchingClass(node.category.clone()))?;
        let class = &self.classes[class_id];

        let node_sig = node_signature(node);
        for variant in &class.variants {
            let def = &self.defs[&variant.nodedef];
            if node_sig.is_subset(&def_signature(def)) {
                return Ok(DefMatch {
                    class_id: &class.id,
                    data_type: &variant.data_type,
                    nodedef: def,
                });
            }
        }
        Err(EngineError::NoMatchingDefinition(format!(
            "node '{}' of category '{}'",
            node.name, node.category
        )))
    }
}

fn node_signature(node: &DocNode) -> BTreeSet<String> {
    let mut sig: BTreeSet<String> = node
        .inputs
        .iter()
        .map(|(name, input)| format!("in_{name}:{}", input.ty))
        .collect();
    sig.insert(node.ty.as_str().to_string());
    sig
}

fn def_signature(def: &NodeDef) -> BTreeSet<String> {
    let mut sig: BTreeSet<String> = def
        .inputs
        .iter()
        .map(|i| format!("in_{}:{}", i.name, i.ty))
        .collect();
    let out = if def.outputs.len() > 1 {
        ValueType::Multioutput.as_str()
    } else {
        def.ty.as_str()
    };
    sig.insert(out.to_string());
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use matbridge_document::DocNode;

    fn registry() -> NodeClassRegistry {
        NodeClassRegistry::load_builtin().unwrap()
    }

    #[test]
    fn test_resolve_float_variant() {
        let reg = registry();
        let mut node = DocNode::new("a1", "add", ValueType::Float);
        node.set_value_input("in1", ValueType::Float, "1.0");
        node.set_value_input("in2", ValueType::Float, "2.0");

        let m = reg.resolve(&node).unwrap();
        assert_eq!(m.class_id, "MxNode_STD_add");
        assert_eq!(m.data_type, "float");
        assert_eq!(m.nodedef.name, "ND_add_float");
    }

    #[test]
    fn test_resolve_mixed_arity_variant() {
        // color3 by float picks the FA variant, not the plain color3 one
        let reg = registry();
        let mut node = DocNode::new("m1", "multiply", ValueType::Color3);
        node.set_value_input("in1", ValueType::Color3, "1.0, 0.5, 0.0");
        node.set_value_input("in2", ValueType::Float, "0.5");

        let m = reg.resolve(&node).unwrap();
        assert_eq!(m.data_type, "color3FA");
    }

    #[test]
    fn test_resolve_subset_of_inputs() {
        // a node binding only some definition inputs still matches
        let reg = registry();
        let mut node = DocNode::new("s1", "standard_surface", ValueType::Surfaceshader);
        node.set_value_input("base_color", ValueType::Color3, "0.1, 0.2, 0.3");

        let m = reg.resolve(&node).unwrap();
        assert_eq!(m.nodedef.name, "ND_standard_surface_surfaceshader");
    }

    #[test]
    fn test_resolve_multioutput() {
        let reg = registry();
        let mut node = DocNode::new("sep", "separate3", ValueType::Multioutput);
        node.set_value_input("in", ValueType::Vector3, "1.0, 2.0, 3.0");

        let m = reg.resolve(&node).unwrap();
        assert_eq!(m.data_type, "vector3");
        assert_eq!(m.nodedef.outputs.len(), 3);
    }

    #[test]
    fn test_no_matching_class() {
        let reg = registry();
        let node = DocNode::new("x", "warp_drive", ValueType::Float);
        assert!(matches!(
            reg.resolve(&node),
            Err(EngineError::NoMatchingClass(c)) if c == "warp_drive"
        ));
    }

    #[test]
    fn test_no_matching_definition() {
        let reg = registry();
        let mut node = DocNode::new("a", "add", ValueType::Float);
        node.set_value_input("in3", ValueType::Float, "1.0");
        assert!(matches!(
            reg.resolve(&node),
            Err(EngineError::NoMatchingDefinition(_))
        ));
    }

    #[test]
    fn test_variant_def_lookup() {
        let reg = registry();
        let def = reg.variant_def("MxNode_STD_mix", "color3").unwrap();
        assert_eq!(def.name, "ND_mix_color3");
        assert!(reg.variant_def("MxNode_STD_mix", "matrix44").is_none());
    }
}
