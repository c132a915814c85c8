// SPDX-License-Identifier: MIT OR Apache-2.0
//! The document root: top-level nodes, nodegraphs, node definitions and
//! include directives.

use crate::element::{DocNode, LegacyMaterial, NodeDef, NodeGraph};
use crate::types::ValueType;
use crate::DocumentError;
use indexmap::IndexMap;
use std::path::Path;

/// Format version written into new documents.
pub const DOCUMENT_VERSION: &str = "1.38";

/// A portable material description document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Format version
    pub version: String,
    /// Relative path prefix applied to filename values at document level
    pub fileprefix: String,
    /// Include directives, in order
    pub includes: Vec<String>,
    /// Node definitions by name
    pub nodedefs: IndexMap<String, NodeDef>,
    /// Nodegraphs by name
    pub nodegraphs: IndexMap<String, NodeGraph>,
    /// Top-level nodes by name
    pub nodes: IndexMap<String, DocNode>,
    /// Legacy material declarations by name
    pub materials: IndexMap<String, LegacyMaterial>,
}

impl Document {
    /// Create an empty document at the current format version.
    pub fn new() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            ..Self::default()
        }
    }

    /// Add a top-level node with a generated category-based name,
    /// returning the name.
    pub fn add_node(&mut self, category: &str, ty: ValueType) -> String {
        let name = unique_name(&self.nodes, category);
        self.nodes
            .insert(name.clone(), DocNode::new(name.clone(), category, ty));
        name
    }

    /// Add a top-level node under an explicit name.
    pub fn add_node_named(
        &mut self,
        name: &str,
        category: &str,
        ty: ValueType,
    ) -> Result<&mut DocNode, DocumentError> {
        if self.nodes.contains_key(name) {
            return Err(DocumentError::DuplicateName(name.to_string()));
        }
        self.nodes
            .insert(name.to_string(), DocNode::new(name, category, ty));
        Ok(&mut self.nodes[name])
    }

    /// Get or create a nodegraph by name.
    pub fn add_nodegraph(&mut self, name: &str) -> &mut NodeGraph {
        self.nodegraphs
            .entry(name.to_string())
            .or_insert_with(|| NodeGraph::new(name))
    }

    /// Get a nodegraph by name.
    pub fn nodegraph(&self, name: &str) -> Option<&NodeGraph> {
        self.nodegraphs.get(name)
    }

    /// Get a mutable nodegraph by name.
    pub fn nodegraph_mut(&mut self, name: &str) -> Option<&mut NodeGraph> {
        self.nodegraphs.get_mut(name)
    }

    /// Resolve a slash-delimited node path from the document root.
    pub fn node_by_path(&self, path: &str) -> Option<&DocNode> {
        match path.split_once('/') {
            Some((graph, name)) => self.nodegraphs.get(graph)?.node(name),
            None => self.nodes.get(path),
        }
    }

    /// Resolve a slash-delimited node path mutably.
    pub fn node_by_path_mut(&mut self, path: &str) -> Option<&mut DocNode> {
        match path.split_once('/') {
            Some((graph, name)) => self.nodegraphs.get_mut(graph)?.node_mut(name),
            None => self.nodes.get_mut(path),
        }
    }

    /// All node paths in the document: top-level nodes first, then
    /// nodegraph interiors, in insertion order.
    pub fn node_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.nodes.keys().cloned().collect();
        for ng in self.nodegraphs.values() {
            paths.extend(ng.nodes.keys().map(|n| format!("{}/{}", ng.name, n)));
        }
        paths
    }

    /// Find the first top-level node of a given category.
    pub fn node_of_category(&self, category: &str) -> Option<&DocNode> {
        self.nodes.values().find(|n| n.category == category)
    }

    /// Find a node definition matching a category and declared type.
    pub fn nodedef_for(&self, category: &str, ty: ValueType) -> Option<&NodeDef> {
        self.nodedefs
            .values()
            .find(|nd| nd.category == category && nd.ty == ty)
    }

    /// Find the nodegraph implementing a node definition.
    pub fn nodegraph_for_def(&self, nodedef: &str) -> Option<&NodeGraph> {
        self.nodegraphs
            .values()
            .find(|ng| ng.nodedef.as_deref() == Some(nodedef))
    }

    /// Register a node definition.
    pub fn add_nodedef(&mut self, def: NodeDef) {
        self.nodedefs.insert(def.name.clone(), def);
    }

    /// Remove a legacy material declaration.
    pub fn remove_material(&mut self, name: &str) -> Option<LegacyMaterial> {
        self.materials.shift_remove(name)
    }

    /// Prepend an include directive, keeping existing order otherwise.
    pub fn prepend_include(&mut self, href: impl Into<String>) {
        let href = href.into();
        if !self.includes.contains(&href) {
            self.includes.insert(0, href);
        }
    }

    /// Merge definitions and nodegraphs from another document (used for
    /// resolving includes). Existing entries win.
    pub fn merge_definitions(&mut self, other: Document) {
        for (name, def) in other.nodedefs {
            self.nodedefs.entry(name).or_insert(def);
        }
        for (name, ng) in other.nodegraphs {
            self.nodegraphs.entry(name).or_insert(ng);
        }
    }

    /// Serialize to an XML string.
    pub fn write_to_xml_string(&self) -> String {
        crate::xml::write_document(self)
    }

    /// Serialize to an XML file.
    pub fn write_to_xml_file(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.write_to_xml_string())?;
        Ok(())
    }

    /// Parse a document from an XML string.
    pub fn read_from_xml_string(text: &str) -> Result<Self, DocumentError> {
        crate::xml::read_document(text)
    }

    /// Parse a document from an XML file, resolving includes against the
    /// given search directories.
    pub fn read_from_xml_file(path: &Path, search_path: &[&Path]) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        let mut doc = Self::read_from_xml_string(&text)?;
        let includes = std::mem::take(&mut doc.includes);
        for href in &includes {
            let Some(include_path) = search_path
                .iter()
                .map(|dir| dir.join(href))
                .find(|p| p.is_file())
            else {
                return Err(DocumentError::IncludeNotFound(href.clone()));
            };
            let included = Self::read_from_xml_file(&include_path, search_path)?;
            doc.merge_definitions(included);
        }
        doc.includes = includes;
        Ok(doc)
    }
}

/// Generate a container-unique node name from a category.
pub(crate) fn unique_name(nodes: &IndexMap<String, DocNode>, category: &str) -> String {
    let mut i = nodes.len() + 1;
    loop {
        let name = format!("{category}_{i}");
        if !nodes.contains_key(&name) {
            return name;
        }
        i += 1;
    }
}

/// Split a node path into its container (nodegraph name) and node name.
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once('/') {
        Some((graph, name)) => (Some(graph), name),
        None => (None, path),
    }
}
