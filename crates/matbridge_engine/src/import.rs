// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import of a material document into a host shader tree.
//!
//! Nodes are reconstructed as editable definition-bound nodes, memoized
//! by document path. Unmatched categories are redirected once through
//! the document's own definitions to the implementing nodegraph. The
//! whole reconstruction runs inside one bulk-edit scope so link validity
//! is computed in a single pass at the end.

use crate::coerce::{file_prefix, parse_value};
use crate::error::EngineError;
use crate::layout;
use crate::normalize::normalize_document;
use crate::session::Session;
use matbridge_document::{split_path, DocNode, Document, InputBinding, NodeDef};
use matbridge_tree::{NodeId, OpKind, ShaderNode, ShaderTree, Socket};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Replace a tree's contents with the material graph of a document.
///
/// The document is normalized first, so legacy shader-reference
/// encodings import transparently. On failure the tree is left empty
/// rather than partially built.
pub fn import_document(
    tree: &mut ShaderTree,
    doc: &mut Document,
    source_path: Option<&Path>,
    session: &Session,
) -> Result<(), EngineError> {
    normalize_document(doc)?;
    let Some(root) = doc.node_of_category("surfacematerial") else {
        return Err(EngineError::NoOutputNode);
    };
    let root_path = root.name.clone();

    tree.clear();
    let doc = &*doc;
    let source_dir = source_path.and_then(Path::parent).map(Path::to_path_buf);
    let result = tree.bulk_edit(|tree| {
        let mut importer = Importer {
            doc,
            tree,
            session,
            source_dir,
            memo: HashMap::new(),
            visiting: HashSet::new(),
        };
        importer.import_material(&root_path)
    });
    match result {
        Ok(Some(root_id)) => {
            layout::arrange(tree, root_id);
            tracing::info!(
                nodes = tree.node_count(),
                links = tree.link_count(),
                "imported material"
            );
            Ok(())
        }
        Ok(None) => {
            tree.clear();
            Err(EngineError::NoOutputNode)
        }
        Err(e) => {
            tree.clear();
            Err(e)
        }
    }
}

struct Importer<'a> {
    doc: &'a Document,
    tree: &'a mut ShaderTree,
    session: &'a Session,
    source_dir: Option<PathBuf>,
    memo: HashMap<String, NodeId>,
    visiting: HashSet<String>,
}

impl Importer<'_> {
    /// Import the material root: its shader producer becomes the tree,
    /// capped by a host material output node.
    fn import_material(&mut self, root_path: &str) -> Result<Option<NodeId>, EngineError> {
        let doc = self.doc;
        let Some(root) = doc.node_by_path(root_path) else {
            return Ok(None);
        };
        let producer = match root.input("surfaceshader").map(|i| &i.binding) {
            Some(InputBinding::Node { node, output }) => self
                .import_node(node, output.as_deref(), true)?
                .map(|pid| (pid, output.clone())),
            Some(InputBinding::Graph { nodegraph, output }) => {
                self.import_graph_output(nodegraph, Some(output))?
            }
            Some(InputBinding::Value(_)) | None => {
                warn!(material = %root_path, "material has no shader connection");
                None
            }
        };

        let out_id = self.tree.add_node(
            ShaderNode::op(OpKind::OutputMaterial { active: true }).with_name(root_path),
        );
        if let Some((pid, output)) = producer {
            let from = self.producer_socket(pid, output.as_deref());
            if let Err(e) = self.tree.connect(pid, &from, out_id, "Surface") {
                warn!(material = %root_path, error = %e, "cannot connect shader to output");
            }
        }
        Ok(Some(out_id))
    }

    /// Import one document node, memoized by path.
    fn import_node(
        &mut self,
        path: &str,
        output: Option<&str>,
        allow_redirect: bool,
    ) -> Result<Option<NodeId>, EngineError> {
        if let Some(id) = self.memo.get(path) {
            return Ok(Some(*id));
        }
        if self.visiting.contains(path) {
            return Err(EngineError::CyclicGraph(path.to_string()));
        }
        let doc = self.doc;
        let Some(doc_node) = doc.node_by_path(path) else {
            warn!(path, "referenced node not found");
            return Ok(None);
        };

        let (class_id, data_type, def) = match self.session.registry.resolve(doc_node) {
            Ok(m) => (
                m.class_id.to_string(),
                m.data_type.to_string(),
                m.nodedef.clone(),
            ),
            Err(EngineError::NoMatchingClass(_)) if allow_redirect => {
                return self.redirect(doc_node, output);
            }
            Err(e) => {
                warn!(path, error = %e, "cannot import node");
                return Ok(None);
            }
        };

        self.visiting.insert(path.to_string());
        let id = self.build_node(path, doc_node, &class_id, &data_type, &def)?;
        self.visiting.remove(path);
        self.memo.insert(path.to_string(), id);
        Ok(Some(id))
    }

    fn build_node(
        &mut self,
        path: &str,
        doc_node: &DocNode,
        class_id: &str,
        data_type: &str,
        def: &NodeDef,
    ) -> Result<NodeId, EngineError> {
        let prefix = file_prefix(self.doc, path, self.source_dir.as_deref());

        let mut inputs = Vec::new();
        for def_input in &def.inputs {
            if def_input.uniform {
                continue;
            }
            let mut socket = Socket::new(&def_input.name, def_input.ty);
            if let Some(default) = &def_input.default {
                socket.default = parse_value(default, def_input.ty, Some(&prefix)).ok();
            }
            inputs.push(socket);
        }
        let outputs = def
            .outputs
            .iter()
            .map(|o| Socket::new(&o.name, o.ty))
            .collect();

        let node = ShaderNode::definition(class_id, data_type, inputs, outputs).with_name(path);
        let id = self.tree.add_node(node);

        let (container, _) = split_path(path);
        for (input_name, input) in &doc_node.inputs {
            let Some(def_input) = def.input(input_name) else {
                warn!(path, input = %input_name, "input not declared by the matched definition");
                continue;
            };
            match &input.binding {
                InputBinding::Value(text) => {
                    match parse_value(text, def_input.ty, Some(&prefix)) {
                        Ok(value) => {
                            if def_input.uniform {
                                if let Some(node) = self.tree.node_mut(id) {
                                    node.params.insert(input_name.clone(), value);
                                }
                            } else if let Some(socket) = self
                                .tree
                                .node_mut(id)
                                .and_then(|n| n.inputs.iter_mut().find(|s| s.name == *input_name))
                            {
                                socket.default = Some(value);
                            }
                        }
                        Err(e) => {
                            warn!(path, input = %input_name, error = %e, "cannot parse value");
                        }
                    }
                }
                InputBinding::Node { node, output } => {
                    let producer_path = match container {
                        Some(graph) => format!("{graph}/{node}"),
                        None => node.clone(),
                    };
                    let producer = self.import_node(&producer_path, output.as_deref(), true)?;
                    self.link(producer, output.as_deref(), id, input_name);
                }
                InputBinding::Graph { nodegraph, output } => {
                    if let Some((pid, inner)) = self.import_graph_output(nodegraph, Some(output))? {
                        self.link(Some(pid), inner.as_deref(), id, input_name);
                    }
                }
            }
        }
        Ok(id)
    }

    /// Follow a named nodegraph output to its interior producer. Returns
    /// the producer and the interior output to link from.
    fn import_graph_output(
        &mut self,
        nodegraph: &str,
        output: Option<&str>,
    ) -> Result<Option<(NodeId, Option<String>)>, EngineError> {
        let doc = self.doc;
        let Some(ng) = doc.nodegraph(nodegraph) else {
            warn!(nodegraph, "referenced nodegraph not found");
            return Ok(None);
        };
        let Some(go) = ng.output(output) else {
            warn!(nodegraph, output = output.unwrap_or("<first>"), "nodegraph output not found");
            return Ok(None);
        };
        let path = format!("{nodegraph}/{}", go.node);
        let inner = go.output.clone();
        let producer = self.import_node(&path, inner.as_deref(), true)?;
        Ok(producer.map(|pid| (pid, inner)))
    }

    /// Redirect an unmatched category through the document's own
    /// definition to the implementing nodegraph's output producer.
    fn redirect(
        &mut self,
        doc_node: &DocNode,
        output: Option<&str>,
    ) -> Result<Option<NodeId>, EngineError> {
        let doc = self.doc;
        let Some(def) = doc.nodedef_for(&doc_node.category, doc_node.ty) else {
            warn!(node = %doc_node.name, category = %doc_node.category, "no definition for category");
            return Ok(None);
        };
        let Some(ng) = doc.nodegraph_for_def(&def.name) else {
            warn!(nodedef = %def.name, "definition has no implementing nodegraph");
            return Ok(None);
        };
        let Some(go) = ng.output(output) else {
            warn!(nodegraph = %ng.name, "implementing nodegraph has no outputs");
            return Ok(None);
        };
        let path = format!("{}/{}", ng.name, go.node);
        self.import_node(&path, go.output.as_deref(), false)
    }

    fn link(&mut self, producer: Option<NodeId>, output: Option<&str>, to: NodeId, input: &str) {
        let Some(pid) = producer else { return };
        let from = self.producer_socket(pid, output);
        if let Err(e) = self.tree.connect(pid, &from, to, input) {
            warn!(input, error = %e, "cannot connect imported link");
        }
    }

    /// The output socket name to link from: the named one on
    /// multi-output producers, else the first.
    fn producer_socket(&self, id: NodeId, output: Option<&str>) -> String {
        let Some(node) = self.tree.node(id) else {
            return "out".to_string();
        };
        if node.outputs.len() > 1 {
            if let Some(name) = output {
                if node.output(name).is_some() {
                    return name.to_string();
                }
            }
        }
        node.outputs
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "out".to_string())
    }
}
