// SPDX-License-Identifier: MIT OR Apache-2.0
//! Writing documents to disk, with optional texture gathering and
//! definition-library references.

use crate::error::EngineError;
use crate::registry::{NodeClassRegistry, STD_LIBRARY, STD_LIBRARY_FILE};
use crate::session::Session;
use matbridge_document::{Document, InputBinding, ValueType};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name library copies land under, relative to the document.
const LIBRARY_DIR: &str = "libraries";

/// Options controlling [`export_to_file`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Copy referenced textures next to the document and rewrite paths
    pub export_textures: bool,
    /// Directory name for copied textures, relative to the document
    pub texture_dir: String,
    /// Add include directives for the definition libraries in use
    pub export_references: bool,
    /// Copy the referenced libraries next to the document too
    pub copy_references: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_textures: true,
            texture_dir: "textures".to_string(),
            export_references: false,
            copy_references: false,
        }
    }
}

/// Write a document to `path`, applying the selected side effects first.
pub fn export_to_file(
    doc: &mut Document,
    path: &Path,
    options: &ExportOptions,
    session: &Session,
) -> Result<(), EngineError> {
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(root)?;
    if options.export_textures {
        gather_textures(doc, root, &options.texture_dir)?;
    }
    if options.export_references {
        add_reference_includes(doc, root, options.copy_references, session)?;
    }
    doc.write_to_xml_file(path)?;
    info!(path = %path.display(), "wrote material document");
    Ok(())
}

/// Copy every referenced texture under the texture directory and rewrite
/// filename values to document-relative paths. Each distinct source is
/// copied once; missing files are kept as-is with a warning.
fn gather_textures(doc: &mut Document, root: &Path, dir_name: &str) -> Result<(), EngineError> {
    let tex_dir = root.join(dir_name);
    let mut copied: HashMap<PathBuf, String> = HashMap::new();
    let mut used_names: HashSet<String> = HashSet::new();
    let mut dir_created = false;

    for node_path in doc.node_paths() {
        let Some(node) = doc.node_by_path_mut(&node_path) else {
            continue;
        };
        for (input_name, input) in node.inputs.iter_mut() {
            if input.ty != ValueType::Filename {
                continue;
            }
            let InputBinding::Value(value) = &mut input.binding else {
                continue;
            };
            let source = PathBuf::from(&*value);
            if let Some(rel) = copied.get(&source) {
                *value = rel.clone();
                continue;
            }
            if !source.is_file() {
                warn!(node = %node_path, input = %input_name, file = %source.display(), "texture file not found, path kept as-is");
                continue;
            }
            if !dir_created {
                std::fs::create_dir_all(&tex_dir)?;
                dir_created = true;
            }
            let file_name = unique_file_name(&source, &used_names);
            std::fs::copy(&source, tex_dir.join(&file_name))?;
            used_names.insert(file_name.clone());
            let rel = format!("{dir_name}/{file_name}");
            copied.insert(source, rel.clone());
            *value = rel;
        }
    }
    Ok(())
}

/// A destination file name not yet taken in the texture directory.
fn unique_file_name(source: &Path, used: &HashSet<String>) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "texture".to_string());
    if !used.contains(&name) {
        return name;
    }
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "texture".to_string());
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut i = 1;
    loop {
        let candidate = format!("{stem}_{i}{ext}");
        if !used.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// Prepend include directives for every definition library the document's
/// nodes resolve against, optionally copying the libraries next to it.
fn add_reference_includes(
    doc: &mut Document,
    root: &Path,
    copy: bool,
    session: &Session,
) -> Result<(), EngineError> {
    if !document_uses_library(doc, &session.registry) {
        return Ok(());
    }
    let href = if copy {
        let lib_dir = root.join(LIBRARY_DIR);
        std::fs::create_dir_all(&lib_dir)?;
        std::fs::write(lib_dir.join(STD_LIBRARY_FILE), STD_LIBRARY)?;
        format!("{LIBRARY_DIR}/{STD_LIBRARY_FILE}")
    } else if let Some(dir) = &session.library_dir {
        dir.join(STD_LIBRARY_FILE).to_string_lossy().into_owned()
    } else {
        STD_LIBRARY_FILE.to_string()
    };
    doc.prepend_include(href);
    Ok(())
}

fn document_uses_library(doc: &Document, registry: &NodeClassRegistry) -> bool {
    doc.node_paths().iter().any(|path| {
        doc.node_by_path(path)
            .map(|node| registry.resolve(node).is_ok())
            .unwrap_or(false)
    })
}
