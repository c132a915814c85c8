// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalization of legacy material declarations.
//!
//! Older documents encode materials as `<material>` blocks wrapping
//! shader references. Normalization rewrites each of them into a
//! shader node plus a surfacematerial node, which is the only shape the
//! importer traverses. Documents already carrying a surfacematerial are
//! left untouched, so the pass is idempotent.

use crate::error::EngineError;
use matbridge_document::{Document, ValueType};
use tracing::{debug, warn};

/// Prefix for shader nodes synthesized from shader references.
const SHADER_REF_PREFIX: &str = "SR_";

/// Rewrite legacy material declarations into surfacematerial nodes.
pub fn normalize_document(doc: &mut Document) -> Result<(), EngineError> {
    if doc.node_of_category("surfacematerial").is_some() {
        return Ok(());
    }

    let materials: Vec<String> = doc.materials.keys().cloned().collect();
    for name in materials {
        let Some(material) = doc.remove_material(&name) else {
            continue;
        };
        let Some(shader_ref) = material.shader_refs.first() else {
            warn!(material = %name, "legacy material has no shader reference");
            continue;
        };
        if material.shader_refs.len() > 1 {
            warn!(material = %name, "legacy material has several shader references, using the first");
        }

        let shader_name = if shader_ref.name.starts_with(SHADER_REF_PREFIX) {
            shader_ref.name.clone()
        } else {
            format!("{SHADER_REF_PREFIX}{}", shader_ref.name)
        };

        // resolve graph-bound inputs to concrete output names up front
        enum Binding {
            Value(String, ValueType, String),
            Graph(String, ValueType, String, String),
        }
        let mut bindings = Vec::new();
        for bind in &shader_ref.inputs {
            if let Some(value) = &bind.value {
                bindings.push(Binding::Value(bind.name.clone(), bind.ty, value.clone()));
            } else if let Some(nodegraph) = &bind.nodegraph {
                let output = doc
                    .nodegraph(nodegraph)
                    .and_then(|ng| ng.output(bind.output.as_deref()))
                    .map(|o| o.name.clone());
                match output {
                    Some(output) => bindings.push(Binding::Graph(
                        bind.name.clone(),
                        bind.ty,
                        nodegraph.clone(),
                        output,
                    )),
                    None => {
                        warn!(material = %name, input = %bind.name, "bound nodegraph output not found");
                    }
                }
            } else {
                warn!(material = %name, input = %bind.name, "shader reference input binds nothing");
            }
        }

        let shader = doc.add_node_named(
            &shader_name,
            &shader_ref.category,
            ValueType::Surfaceshader,
        )?;
        for binding in bindings {
            match binding {
                Binding::Value(input, ty, value) => shader.set_value_input(input, ty, value),
                Binding::Graph(input, ty, nodegraph, output) => {
                    shader.set_graph_input(input, ty, nodegraph, output)
                }
            }
        }

        let material_node = doc.add_node_named(&name, "surfacematerial", ValueType::Material)?;
        material_node.set_node_input(
            "surfaceshader",
            ValueType::Surfaceshader,
            shader_name.clone(),
            None,
        );
        debug!(material = %name, shader = %shader_name, "normalized legacy material");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matbridge_document::InputBinding;

    const LEGACY: &str = r#"<?xml version="1.0"?>
<materialx version="1.37">
  <nodegraph name="NG">
    <constant name="c1" type="color3">
      <input name="value" type="color3" value="1.0, 0.0, 0.0" />
    </constant>
    <output name="out" type="color3" nodename="c1" />
  </nodegraph>
  <material name="M">
    <shaderref name="sr" node="standard_surface">
      <bindinput name="base_color" type="color3" nodegraph="NG" output="out" />
      <bindinput name="specular_roughness" type="float" value="0.4" />
    </shaderref>
  </material>
</materialx>
"#;

    #[test]
    fn test_normalize_legacy_material() {
        let mut doc = Document::read_from_xml_string(LEGACY).unwrap();
        normalize_document(&mut doc).unwrap();

        assert!(doc.materials.is_empty());
        let shader = doc.nodes.get("SR_sr").unwrap();
        assert_eq!(shader.category, "standard_surface");
        assert_eq!(shader.ty, ValueType::Surfaceshader);
        assert!(matches!(
            &shader.input("base_color").unwrap().binding,
            InputBinding::Graph { nodegraph, output } if nodegraph == "NG" && output == "out"
        ));
        assert_eq!(
            shader.input("specular_roughness").unwrap().binding,
            InputBinding::Value("0.4".to_string())
        );

        let material = doc.nodes.get("M").unwrap();
        assert_eq!(material.category, "surfacematerial");
        assert!(matches!(
            &material.input("surfaceshader").unwrap().binding,
            InputBinding::Node { node, .. } if node == "SR_sr"
        ));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut doc = Document::read_from_xml_string(LEGACY).unwrap();
        normalize_document(&mut doc).unwrap();
        let first = doc.write_to_xml_string();
        normalize_document(&mut doc).unwrap();
        assert_eq!(doc.write_to_xml_string(), first);
    }

    #[test]
    fn test_normalize_keeps_modern_documents() {
        let mut doc = Document::new();
        doc.add_node("surfacematerial", ValueType::Material);
        let before = doc.clone();
        normalize_document(&mut doc).unwrap();
        assert_eq!(doc, before);
    }
}
