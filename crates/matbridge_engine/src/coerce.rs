// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value coercion between host socket values and serialized document
//! literals.
//!
//! Coercion is shape-based: tuple values convert by arity, a lone float
//! broadcasts to any tuple arity, and everything else must match exactly.

use crate::error::EngineError;
use matbridge_document::{split_path, Document, ValueType};
use matbridge_tree::{ImageHandle, SocketValue};
use std::path::{Path, PathBuf};

/// Format a float the way document literals are written.
pub fn format_float(v: f32) -> String {
    let mut s = format!("{v}");
    if !s.contains('.') && !s.contains(['e', 'n', 'i']) {
        s.push_str(".0");
    }
    s
}

/// Format a component list as a comma-separated literal.
pub fn format_components(comps: &[f32]) -> String {
    comps
        .iter()
        .map(|c| format_float(*c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The document type a host value maps to when no declared type constrains
/// it.
pub fn literal_type(value: &SocketValue) -> ValueType {
    match value {
        SocketValue::Float(_) => ValueType::Float,
        SocketValue::Int(_) => ValueType::Integer,
        SocketValue::Bool(_) => ValueType::Boolean,
        SocketValue::Vector2(_) => ValueType::Vector2,
        SocketValue::Vector3(_) => ValueType::Vector3,
        SocketValue::Vector4(_) => ValueType::Vector4,
        SocketValue::Color3(_) => ValueType::Color3,
        SocketValue::Color4(_) => ValueType::Color4,
        SocketValue::Tuple(t) => match t.len() {
            2 => ValueType::Vector2,
            4 => ValueType::Vector4,
            9 => ValueType::Matrix33,
            16 => ValueType::Matrix44,
            _ => ValueType::Vector3,
        },
        SocketValue::String(_) => ValueType::String,
        SocketValue::Image(_) => ValueType::Filename,
    }
}

/// Build a host value of the given declared type from numeric components.
pub fn value_of_type(ty: ValueType, comps: &[f32]) -> Option<SocketValue> {
    Some(match ty {
        ValueType::Float => SocketValue::Float(*comps.first()?),
        ValueType::Vector2 => SocketValue::Vector2(comps.try_into().ok()?),
        ValueType::Vector3 => SocketValue::Vector3(comps.try_into().ok()?),
        ValueType::Vector4 => SocketValue::Vector4(comps.try_into().ok()?),
        ValueType::Color3 => SocketValue::Color3(comps.try_into().ok()?),
        ValueType::Color4 => SocketValue::Color4(comps.try_into().ok()?),
        ValueType::Matrix33 | ValueType::Matrix44 => {
            if comps.len() != ty.arity()? {
                return None;
            }
            SocketValue::Tuple(comps.to_vec())
        }
        _ => return None,
    })
}

/// Serialize a host value as a document literal of the declared type.
///
/// A single float broadcasts to any tuple arity; any other arity mismatch
/// is an error.
pub fn coerce_value(value: &SocketValue, ty: ValueType) -> Result<String, EngineError> {
    let fail = || EngineError::TypeMismatch(format!("cannot coerce {value:?} to {ty}"));
    match ty {
        ValueType::Boolean => match value {
            SocketValue::Bool(b) => Ok(b.to_string()),
            _ => Err(fail()),
        },
        ValueType::Integer => match value {
            SocketValue::Int(i) => Ok(i.to_string()),
            SocketValue::Bool(b) => Ok((*b as i32).to_string()),
            _ => Err(fail()),
        },
        ValueType::String | ValueType::Filename => match value {
            SocketValue::String(s) => Ok(s.clone()),
            SocketValue::Image(img) => img
                .filepath
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    EngineError::MissingResource(format!(
                        "image '{}' has no backing file",
                        img.name
                    ))
                }),
            _ => Err(fail()),
        },
        ValueType::Float => {
            let comps = value.components().ok_or_else(fail)?;
            Ok(format_float(*comps.first().ok_or_else(fail)?))
        }
        _ => {
            let arity = ty.arity().ok_or_else(fail)?;
            let comps = value.components().ok_or_else(fail)?;
            let comps = if comps.len() == 1 {
                vec![comps[0]; arity]
            } else {
                comps
            };
            if comps.len() != arity {
                return Err(fail());
            }
            Ok(format_components(&comps))
        }
    }
}

/// Parse a document literal into a host value of the declared type.
pub fn parse_literal(text: &str, ty: ValueType) -> Result<SocketValue, EngineError> {
    let bad = || EngineError::TypeMismatch(format!("cannot parse '{text}' as {ty}"));
    match ty {
        ValueType::Float => text
            .trim()
            .parse::<f32>()
            .map(SocketValue::Float)
            .map_err(|_| bad()),
        ValueType::Integer => text
            .trim()
            .parse::<i32>()
            .map(SocketValue::Int)
            .map_err(|_| bad()),
        ValueType::Boolean => match text.trim() {
            "true" | "1" => Ok(SocketValue::Bool(true)),
            "false" | "0" => Ok(SocketValue::Bool(false)),
            _ => Err(bad()),
        },
        ValueType::String | ValueType::Filename => Ok(SocketValue::String(text.to_string())),
        _ => {
            let arity = ty.arity().ok_or_else(bad)?;
            let comps = text
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| bad())?;
            let comps = if comps.len() == 1 {
                vec![comps[0]; arity]
            } else {
                comps
            };
            value_of_type(ty, &comps).ok_or_else(bad)
        }
    }
}

/// Parse a document literal, resolving filename values against a prefix
/// directory. An existing file becomes an image handle; a missing one is
/// kept as a plain string.
pub fn parse_value(
    text: &str,
    ty: ValueType,
    file_prefix: Option<&Path>,
) -> Result<SocketValue, EngineError> {
    if ty != ValueType::Filename {
        return parse_literal(text, ty);
    }
    let raw = Path::new(text);
    let path = match file_prefix {
        Some(prefix) if raw.is_relative() => prefix.join(raw),
        _ => raw.to_path_buf(),
    };
    if path.is_file() {
        Ok(SocketValue::Image(ImageHandle::from_file(path)))
    } else {
        Ok(SocketValue::String(path.to_string_lossy().into_owned()))
    }
}

/// The directory filename values of a node resolve against: source file
/// directory, then the document prefix, then the owning nodegraph prefix.
pub fn file_prefix(doc: &Document, node_path: &str, source_dir: Option<&Path>) -> PathBuf {
    let mut prefix = source_dir.map(Path::to_path_buf).unwrap_or_default();
    if !doc.fileprefix.is_empty() {
        prefix.push(&doc.fileprefix);
    }
    if let (Some(graph), _) = split_path(node_path) {
        if let Some(ng) = doc.nodegraph(graph) {
            if !ng.fileprefix.is_empty() {
                prefix.push(&ng.fileprefix);
            }
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(-3.0), "-3.0");
    }

    #[test]
    fn test_coerce_broadcast() {
        let v = SocketValue::Float(0.5);
        assert_eq!(coerce_value(&v, ValueType::Color3).unwrap(), "0.5, 0.5, 0.5");
        assert_eq!(coerce_value(&v, ValueType::Float).unwrap(), "0.5");
    }

    #[test]
    fn test_coerce_arity_mismatch() {
        let v = SocketValue::Vector2([1.0, 2.0]);
        assert!(matches!(
            coerce_value(&v, ValueType::Color3),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_coerce_non_numeric() {
        let v = SocketValue::String("abc".into());
        assert!(coerce_value(&v, ValueType::Float).is_err());
        assert_eq!(coerce_value(&v, ValueType::String).unwrap(), "abc");
    }

    #[test]
    fn test_parse_literal_tuple() {
        assert_eq!(
            parse_literal("0.1, 0.2, 0.3", ValueType::Color3).unwrap(),
            SocketValue::Color3([0.1, 0.2, 0.3])
        );
        assert_eq!(
            parse_literal("2.0", ValueType::Vector3).unwrap(),
            SocketValue::Vector3([2.0, 2.0, 2.0])
        );
        assert!(parse_literal("1.0, 2.0", ValueType::Color3).is_err());
        assert!(parse_literal("abc", ValueType::Float).is_err());
    }

    #[test]
    fn test_parse_value_missing_file_stays_string() {
        let v = parse_value("no_such.png", ValueType::Filename, None).unwrap();
        assert_eq!(v, SocketValue::String("no_such.png".into()));
    }

    #[test]
    fn test_file_prefix_combines() {
        let mut doc = Document::new();
        doc.fileprefix = "assets/".to_string();
        let ng = doc.add_nodegraph("NG");
        ng.fileprefix = "textures/".to_string();
        ng.add_node("image", ValueType::Color3);

        let p = file_prefix(&doc, "NG/image_1", Some(Path::new("/scenes")));
        assert_eq!(p, PathBuf::from("/scenes/assets/textures/"));
    }
}
