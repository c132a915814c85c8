// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value types used by document inputs, outputs and node definitions.

use crate::DocumentError;
use serde::{Deserialize, Serialize};

/// Declared type of a document value, input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Single float
    Float,
    /// Integer
    Integer,
    /// Boolean
    Boolean,
    /// Plain string
    String,
    /// Filesystem path to a texture
    Filename,
    /// RGB color
    Color3,
    /// RGBA color
    Color4,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// 3x3 matrix
    Matrix33,
    /// 4x4 matrix
    Matrix44,
    /// Surface shader closure
    Surfaceshader,
    /// Displacement shader closure
    Displacementshader,
    /// Volume shader closure
    Volumeshader,
    /// Material
    Material,
    /// BSDF closure
    Bsdf,
    /// EDF closure
    Edf,
    /// VDF closure
    Vdf,
    /// Placeholder type of a definition with several outputs
    Multioutput,
}

impl ValueType {
    /// The string form used in serialized documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Filename => "filename",
            Self::Color3 => "color3",
            Self::Color4 => "color4",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Matrix33 => "matrix33",
            Self::Matrix44 => "matrix44",
            Self::Surfaceshader => "surfaceshader",
            Self::Displacementshader => "displacementshader",
            Self::Volumeshader => "volumeshader",
            Self::Material => "material",
            Self::Bsdf => "BSDF",
            Self::Edf => "EDF",
            Self::Vdf => "VDF",
            Self::Multioutput => "multioutput",
        }
    }

    /// Parse the serialized string form.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        Ok(match s {
            "float" => Self::Float,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "filename" => Self::Filename,
            "color3" => Self::Color3,
            "color4" => Self::Color4,
            "vector2" => Self::Vector2,
            "vector3" => Self::Vector3,
            "vector4" => Self::Vector4,
            "matrix33" => Self::Matrix33,
            "matrix44" => Self::Matrix44,
            "surfaceshader" => Self::Surfaceshader,
            "displacementshader" => Self::Displacementshader,
            "volumeshader" => Self::Volumeshader,
            "material" => Self::Material,
            "BSDF" => Self::Bsdf,
            "EDF" => Self::Edf,
            "VDF" => Self::Vdf,
            "multioutput" => Self::Multioutput,
            other => return Err(DocumentError::UnknownType(other.to_string())),
        })
    }

    /// Number of numeric components for tuple-like types.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Float => Some(1),
            Self::Vector2 => Some(2),
            Self::Color3 | Self::Vector3 => Some(3),
            Self::Color4 | Self::Vector4 => Some(4),
            Self::Matrix33 => Some(9),
            Self::Matrix44 => Some(16),
            _ => None,
        }
    }

    /// Whether this is a shader-like closure type rather than a plain value.
    pub fn is_shader(&self) -> bool {
        matches!(
            self,
            Self::Surfaceshader
                | Self::Displacementshader
                | Self::Volumeshader
                | Self::Material
                | Self::Bsdf
                | Self::Edf
                | Self::Vdf
        )
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for ty in [
            ValueType::Float,
            ValueType::Color3,
            ValueType::Vector4,
            ValueType::Filename,
            ValueType::Bsdf,
            ValueType::Material,
        ] {
            assert_eq!(ValueType::parse(ty.as_str()).unwrap(), ty);
        }
        assert!(ValueType::parse("color5").is_err());
    }

    #[test]
    fn test_arity() {
        assert_eq!(ValueType::Float.arity(), Some(1));
        assert_eq!(ValueType::Color3.arity(), Some(3));
        assert_eq!(ValueType::Matrix44.arity(), Some(16));
        assert_eq!(ValueType::Surfaceshader.arity(), None);
    }

    #[test]
    fn test_is_shader() {
        assert!(ValueType::Bsdf.is_shader());
        assert!(ValueType::Material.is_shader());
        assert!(!ValueType::Color3.is_shader());
        assert!(!ValueType::Filename.is_shader());
    }
}
