// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use matbridge_document::ValueType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a host image resource gets its pixels from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Backed by a file on disk
    File,
    /// Procedurally generated, no backing file
    Generated,
    /// Multi-tile texture set
    Tiled,
    /// Image sequence
    Sequence,
}

/// A host-side image resource referenced by a texture node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHandle {
    /// Resource name
    pub name: String,
    /// Backing file, when one exists
    pub filepath: Option<PathBuf>,
    /// Pixel source kind
    pub source: ImageSource,
}

impl ImageHandle {
    /// Create a file-backed image handle.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            filepath: Some(path),
            source: ImageSource::File,
        }
    }
}

/// Value that can be stored in a socket or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SocketValue {
    /// Float
    Float(f32),
    /// Integer
    Int(i32),
    /// Boolean
    Bool(bool),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// RGB color
    Color3([f32; 3]),
    /// RGBA color
    Color4([f32; 4]),
    /// Generic numeric tuple (matrix-sized values)
    Tuple(Vec<f32>),
    /// String
    String(String),
    /// Image resource
    Image(ImageHandle),
}

impl SocketValue {
    /// Numeric components of this value, when it is numeric.
    pub fn components(&self) -> Option<Vec<f32>> {
        match self {
            Self::Float(v) => Some(vec![*v]),
            Self::Int(v) => Some(vec![*v as f32]),
            Self::Vector2(v) => Some(v.to_vec()),
            Self::Vector3(v) | Self::Color3(v) => Some(v.to_vec()),
            Self::Vector4(v) | Self::Color4(v) => Some(v.to_vec()),
            Self::Tuple(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A named, typed input or output slot on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Socket name
    pub name: String,
    /// Declared type, compared strictly for link validity
    pub ty: ValueType,
    /// Default value used when the socket is unconnected
    pub default: Option<SocketValue>,
}

impl Socket {
    /// Create a socket without a default.
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, value: SocketValue) -> Self {
        self.default = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        assert_eq!(SocketValue::Float(2.0).components(), Some(vec![2.0]));
        assert_eq!(
            SocketValue::Color3([1.0, 0.0, 1.0]).components(),
            Some(vec![1.0, 0.0, 1.0])
        );
        assert_eq!(SocketValue::String("x".into()).components(), None);
    }

    #[test]
    fn test_image_handle_from_file() {
        let img = ImageHandle::from_file("/tmp/wood.png");
        assert_eq!(img.name, "wood.png");
        assert_eq!(img.source, ImageSource::File);
    }
}
