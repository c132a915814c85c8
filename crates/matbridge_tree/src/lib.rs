// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-side shader node tree.
//!
//! This crate models the editable material tree the translation engine
//! exports from and imports into:
//! - Procedural operator nodes (a closed [`OpKind`] set)
//! - Definition-bound editable nodes reconstructed on import
//! - Typed sockets with strict link validity flags
//! - A bulk-edit scope that defers link revalidation to one pass
//!
//! Layout positions are plain canvas coordinates; rendering is the host
//! editor's concern.

pub mod link;
pub mod node;
pub mod socket;
pub mod tree;

pub use link::{Link, LinkId};
pub use node::{MathOp, MixMode, NodeId, NodeKind, NormalSpace, OpKind, ShaderNode};
pub use socket::{ImageHandle, ImageSource, Socket, SocketValue};
pub use tree::{ShaderTree, TreeError};
