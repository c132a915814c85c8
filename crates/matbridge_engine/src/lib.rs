// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bidirectional translation between host shader trees and material
//! documents.
//!
//! Export walks backwards from the material output node, folding constant
//! subexpressions and memoizing shared producers; import matches document
//! nodes against the builtin definition library by signature subset and
//! rebuilds them as editable tree nodes. A [`Session`] carries the
//! definition registry and the image conversion cache shared by both
//! directions.

pub mod coerce;
pub mod error;
pub mod export;
pub mod file_export;
pub mod image_cache;
pub mod import;
pub mod layout;
pub mod normalize;
pub mod ops;
pub mod registry;
pub mod session;

pub use error::EngineError;
pub use export::{export_tree, ERROR_COLOR};
pub use file_export::{export_to_file, ExportOptions};
pub use image_cache::ImageCache;
pub use import::import_document;
pub use normalize::normalize_document;
pub use registry::NodeClassRegistry;
pub use session::Session;
