// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine session: loaded definition registry plus the texture cache.

use crate::error::EngineError;
use crate::image_cache::ImageCache;
use crate::registry::NodeClassRegistry;
use std::path::{Path, PathBuf};

/// Shared state the translation operations run against.
///
/// A session is created explicitly, loads the bundled definition library
/// once, and owns the texture conversion cache. Dropping it leaves the
/// cache on disk; call [`Session::clear_cache`] to discard it.
#[derive(Debug)]
pub struct Session {
    /// Editable node classes from the bundled library
    pub registry: NodeClassRegistry,
    /// Texture conversion cache
    pub image_cache: ImageCache,
    /// Extra directory searched for document includes
    pub library_dir: Option<PathBuf>,
}

impl Session {
    /// Create a session with the default cache directory.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_cache_dir(std::env::temp_dir().join("matbridge"))
    }

    /// Create a session with an explicit cache directory.
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let registry = NodeClassRegistry::load_builtin()?;
        let image_cache = ImageCache::new(dir)?;
        tracing::info!(cache = %image_cache.dir().display(), "session initialized");
        Ok(Self {
            registry,
            image_cache,
            library_dir: None,
        })
    }

    /// Directories document includes are resolved against: the source
    /// file's directory first, then the configured library directory.
    pub fn search_path(&self, source: Option<&Path>) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(dir) = source.and_then(Path::parent) {
            dirs.push(dir.to_path_buf());
        }
        if let Some(dir) = &self.library_dir {
            dirs.push(dir.clone());
        }
        dirs
    }

    /// Drop all cached texture conversions.
    pub fn clear_cache(&self) -> Result<(), EngineError> {
        self.image_cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_loads_registry() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::with_cache_dir(dir.path().join("cache")).unwrap();
        assert!(session.registry.class("MxNode_STD_image").is_some());
        assert!(session.registry.nodedef("ND_mix_color3").is_some());
    }

    #[test]
    fn test_search_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::with_cache_dir(dir.path().join("cache")).unwrap();
        session.library_dir = Some(PathBuf::from("/libs"));

        let dirs = session.search_path(Some(Path::new("/scenes/scene.mtlx")));
        assert_eq!(dirs, vec![PathBuf::from("/scenes"), PathBuf::from("/libs")]);
    }
}
