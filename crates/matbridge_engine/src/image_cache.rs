// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk cache converting host images into formats the document
//! renderers accept.

use crate::error::EngineError;
use matbridge_tree::{ImageHandle, ImageSource};
use std::path::{Path, PathBuf};

/// File suffixes accepted as-is.
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpeg", "jpg", "hdr", "tga", "bmp"];

/// File suffixes accepted as-is but not writable by the cache.
pub const READONLY_FORMATS: &[&str] = &["dds"];

/// Conversion target for unsupported suffixes.
pub const DEFAULT_FORMAT: &str = "png";

/// Converts and caches texture files under a cache directory.
#[derive(Debug)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    /// Create a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve an image handle to an on-disk file in an accepted format.
    ///
    /// Multi-tile sets, sequences and generated images have no single
    /// backing file and are rejected. Unsupported formats are converted
    /// once and reused from the cache on later calls.
    pub fn resolve(&self, handle: &ImageHandle) -> Result<PathBuf, EngineError> {
        match handle.source {
            ImageSource::File => {}
            ImageSource::Generated | ImageSource::Tiled | ImageSource::Sequence => {
                return Err(EngineError::MissingResource(format!(
                    "image '{}' has no single backing file",
                    handle.name
                )));
            }
        }
        let path = handle.filepath.as_ref().ok_or_else(|| {
            EngineError::MissingResource(format!("image '{}' has no file path", handle.name))
        })?;
        if !path.is_file() {
            return Err(EngineError::MissingResource(format!(
                "image file not found: {}",
                path.display()
            )));
        }

        let suffix = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if SUPPORTED_FORMATS.contains(&suffix.as_str())
            || READONLY_FORMATS.contains(&suffix.as_str())
        {
            return Ok(path.clone());
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| handle.name.clone());
        // the full source path feeds the key so equal stems from
        // different directories get distinct cache entries
        let cached = self
            .dir
            .join(format!("{stem}_{:016x}.{DEFAULT_FORMAT}", path_key(path)));
        if cached.is_file() {
            return Ok(cached);
        }

        let decoded = image::open(path).map_err(|e| {
            EngineError::MissingResource(format!("cannot decode '{}': {e}", path.display()))
        })?;
        decoded.save(&cached).map_err(|e| {
            EngineError::MissingResource(format!("cannot convert '{}': {e}", path.display()))
        })?;
        tracing::debug!(source = %path.display(), cached = %cached.display(), "converted image");
        Ok(cached)
    }

    /// Remove all cached files.
    pub fn clear(&self) -> Result<(), EngineError> {
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

fn path_key(path: &Path) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (tempfile::TempDir, ImageCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_supported_format_passes_through() {
        let (dir, cache) = cache();
        let path = dir.path().join("wood.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let resolved = cache.resolve(&ImageHandle::from_file(&path)).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_missing_file_rejected() {
        let (dir, cache) = cache();
        let handle = ImageHandle::from_file(dir.path().join("absent.png"));
        assert!(matches!(
            cache.resolve(&handle),
            Err(EngineError::MissingResource(_))
        ));
    }

    #[test]
    fn test_tiled_and_sequence_rejected() {
        let (dir, cache) = cache();
        let path = dir.path().join("tiles.png");
        std::fs::write(&path, b"x").unwrap();
        for source in [ImageSource::Tiled, ImageSource::Sequence, ImageSource::Generated] {
            let mut handle = ImageHandle::from_file(&path);
            handle.source = source;
            assert!(cache.resolve(&handle).is_err());
        }
    }

    #[test]
    fn test_unsupported_format_converted() {
        let (dir, cache) = cache();
        let path = dir.path().join("gradient.tiff");
        let img = image::RgbImage::from_fn(4, 4, |x, _| image::Rgb([(x * 60) as u8, 0, 0]));
        img.save(&path).unwrap();

        let resolved = cache.resolve(&ImageHandle::from_file(&path)).unwrap();
        assert_eq!(resolved.parent(), Some(cache.dir()));
        assert_eq!(resolved.extension().unwrap(), "png");
        assert!(resolved.is_file());

        // second resolve reuses the cached file
        let again = cache.resolve(&ImageHandle::from_file(&path)).unwrap();
        assert_eq!(again, resolved);

        cache.clear().unwrap();
        assert!(!resolved.is_file());
    }

    #[test]
    fn test_equal_stems_cached_separately() {
        let (dir, cache) = cache();
        let a = dir.path().join("a").join("albedo.tiff");
        let b = dir.path().join("b").join("albedo.tiff");
        for (path, color) in [(&a, [10u8, 0, 0]), (&b, [0, 20, 0])] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            image::RgbImage::from_pixel(2, 2, image::Rgb(color))
                .save(path)
                .unwrap();
        }

        let ra = cache.resolve(&ImageHandle::from_file(&a)).unwrap();
        let rb = cache.resolve(&ImageHandle::from_file(&b)).unwrap();
        assert_ne!(ra, rb);
        let pixels = image::open(&rb).unwrap().to_rgb8();
        assert_eq!(pixels.get_pixel(0, 0), &image::Rgb([0, 20, 0]));
    }
}
