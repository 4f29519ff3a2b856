//! Gallery item types and the persistence boundary.
//!
//! The engine produces encoded media payloads; where they end up is the
//! surrounding application's business. The JSON file store here is the
//! default implementation, keeping items newest first.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

/// One captured artifact: a base64-encoded media payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub src: String,
}

/// Persistence boundary for the capture gallery. Items are ordered newest
/// first.
pub trait GalleryStore {
    fn load(&self) -> anyhow::Result<Vec<GalleryItem>>;
    fn save(&self, items: &[GalleryItem]) -> anyhow::Result<()>;
}

/// Gallery persisted as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonGalleryStore {
    path: PathBuf,
}

impl JsonGalleryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GalleryStore for JsonGalleryStore {
    fn load(&self) -> anyhow::Result<Vec<GalleryItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading gallery {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing gallery {}", self.path.display()))
    }

    fn save(&self, items: &[GalleryItem]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating gallery directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(items).context("serializing gallery")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing gallery {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonGalleryStore::new(dir.path().join("gallery.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonGalleryStore::new(dir.path().join("media").join("gallery.json"));

        let items = vec![
            GalleryItem {
                kind: MediaKind::Video,
                src: "newest".to_string(),
            },
            GalleryItem {
                kind: MediaKind::Photo,
                src: "older".to_string(),
            },
        ];
        store.save(&items).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, items);
        assert_eq!(loaded[0].src, "newest");
    }
}
