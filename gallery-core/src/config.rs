use std::path::{Path, PathBuf};

use crate::error::Result;

/// Filesystem layout of a gallery project, derived from its root directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub images_root: PathBuf,
    pub output_dir: PathBuf,
    pub manifest: PathBuf,
    pub exif_data: PathBuf,
    pub color_data: PathBuf,
    pub themes_data: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source_root = root.join("src");
        let data_dir = source_root.join("_data");

        Self {
            images_root: source_root.join("images"),
            output_dir: root.join("_site").join("img"),
            manifest: data_dir.join("gallery.json"),
            exif_data: data_dir.join("exif.json"),
            color_data: data_dir.join("colorTreemap.json"),
            themes_data: data_dir.join("galleryThemes.json"),
            source_root,
            root,
        }
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.images_root).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Path relative to the project root, for log lines and CLI output.
    pub fn display_relative<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
    }
}
