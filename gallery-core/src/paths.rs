use std::path::PathBuf;

use crate::config::ProjectPaths;
use crate::error::{GalleryError, Result};

pub const DEFAULT_IMAGE_DIR: &str = "/images/";

/// Where a manifest entry's source file lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    /// Normalised URL directory, e.g. `/images/travel/`
    pub dir: String,
    pub absolute_dir: PathBuf,
    pub absolute_path: PathBuf,
}

/// Normalise an `imgDir` value to the `/images/.../` form.
pub fn normalise_dir(dir: Option<&str>) -> Result<String> {
    let value = match dir.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(DEFAULT_IMAGE_DIR.to_string()),
    };

    let mut normalised = String::with_capacity(value.len() + 2);
    if !value.starts_with('/') {
        normalised.push('/');
    }
    normalised.push_str(value);
    if !normalised.ends_with('/') {
        normalised.push('/');
    }

    if !normalised.starts_with(DEFAULT_IMAGE_DIR) {
        return Err(GalleryError::InvalidImageDir(normalised));
    }
    if normalised
        .split(['/', '\\'])
        .any(|segment| segment == ".." || segment == ".")
    {
        return Err(GalleryError::InvalidImageDir(normalised));
    }

    Ok(normalised)
}

pub fn resolve_image_path(
    paths: &ProjectPaths,
    dir: Option<&str>,
    filename: &str,
) -> Result<ImageLocation> {
    let dir = normalise_dir(dir)?;
    let absolute_dir = paths.source_root.join(dir.trim_start_matches('/'));

    if !absolute_dir.starts_with(&paths.images_root) {
        return Err(GalleryError::PathEscape(absolute_dir));
    }
    if !is_plain_filename(filename) {
        return Err(GalleryError::PathEscape(absolute_dir.join(filename)));
    }

    Ok(ImageLocation {
        absolute_path: absolute_dir.join(filename),
        absolute_dir,
        dir,
    })
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\', '\0'])
}
