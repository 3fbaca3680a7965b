use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("gallery.json must contain an array")]
    InvalidManifest,
    #[error("imgDir must resolve under /images/: {0}")]
    InvalidImageDir(String),
    #[error("Resolved path escapes images root: {0}")]
    PathEscape(PathBuf),
    #[error("Image not found: {0}")]
    NotFound(String),
    #[error("An image with the same filename already exists: {0}")]
    Duplicate(String),
    #[error("{src} would overwrite the derivatives of {existing}")]
    StemConflict { src: String, existing: String },
}

pub type Result<T> = std::result::Result<T, GalleryError>;
