pub mod config;
pub mod derivatives;
pub mod error;
pub mod manifest;
pub mod metadata;
pub mod palette;
pub mod paths;
pub mod sidecar;
pub mod stats;
pub mod themes;
pub mod treemap;

pub use config::ProjectPaths;
pub use derivatives::{Derivative, DerivativeConfig, DerivativeFormat};
pub use error::{GalleryError, Result};
pub use manifest::{GalleryEntry, Manifest, MetadataUpdate, NewImage};
pub use metadata::ExifSummary;
pub use palette::{PaletteColor, PaletteConfig};
pub use paths::ImageLocation;
pub use stats::EntryWithStats;
pub use themes::GalleryThemes;
pub use treemap::TreemapTile;
