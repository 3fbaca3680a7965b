use anyhow::{Context, Result};
use gallery_core::{metadata::build_exif_index, sidecar, Manifest, ProjectPaths};

pub async fn execute(paths: &ProjectPaths) -> Result<()> {
    let manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;

    let index = build_exif_index(paths, &manifest.entries);
    tracing::info!(
        "Found EXIF data for {} of {} images",
        index.len(),
        manifest.entries.len()
    );

    sidecar::write_json(&paths.exif_data, &index)
        .await
        .context("Failed to write EXIF data")?;

    println!(
        "EXIF data extracted to {}",
        paths.display_relative(&paths.exif_data)
    );
    Ok(())
}
