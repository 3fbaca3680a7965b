use anyhow::{Context, Result};
use gallery_core::{
    sidecar::{self, OrderedIndex},
    treemap::color_treemap,
    Manifest, PaletteConfig, ProjectPaths, TreemapTile,
};
use rayon::prelude::*;

use super::progress_bar;

pub async fn execute(paths: &ProjectPaths) -> Result<()> {
    let manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;

    let config = PaletteConfig::default();
    let entries: Vec<_> = manifest
        .entries
        .iter()
        .filter(|entry| !entry.src.is_empty())
        .collect();

    // Clustering is CPU-bound, spread it over rayon's pool
    let pb = progress_bar(entries.len(), "Extracting colours...");
    let results: Vec<(String, Vec<TreemapTile>)> = entries
        .par_iter()
        .filter_map(|entry| {
            let tiles = entry
                .location(paths)
                .map_err(anyhow::Error::from)
                .and_then(|location| Ok(color_treemap(&location.absolute_path, &config)?));
            pb.inc(1);

            match tiles {
                Ok(tiles) if !tiles.is_empty() => Some((entry.src.clone(), tiles)),
                Ok(_) => {
                    tracing::warn!("No color data generated for {}", entry.src);
                    None
                }
                Err(e) => {
                    tracing::warn!("Failed to extract colors for {}: {}", entry.src, e);
                    None
                }
            }
        })
        .collect();
    pb.finish_with_message("Colours extracted");

    // rayon's collect keeps input order, so keys follow the manifest
    let colors: OrderedIndex<Vec<TreemapTile>> = results.into_iter().collect();
    sidecar::write_json(&paths.color_data, &colors)
        .await
        .context("Failed to write colour data")?;

    println!(
        "Color treemap data written to {}",
        paths.display_relative(&paths.color_data)
    );
    Ok(())
}
