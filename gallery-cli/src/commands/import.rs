use anyhow::{Context, Result};
use gallery_core::{
    derivatives::{generate_derivatives, is_image_file},
    manifest::base_name,
    paths::{normalise_dir, resolve_image_path},
    DerivativeConfig, Manifest, NewImage, ProjectPaths,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::progress_bar;

pub async fn execute(paths: &ProjectPaths, inputs: Vec<PathBuf>, img_dir: String) -> Result<()> {
    let img_dir = normalise_dir(Some(&img_dir))?;
    let image_paths = collect_image_paths(&inputs)?;

    if image_paths.is_empty() {
        anyhow::bail!("No images found in the provided paths");
    }

    let mut manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;

    // Derivatives are named by stem, so only the first file per stem is taken
    let mut seen_stems = HashSet::new();
    let mut pending = Vec::new();
    let mut skipped = 0;
    for path in image_paths {
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if let Err(e) = manifest.check_available(&filename) {
            tracing::info!("Skipping {}: {}", path.display(), e);
            skipped += 1;
            continue;
        }
        if !seen_stems.insert(base_name(&filename)) {
            tracing::info!("Skipping {}: another file with the same name is being imported", path.display());
            skipped += 1;
            continue;
        }
        pending.push((path, filename));
    }

    paths.ensure_directories().await?;

    let config = DerivativeConfig::default();
    let pb = progress_bar(pending.len(), "Importing images...");

    let results: Vec<(String, Result<usize>)> = pending
        .par_iter()
        .map(|(path, filename)| {
            let result = import_one(paths, path, filename, &img_dir, &config);
            pb.inc(1);
            pb.set_message(format!("Imported: {}", filename));
            (filename.clone(), result)
        })
        .collect();

    pb.finish_with_message("Import complete");

    let mut imported = 0;
    let mut failed = 0;
    for (filename, result) in results {
        match result {
            Ok(count) => {
                tracing::debug!("{}: {} derivatives", filename, count);
                manifest.push(
                    NewImage {
                        src: filename,
                        ..Default::default()
                    }
                    .into_entry(img_dir.clone()),
                )?;
                imported += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to import {}: {:#}", filename, e);
                failed += 1;
            }
        }
    }

    if imported > 0 {
        manifest
            .save(&paths.manifest)
            .await
            .context("Failed to write gallery.json")?;
    }

    println!("\n✓ Import complete!");
    println!("  Imported: {}", imported);
    println!("  Skipped:  {}", skipped);
    if failed > 0 {
        println!("  Failed:   {}", failed);
    }
    println!("  Manifest: {}", paths.display_relative(&paths.manifest));

    Ok(())
}

fn import_one(
    paths: &ProjectPaths,
    source: &Path,
    filename: &str,
    img_dir: &str,
    config: &DerivativeConfig,
) -> Result<usize> {
    let location = resolve_image_path(paths, Some(img_dir), filename)?;
    fs::create_dir_all(&location.absolute_dir)?;
    fs::copy(source, &location.absolute_path)
        .with_context(|| format!("Failed to copy {}", source.display()))?;

    match generate_derivatives(&location.absolute_path, &paths.output_dir, config) {
        Ok(derivatives) => Ok(derivatives.len()),
        Err(e) => {
            // Leave no orphan source behind for an image that never made it into the manifest
            let _ = fs::remove_file(&location.absolute_path);
            Err(e.into())
        }
    }
}

fn collect_image_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut image_paths = Vec::new();

    for path in inputs {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        if path.is_file() {
            if is_image_file(path) {
                image_paths.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && is_image_file(entry_path) {
                    image_paths.push(entry_path.to_path_buf());
                }
            }
        }
    }

    image_paths.sort();
    Ok(image_paths)
}
