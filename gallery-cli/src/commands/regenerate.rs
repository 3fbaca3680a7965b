use anyhow::{Context, Result};
use gallery_core::{
    derivatives::{generate_derivatives, remove_derivatives},
    DerivativeConfig, GalleryEntry, Manifest, ProjectPaths,
};
use rayon::prelude::*;

use super::progress_bar;

pub async fn execute(paths: &ProjectPaths, sources: Vec<String>) -> Result<()> {
    let manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;

    let selected: Vec<&GalleryEntry> = if sources.is_empty() {
        manifest.entries.iter().collect()
    } else {
        if let Some(src) = sources.iter().find(|src| !manifest.contains(src)) {
            anyhow::bail!("Image not found in gallery.json: {src}");
        }
        manifest
            .entries
            .iter()
            .filter(|entry| sources.contains(&entry.src))
            .collect()
    };

    paths.ensure_directories().await?;

    let config = DerivativeConfig::default();
    let pb = progress_bar(selected.len(), "Generating derivatives...");

    let failures: Vec<String> = selected
        .par_iter()
        .filter_map(|entry| {
            let result = rebuild(paths, entry, &config);
            pb.inc(1);
            match result {
                Ok(count) => {
                    pb.set_message(format!("{}: {} files", entry.src, count));
                    None
                }
                Err(e) => {
                    tracing::warn!("Failed to regenerate {}: {:#}", entry.src, e);
                    Some(entry.src.clone())
                }
            }
        })
        .collect();

    pb.finish_with_message("Derivatives complete");

    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} images failed: {}",
            failures.len(),
            selected.len(),
            failures.join(", ")
        );
    }

    println!("✓ Regenerated derivatives for {} images", selected.len());
    Ok(())
}

fn rebuild(paths: &ProjectPaths, entry: &GalleryEntry, config: &DerivativeConfig) -> Result<usize> {
    let location = entry.location(paths)?;
    remove_derivatives(&entry.src, &paths.output_dir)?;
    let derivatives = generate_derivatives(&location.absolute_path, &paths.output_dir, config)
        .with_context(|| format!("Failed to process {}", location.absolute_path.display()))?;
    Ok(derivatives.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_core::NewImage;
    use image::RgbImage;

    async fn project_with(images: &[&str]) -> (tempfile::TempDir, ProjectPaths) {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path());
        std::fs::create_dir_all(&paths.images_root).unwrap();

        let mut manifest = Manifest::default();
        for name in images {
            RgbImage::new(500, 250)
                .save(paths.images_root.join(name))
                .unwrap();
            let entry = NewImage {
                src: name.to_string(),
                ..Default::default()
            }
            .into_entry("/images/".to_string());
            manifest.push(entry).unwrap();
        }
        manifest.save(&paths.manifest).await.unwrap();
        (temp, paths)
    }

    #[tokio::test]
    async fn regenerates_all_entries() {
        let (_temp, paths) = project_with(&["a.png", "b.png"]).await;

        execute(&paths, Vec::new()).await.unwrap();

        for name in ["a-300.webp", "a-480.jpeg", "b-300.jpeg", "b-480.webp"] {
            assert!(paths.output_dir.join(name).is_file(), "{name} missing");
        }
        assert!(!paths.output_dir.join("a-640.webp").exists());
    }

    #[tokio::test]
    async fn only_selected_sources_and_unknown_fails() {
        let (_temp, paths) = project_with(&["a.png", "b.png"]).await;

        execute(&paths, vec!["b.png".to_string()]).await.unwrap();
        assert!(paths.output_dir.join("b-300.webp").is_file());
        assert!(!paths.output_dir.join("a-300.webp").exists());

        assert!(execute(&paths, vec!["zzz.png".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let (_temp, paths) = project_with(&["a.png"]).await;
        std::fs::remove_file(paths.images_root.join("a.png")).unwrap();

        let error = execute(&paths, Vec::new()).await.unwrap_err();
        assert!(error.to_string().contains("a.png"));
    }
}
