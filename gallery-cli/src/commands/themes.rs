use anyhow::{Context, Result};
use gallery_core::{sidecar, themes::build_themes, ExifSummary, Manifest, ProjectPaths};
use std::collections::BTreeMap;

pub async fn execute(paths: &ProjectPaths) -> Result<()> {
    let manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;
    let exif: BTreeMap<String, ExifSummary> = sidecar::read_index(&paths.exif_data)
        .await
        .context("Failed to read exif.json")?;

    let themes = build_themes(&manifest.entries, &exif, env!("CARGO_PKG_NAME"));
    tracing::info!(
        "Indexed {} tags and {} lenses",
        themes.tags.len(),
        themes.lenses.len()
    );

    sidecar::write_json(&paths.themes_data, &themes)
        .await
        .context("Failed to write theme data")?;

    println!(
        "Gallery themes written to {}",
        paths.display_relative(&paths.themes_data)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn works_without_exif_side_file() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path());
        Manifest::from_json(r#"[{"src": "a.jpg", "tags": ["Rain", "rain "]}]"#)
            .unwrap()
            .save(&paths.manifest)
            .await
            .unwrap();

        execute(&paths).await.unwrap();

        let raw = std::fs::read_to_string(&paths.themes_data).unwrap();
        let themes: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(themes["tags"].as_array().unwrap().len(), 2);
        assert_eq!(themes["lenses"], serde_json::json!([]));
        assert_eq!(themes["source"], "gallery-cli");
    }
}
