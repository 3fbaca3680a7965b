use serde::Serialize;
use std::time::UNIX_EPOCH;

use crate::config::ProjectPaths;
use crate::manifest::GalleryEntry;

/// A manifest entry plus what the filesystem says about its source file.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithStats {
    #[serde(flatten)]
    pub entry: GalleryEntry,
    pub size: Option<u64>,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: Option<f64>,
}

pub async fn augment_with_stats(paths: &ProjectPaths, entries: Vec<GalleryEntry>) -> Vec<EntryWithStats> {
    let tasks: Vec<_> = entries
        .into_iter()
        .map(|entry| {
            let location = entry.location(paths);
            tokio::spawn(async move {
                let metadata = match location {
                    Ok(location) => tokio::fs::metadata(&location.absolute_path).await.ok(),
                    Err(_) => None,
                };
                let mtime = metadata
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64() * 1000.0);

                EntryWithStats {
                    size: metadata.map(|m| m.len()),
                    mtime,
                    entry,
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(stats) => results.push(stats),
            Err(e) => tracing::warn!("Stat task failed: {}", e),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    #[tokio::test]
    async fn missing_files_have_null_stats() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path());
        std::fs::create_dir_all(paths.images_root.join("city")).unwrap();
        std::fs::write(paths.images_root.join("city").join("here.jpg"), b"12345").unwrap();

        let manifest = Manifest::from_json(
            r#"[
                {"src": "here.jpg", "imgDir": "/images/city/"},
                {"src": "gone.jpg"},
                {"src": "bad.jpg", "imgDir": "/elsewhere/"}
            ]"#,
        )
        .unwrap();

        let stats = augment_with_stats(&paths, manifest.entries).await;

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].entry.src, "here.jpg");
        assert_eq!(stats[0].size, Some(5));
        assert!(stats[0].mtime.unwrap() > 0.0);
        assert_eq!(stats[1].size, None);
        assert_eq!(stats[1].mtime, None);
        assert_eq!(stats[2].size, None);

        let json = serde_json::to_value(&stats[1]).unwrap();
        assert!(json["size"].is_null());
        assert_eq!(json["src"], "gone.jpg");
    }
}
