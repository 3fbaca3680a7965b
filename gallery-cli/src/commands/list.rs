use anyhow::{Context, Result};
use chrono::DateTime;
use gallery_core::{stats::augment_with_stats, EntryWithStats, Manifest, ProjectPaths};

pub async fn execute(paths: &ProjectPaths) -> Result<()> {
    let manifest = Manifest::load(&paths.manifest)
        .await
        .context("Failed to read gallery.json")?;

    let entries = augment_with_stats(paths, manifest.entries).await;
    if entries.is_empty() {
        println!("No images in {}", paths.display_relative(&paths.manifest));
        return Ok(());
    }

    for entry in &entries {
        println!("{}", format_row(entry));
    }

    let missing = entries.iter().filter(|e| e.size.is_none()).count();
    println!("\n{} images", entries.len());
    if missing > 0 {
        println!("{} source files missing", missing);
    }
    Ok(())
}

fn format_row(entry: &EntryWithStats) -> String {
    let size = entry
        .size
        .map(format_size)
        .unwrap_or_else(|| "missing".to_string());
    let modified = entry
        .mtime
        .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:<40} {:<24} {:>10}  {}",
        entry.entry.src,
        entry.entry.img_dir(),
        size,
        modified
    )
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}
