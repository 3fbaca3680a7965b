use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use gallery_core::{
    derivatives::{generate_derivatives, remove_derivatives},
    manifest::normalise_tags,
    paths::{normalise_dir, resolve_image_path},
    stats::augment_with_stats,
    Derivative, GalleryEntry, Manifest, MetadataUpdate, NewImage, ProjectPaths,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

type ApiResult<T> = Result<Json<T>, AppError>;

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub ok: bool,
    pub image: GalleryEntry,
}

/// Admin UI liveness check
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// List every manifest entry with file size and modification time
pub async fn list_images(State(state): State<AppState>) -> ApiResult<Value> {
    let manifest = Manifest::load(&state.paths.manifest).await.map_err(|e| {
        tracing::error!("Failed to read gallery: {}", e);
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read gallery.json")
    })?;

    let images = augment_with_stats(&state.paths, manifest.entries).await;
    Ok(Json(json!({ "images": images })))
}

/// Upload a new image, generate its derivatives and append it to the manifest
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<ImageResponse> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut fields = std::collections::HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let original_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::new(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Image exceeds the 25 MB upload limit.",
                ));
            }
            file = Some((original_name, bytes.to_vec()));
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let Some((original_name, bytes)) = file else {
        return Err(AppError::bad_request("Missing image file."));
    };

    let filename = fields
        .get("src")
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .or_else(|| original_name.as_deref().map(upload_basename))
        .unwrap_or_default();

    let _guard = state.manifest_lock.lock().await;
    let mut manifest = Manifest::load(&state.paths.manifest).await?;
    if manifest.contains(&filename) {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "An image with the same filename already exists.",
        ));
    }
    manifest.check_available(&filename)?;

    let img_dir = normalise_dir(fields.get("imgDir").map(String::as_str))?;
    let location = resolve_image_path(&state.paths, Some(&img_dir), &filename)?;

    tokio::fs::create_dir_all(&location.absolute_dir).await?;
    tokio::fs::write(&location.absolute_path, &bytes).await?;
    set_readable(&location.absolute_path).await;

    if let Err(e) = regenerate(&state, location.absolute_path.clone()).await {
        let _ = tokio::fs::remove_file(&location.absolute_path).await;
        return Err(e);
    }

    let text = |key: &str| fields.get(key).cloned();
    let new_image = NewImage {
        src: filename,
        title: text("title"),
        date: text("date"),
        alt: text("alt"),
        credit: text("credit"),
        link_to_author: text("linkToAuthor"),
        tags: text("tags")
            .map(|tags| normalise_tags(&Value::String(tags)))
            .unwrap_or_default(),
    };
    let entry = new_image.into_entry(img_dir);

    manifest.push(entry.clone())?;
    manifest.save(&state.paths.manifest).await?;

    tracing::info!("Added image {} under {}", entry.src, entry.img_dir());
    Ok(Json(ImageResponse {
        ok: true,
        image: entry,
    }))
}

/// Edit an entry's metadata, moving the source file if its directory changed
pub async fn update_image(
    State(state): State<AppState>,
    Path(src): Path<String>,
    Json(update): Json<MetadataUpdate>,
) -> ApiResult<ImageResponse> {
    let _guard = state.manifest_lock.lock().await;
    let mut manifest = Manifest::load(&state.paths.manifest).await?;

    let index = manifest
        .position(&src)
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    let entry = &manifest.entries[index];
    let updated = update.apply(entry)?;

    let current = entry.location(&state.paths)?;
    let desired = updated.location(&state.paths)?;
    manifest.replace(index, updated.clone());

    if current.absolute_path == desired.absolute_path {
        manifest.save(&state.paths.manifest).await?;
    } else {
        tracing::info!("Moving {} from {} to {}", src, current.dir, desired.dir);
        move_file(&current.absolute_path, &desired.absolute_dir, &desired.absolute_path).await?;

        if let Err(e) = finish_move(&state, &src, &desired.absolute_path, &manifest).await {
            tracing::warn!("Moving {} failed, restoring {}: {}", src, current.dir, e.message);
            if let Err(undo) =
                move_file(&desired.absolute_path, &current.absolute_dir, &current.absolute_path).await
            {
                tracing::error!(
                    "Unable to restore {}: {}",
                    current.absolute_path.display(),
                    undo
                );
            }
            return Err(e);
        }
    }

    Ok(Json(ImageResponse {
        ok: true,
        image: updated,
    }))
}

/// Rebuild derivatives from the moved file, then persist the new location.
async fn finish_move(
    state: &AppState,
    src: &str,
    moved_to: &FsPath,
    manifest: &Manifest,
) -> Result<(), AppError> {
    let paths = Arc::clone(&state.paths);
    let removed_src = src.to_string();
    tokio::task::spawn_blocking(move || remove_derivatives(&removed_src, &paths.output_dir))
        .await??;
    regenerate(state, moved_to.to_path_buf()).await?;
    manifest.save(&state.paths.manifest).await?;
    Ok(())
}

/// Remove entries, their source files and their derivatives
pub async fn delete_images(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let items = requested_items(&body);
    if items.is_empty() {
        return Err(AppError::bad_request("No image sources supplied."));
    }

    let _guard = state.manifest_lock.lock().await;
    let mut manifest = Manifest::load(&state.paths.manifest).await?;
    let removed = manifest.remove_sources(&items);

    for entry in &removed {
        match entry.location(&state.paths) {
            Ok(location) => match tokio::fs::remove_file(&location.absolute_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", entry.src, e),
            },
            Err(e) => tracing::warn!("Failed to remove {}: {}", entry.src, e),
        }
    }

    let paths = Arc::clone(&state.paths);
    let sources: Vec<String> = removed.iter().map(|entry| entry.src.clone()).collect();
    tokio::task::spawn_blocking(move || {
        for src in &sources {
            if let Err(e) = remove_derivatives(src, &paths.output_dir) {
                tracing::warn!("Unable to remove derivatives for {}: {}", src, e);
            }
        }
    })
    .await?;

    manifest.save(&state.paths.manifest).await?;

    tracing::info!("Removed {} of {} requested images", removed.len(), items.len());
    Ok(Json(json!({ "ok": true, "removed": items.len() })))
}

/// Rebuild the derivatives of a single entry
pub async fn regenerate_image(
    State(state): State<AppState>,
    Path(src): Path<String>,
) -> ApiResult<Value> {
    let location = {
        let _guard = state.manifest_lock.lock().await;
        let manifest = Manifest::load(&state.paths.manifest).await?;
        let entry = manifest
            .find(&src)
            .ok_or_else(|| AppError::not_found("Image not found"))?;
        entry.location(&state.paths)?
    };

    let paths = Arc::clone(&state.paths);
    let removed_src = src.clone();
    tokio::task::spawn_blocking(move || remove_derivatives(&removed_src, &paths.output_dir)).await??;
    let derivatives = regenerate(&state, location.absolute_path).await?;

    Ok(Json(json!({ "ok": true, "derivatives": derivatives })))
}

async fn regenerate(state: &AppState, source: PathBuf) -> Result<Vec<Derivative>, AppError> {
    let paths: Arc<ProjectPaths> = Arc::clone(&state.paths);
    let config = Arc::clone(&state.derivatives);

    paths.ensure_directories().await?;
    let derivatives = tokio::task::spawn_blocking(move || {
        generate_derivatives(&source, &paths.output_dir, &config)
    })
    .await??;
    Ok(derivatives)
}

async fn move_file(from: &FsPath, to_dir: &FsPath, to: &FsPath) -> std::io::Result<()> {
    tokio::fs::create_dir_all(to_dir).await?;
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

/// `items` of a delete body; anything but a JSON object with an array is empty.
fn requested_items(body: &[u8]) -> Vec<String> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|value| value.get("items"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Strip any client-side directory from an uploaded file name.
fn upload_basename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_string()
}

#[cfg(unix)]
async fn set_readable(path: &FsPath) {
    use std::os::unix::fs::PermissionsExt;

    let permissions = std::fs::Permissions::from_mode(0o644);
    if let Err(e) = tokio::fs::set_permissions(path, permissions).await {
        tracing::warn!("Unable to set permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
async fn set_readable(_path: &FsPath) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_basename_drops_client_directories() {
        assert_eq!(upload_basename("C:\\Users\\me\\dawn.jpg"), "dawn.jpg");
        assert_eq!(upload_basename("photos/dusk.png"), "dusk.png");
        assert_eq!(upload_basename("plain.webp"), "plain.webp");
    }

    #[test]
    fn delete_items_are_read_leniently() {
        assert_eq!(requested_items(br#"{"items": ["a.png", 3, "b.png"]}"#), vec!["a.png", "b.png"]);
        assert!(requested_items(br#"{"items": "a.png"}"#).is_empty());
        assert!(requested_items(b"[]").is_empty());
        assert!(requested_items(b"").is_empty());
    }
}
