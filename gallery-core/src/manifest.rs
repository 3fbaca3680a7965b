use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

use crate::config::ProjectPaths;
use crate::error::{GalleryError, Result};
use crate::paths::{normalise_dir, resolve_image_path, ImageLocation};

/// One record of `gallery.json`.
///
/// Text fields are optional and read leniently: `null` counts as absent and
/// numbers or booleans are kept as their text, so one odd record never makes
/// the whole manifest unreadable. Absent fields stay absent on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub link_to_author: Option<String>,
    #[serde(default, deserialize_with = "lenient_src")]
    pub src: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub img_dir: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Keys this tool does not know about, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryEntry {
    /// File name without extension, used as the fallback title.
    pub fn base_name(&self) -> String {
        base_name(&self.src)
    }

    pub fn img_dir(&self) -> &str {
        self.img_dir.as_deref().unwrap_or(crate::paths::DEFAULT_IMAGE_DIR)
    }

    /// Where this entry's source file lives.
    pub fn location(&self, paths: &ProjectPaths) -> Result<ImageLocation> {
        resolve_image_path(paths, Some(self.img_dir()), &self.src)
    }
}

/// The ordered list of gallery entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<GalleryEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_array() {
            return Err(GalleryError::InvalidManifest);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Read the manifest; a missing file is an empty gallery.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No manifest at {}, starting empty", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write via a sibling temp file and rename it over the target.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gallery.json".to_string());
        let temp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        tokio::fs::write(&temp_path, json).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Wrote {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn position(&self, src: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.src == src)
    }

    pub fn find(&self, src: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|entry| entry.src == src)
    }

    pub fn contains(&self, src: &str) -> bool {
        self.position(src).is_some()
    }

    /// Entry whose derivatives share file names with those of `src`.
    pub fn stem_conflict(&self, src: &str) -> Option<&GalleryEntry> {
        let stem = base_name(src);
        self.entries
            .iter()
            .find(|entry| entry.src != src && entry.base_name() == stem)
    }

    /// Fails when `src`, or another source with the same stem, is already listed.
    pub fn check_available(&self, src: &str) -> Result<()> {
        if self.contains(src) {
            return Err(GalleryError::Duplicate(src.to_string()));
        }
        if let Some(existing) = self.stem_conflict(src) {
            return Err(GalleryError::StemConflict {
                src: src.to_string(),
                existing: existing.src.clone(),
            });
        }
        Ok(())
    }

    pub fn push(&mut self, entry: GalleryEntry) -> Result<()> {
        self.check_available(&entry.src)?;
        self.entries.push(entry);
        Ok(())
    }

    pub fn replace(&mut self, index: usize, entry: GalleryEntry) {
        self.entries[index] = entry;
    }

    /// Drop every entry whose `src` is listed, returning the removed ones.
    pub fn remove_sources(&mut self, sources: &[String]) -> Vec<GalleryEntry> {
        let (removed, remaining) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| sources.contains(&entry.src));
        self.entries = remaining;
        removed
    }
}

/// Metadata supplied alongside an uploaded file.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub src: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub alt: Option<String>,
    pub credit: Option<String>,
    pub link_to_author: Option<String>,
    pub tags: Vec<String>,
}

impl NewImage {
    pub fn into_entry(self, img_dir: String) -> GalleryEntry {
        let base = base_name(&self.src);
        let title = self.title.as_deref();
        let alt = self.alt.as_deref();

        GalleryEntry {
            title: Some(clean_text(title, &clean_text(alt, &base))),
            date: Some(clean_text(self.date.as_deref(), "")),
            alt: Some(clean_text(alt, &clean_text(title, &base))),
            credit: Some(clean_text(self.credit.as_deref(), "")),
            link_to_author: Some(clean_text(self.link_to_author.as_deref(), "")),
            img_dir: Some(img_dir),
            tags: (!self.tags.is_empty()).then_some(self.tags),
            src: self.src,
            extra: Map::new(),
        }
    }
}

/// Body of an edit request; absent or blank fields keep the current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub date: Option<String>,
    pub alt: Option<String>,
    pub credit: Option<String>,
    pub link_to_author: Option<String>,
    pub img_dir: Option<String>,
    pub tags: Option<Value>,
}

impl MetadataUpdate {
    pub fn apply(&self, entry: &GalleryEntry) -> Result<GalleryEntry> {
        let base = entry.base_name();
        let title_fallback = non_empty(&entry.title).unwrap_or(&base);
        let alt_fallback = non_empty(&entry.alt)
            .or_else(|| non_empty(&entry.title))
            .unwrap_or(&base);
        let current = |field: &Option<String>| field.clone().unwrap_or_default();

        let img_dir = normalise_dir(self.img_dir.as_deref().or(entry.img_dir.as_deref()))?;

        Ok(GalleryEntry {
            title: Some(clean_text(self.title.as_deref(), title_fallback)),
            date: Some(clean_text(self.date.as_deref(), &current(&entry.date))),
            alt: Some(clean_text(self.alt.as_deref(), alt_fallback)),
            credit: Some(clean_text(self.credit.as_deref(), &current(&entry.credit))),
            link_to_author: Some(clean_text(
                self.link_to_author.as_deref(),
                &current(&entry.link_to_author),
            )),
            img_dir: Some(img_dir),
            tags: match &self.tags {
                Some(value) => Some(normalise_tags(value)),
                None => entry.tags.clone(),
            },
            src: entry.src.clone(),
            extra: entry.extra.clone(),
        })
    }
}

/// Trimmed text, or `fallback` when the value is missing or blank.
pub fn clean_text(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => fallback.to_string(),
    }
}

/// Accepts a JSON array, a JSON-encoded array string or a comma-separated string.
pub fn normalise_tags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(text) => {
            let trimmed = text.trim();
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ Value::Array(_)) => return normalise_tags(&parsed),
                _ => trimmed.split(',').map(str::to_string).collect(),
            }
        }
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

pub fn base_name(src: &str) -> String {
    Path::new(src)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn text_value(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(text_value(Value::deserialize(deserializer)?))
}

fn lenient_src<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_tags<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().filter_map(text_value).collect()),
        text @ Value::String(_) => Some(normalise_tags(&text)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(src: &str) -> GalleryEntry {
        GalleryEntry {
            src: src.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_non_array_documents() {
        assert!(matches!(
            Manifest::from_json(r#"{"src": "a.jpg"}"#),
            Err(GalleryError::InvalidManifest)
        ));
        assert!(matches!(
            Manifest::from_json("[not json"),
            Err(GalleryError::Json(_))
        ));
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let manifest = Manifest::from_json(
            r#"[{"title":"Dawn","src":"dawn.jpg","imgDir":"/images/","featured":true}]"#,
        )
        .unwrap();
        assert_eq!(manifest.entries[0].extra.get("featured"), Some(&json!(true)));

        let json = manifest.to_json().unwrap();
        assert!(json.ends_with("]\n"));
        assert!(json.contains("\"featured\": true"));
        assert!(!json.contains("linkToAuthor"));
        assert!(!json.contains("\"date\""));
    }

    #[test]
    fn odd_field_values_do_not_break_loading() {
        let manifest = Manifest::from_json(
            r#"[
                {"src": "a.jpg", "date": null, "title": 1999, "credit": true},
                {"src": "b.jpg", "tags": "sea, sky", "imgDir": null},
                {"src": null, "tags": ["x", 2, null]}
            ]"#,
        )
        .unwrap();

        let a = &manifest.entries[0];
        assert_eq!(a.date, None);
        assert_eq!(a.title.as_deref(), Some("1999"));
        assert_eq!(a.credit.as_deref(), Some("true"));

        let b = &manifest.entries[1];
        assert_eq!(b.tags, Some(vec!["sea".to_string(), "sky".to_string()]));
        assert_eq!(b.img_dir(), "/images/");

        let c = &manifest.entries[2];
        assert_eq!(c.src, "");
        assert_eq!(c.tags, Some(vec!["x".to_string(), "2".to_string()]));
    }

    #[test]
    fn absent_fields_stay_absent_on_rewrite() {
        let manifest = Manifest::from_json(r#"[{"src": "a.jpg"}]"#).unwrap();
        let value: Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(value, json!([{ "src": "a.jpg" }]));
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&temp.path().join("gallery.json")).await.unwrap();
        assert!(manifest.entries.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_leaves_no_temp_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("_data").join("gallery.json");

        let mut manifest = Manifest::default();
        manifest.push(entry("a.jpg")).unwrap();
        manifest.push(entry("b.jpg")).unwrap();
        manifest.save(&path).await.unwrap();

        let loaded = Manifest::load(&path).await.unwrap();
        assert_eq!(loaded, manifest);

        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("gallery.json")]);
    }

    #[test]
    fn push_rejects_duplicates_and_remove_keeps_order() {
        let mut manifest = Manifest::default();
        for src in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            manifest.push(entry(src)).unwrap();
        }
        assert!(matches!(
            manifest.push(entry("b.jpg")),
            Err(GalleryError::Duplicate(_))
        ));

        assert!(matches!(
            manifest.push(entry("b.png")),
            Err(GalleryError::StemConflict { existing, .. }) if existing == "b.jpg"
        ));

        let removed = manifest.remove_sources(&["c.jpg".to_string(), "a.jpg".to_string()]);
        assert_eq!(removed.len(), 2);
        let left: Vec<_> = manifest.entries.iter().map(|e| e.src.as_str()).collect();
        assert_eq!(left, vec!["b.jpg", "d.jpg"]);
    }

    #[test]
    fn new_image_fills_title_and_alt_from_each_other() {
        let from_alt = NewImage {
            src: "harbour-night.jpg".to_string(),
            alt: Some("  Boats at night ".to_string()),
            ..Default::default()
        }
        .into_entry("/images/".to_string());
        assert_eq!(from_alt.title.as_deref(), Some("Boats at night"));
        assert_eq!(from_alt.alt.as_deref(), Some("Boats at night"));

        let bare = NewImage {
            src: "harbour-night.jpg".to_string(),
            title: Some("   ".to_string()),
            ..Default::default()
        }
        .into_entry("/images/".to_string());
        assert_eq!(bare.title.as_deref(), Some("harbour-night"));
        assert_eq!(bare.alt.as_deref(), Some("harbour-night"));
        assert_eq!(bare.tags, None);
    }

    #[test]
    fn update_falls_back_to_existing_values() {
        let mut current = entry("fuji.jpg");
        current.title = Some("Fuji".to_string());
        current.credit = Some("K. Ito".to_string());
        current.tags = Some(vec!["mountain".to_string()]);

        let update = MetadataUpdate {
            title: Some("".to_string()),
            credit: Some(" Someone Else ".to_string()),
            img_dir: Some("images/japan".to_string()),
            ..Default::default()
        };
        let updated = update.apply(&current).unwrap();

        assert_eq!(updated.title.as_deref(), Some("Fuji"));
        assert_eq!(updated.alt.as_deref(), Some("Fuji"));
        assert_eq!(updated.credit.as_deref(), Some("Someone Else"));
        assert_eq!(updated.date.as_deref(), Some(""));
        assert_eq!(updated.img_dir.as_deref(), Some("/images/japan/"));
        assert_eq!(updated.tags, Some(vec!["mountain".to_string()]));
        assert_eq!(updated.src, "fuji.jpg");
    }

    #[test]
    fn update_rejects_bad_dir() {
        let update = MetadataUpdate {
            img_dir: Some("/etc/".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update.apply(&entry("x.jpg")),
            Err(GalleryError::InvalidImageDir(_))
        ));
    }

    #[test]
    fn tags_accept_arrays_json_strings_and_csv() {
        assert_eq!(
            normalise_tags(&json!([" sea ", "", "sky", "sea", 3])),
            vec!["sea", "sky"]
        );
        assert_eq!(normalise_tags(&json!(r#"["night","city"]"#)), vec!["night", "city"]);
        assert_eq!(normalise_tags(&json!("night, city ,, ")), vec!["night", "city"]);
        assert!(normalise_tags(&json!(null)).is_empty());
    }
}
