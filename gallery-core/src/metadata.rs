//! Camera metadata extraction for the `exif.json` side-file.
//!
//! Raw EXIF fields are read with `kamadak-exif` into [`RawExif`], then
//! formatted into the short human strings the site templates display.

use exif::{In, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::ProjectPaths;
use crate::error::Result;
use crate::manifest::GalleryEntry;
use crate::sidecar::OrderedIndex;

/// Display-ready camera details for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifSummary {
    pub model: Option<String>,
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub flash: Option<String>,
}

/// The subset of EXIF fields the summary is built from.
#[derive(Debug, Clone, Default)]
pub struct RawExif {
    pub model: Option<String>,
    pub lens_model: Option<String>,
    pub lens_make: Option<String>,
    pub focal_length: Option<f64>,
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
    pub exposure_program: Option<u32>,
    pub metering_mode: Option<u32>,
    pub exif_width: Option<u32>,
    pub exif_height: Option<u32>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub x_resolution: Option<f64>,
    pub y_resolution: Option<f64>,
    pub resolution_unit: Option<u32>,
    pub flash: Option<String>,
}

impl RawExif {
    pub fn from_exif(exif: &exif::Exif) -> Self {
        let field = |tag: Tag| exif.get_field(tag, In::PRIMARY);
        let text = |tag: Tag| field(tag).and_then(|f| ascii_value(&f.value));
        let number = |tag: Tag| field(tag).and_then(|f| rational_value(&f.value));
        let uint = |tag: Tag| field(tag).and_then(|f| f.value.get_uint(0));

        Self {
            model: text(Tag::Model),
            lens_model: text(Tag::LensModel),
            lens_make: text(Tag::LensMake),
            focal_length: number(Tag::FocalLength),
            exposure_time: number(Tag::ExposureTime),
            f_number: number(Tag::FNumber),
            iso: uint(Tag::PhotographicSensitivity),
            exposure_program: uint(Tag::ExposureProgram),
            metering_mode: uint(Tag::MeteringMode),
            exif_width: uint(Tag::PixelXDimension),
            exif_height: uint(Tag::PixelYDimension),
            image_width: uint(Tag::ImageWidth),
            image_height: uint(Tag::ImageLength),
            x_resolution: number(Tag::XResolution),
            y_resolution: number(Tag::YResolution),
            resolution_unit: uint(Tag::ResolutionUnit),
            flash: field(Tag::Flash).map(|f| f.display_value().to_string()),
        }
    }

    pub fn summarize(&self) -> ExifSummary {
        ExifSummary {
            model: self.model.clone(),
            lens: self.lens_model.clone().or_else(|| self.lens_make.clone()),
            focal_length: format_focal_length(self.focal_length),
            exposure: format_exposure(self),
            image_size: format_image_size(self),
            resolution: format_resolution(self),
            flash: self.flash.clone(),
        }
    }
}

/// Read and summarise the EXIF block of `path`; `None` when the file carries none.
pub fn extract_exif(path: &Path) -> Result<Option<ExifSummary>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(&file);

    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(RawExif::from_exif(&exif).summarize())),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Build the `src -> summary` map for every entry that has EXIF data.
pub fn build_exif_index(
    paths: &ProjectPaths,
    entries: &[GalleryEntry],
) -> OrderedIndex<ExifSummary> {
    let mut index = OrderedIndex::new();

    for entry in entries.iter().filter(|e| !e.src.is_empty()) {
        let location = match entry.location(paths) {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.src, e);
                continue;
            }
        };

        match extract_exif(&location.absolute_path) {
            Ok(Some(summary)) => {
                index.push(entry.src.clone(), summary);
            }
            Ok(None) => tracing::warn!("No EXIF metadata found for {}", entry.src),
            Err(e) => tracing::warn!("Failed to extract EXIF for {}: {}", entry.src, e),
        }
    }

    index
}

pub fn exposure_program_label(value: u32) -> Option<&'static str> {
    Some(match value {
        0 => "Not defined",
        1 => "Manual",
        2 => "Normal Program",
        3 => "Aperture Priority",
        4 => "Shutter Priority",
        5 => "Creative Program",
        6 => "Action Program",
        7 => "Portrait Mode",
        8 => "Landscape Mode",
        _ => return None,
    })
}

pub fn metering_mode_label(value: u32) -> Option<&'static str> {
    Some(match value {
        0 => "Unknown",
        1 => "Average",
        2 => "Center-weighted average",
        3 => "Spot",
        4 => "Multi-spot",
        5 => "Pattern",
        6 => "Partial",
        255 => "Other",
        _ => return None,
    })
}

fn resolution_unit_label(value: Option<u32>) -> &'static str {
    match value {
        Some(1) => "px",
        Some(3) => "ppcm",
        _ => "ppi",
    }
}

pub fn format_shutter(exposure_time: Option<f64>) -> Option<String> {
    let value = exposure_time.filter(|v| *v > 0.0)?;
    if value >= 1.0 {
        Some(format!("{} s", trim_number(value, 1)))
    } else {
        Some(format!("1/{}", (1.0 / value).round()))
    }
}

pub fn format_f_number(f_number: Option<f64>) -> Option<String> {
    let value = f_number.filter(|v| *v > 0.0)?;
    let precision = if value < 10.0 { 1 } else { 0 };
    Some(format!("f/{}", trim_number(value, precision)))
}

pub fn format_focal_length(focal_length: Option<f64>) -> Option<String> {
    let value = focal_length.filter(|v| *v > 0.0)?;
    Some(format!("{}mm", value.round()))
}

fn format_exposure(raw: &RawExif) -> Option<String> {
    let mut parts = Vec::new();

    parts.extend(format_shutter(raw.exposure_time));
    parts.extend(format_f_number(raw.f_number));
    if let Some(iso) = raw.iso.filter(|iso| *iso > 0) {
        parts.push(format!("ISO {iso}"));
    }
    if let Some(program) = raw.exposure_program.and_then(exposure_program_label) {
        if program != "Not defined" {
            parts.push(program.to_string());
        }
    }
    if let Some(metering) = raw.metering_mode.and_then(metering_mode_label) {
        if metering != "Unknown" {
            parts.push(metering.to_string());
        }
    }

    (!parts.is_empty()).then(|| parts.join(", "))
}

fn format_image_size(raw: &RawExif) -> Option<String> {
    let width = raw.exif_width.filter(|w| *w > 0).or(raw.image_width)?;
    let height = raw.exif_height.filter(|h| *h > 0).or(raw.image_height)?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(format!("{width} x {height}"))
}

fn format_resolution(raw: &RawExif) -> Option<String> {
    let resolution = raw
        .x_resolution
        .filter(|r| *r > 0.0)
        .or(raw.y_resolution)
        .filter(|r| r.is_finite() && *r > 0.0)?;
    Some(format!(
        "{} {}",
        resolution.round(),
        resolution_unit_label(raw.resolution_unit)
    ))
}

/// Fixed-precision formatting with trailing zeros dropped (`2.0` -> `2`).
fn trim_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(strings) => strings
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches(['\0', ' ']).to_string())
            .find(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational_value(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(values) => values.first().map(|r| r.to_f64()),
        Value::SRational(values) => values.first().map(|r| r.to_f64()),
        other => other.get_uint(0).map(f64::from),
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawExif {
        RawExif {
            model: Some("X-T4".to_string()),
            lens_make: Some("FUJIFILM".to_string()),
            focal_length: Some(23.4),
            exposure_time: Some(1.0 / 250.0),
            f_number: Some(2.8),
            iso: Some(400),
            exposure_program: Some(3),
            metering_mode: Some(5),
            exif_width: Some(6240),
            exif_height: Some(4160),
            x_resolution: Some(72.0),
            resolution_unit: Some(2),
            flash: Some("not fired".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn summary_formats_every_field() {
        let summary = sample().summarize();

        assert_eq!(summary.model.as_deref(), Some("X-T4"));
        assert_eq!(summary.lens.as_deref(), Some("FUJIFILM"));
        assert_eq!(summary.focal_length.as_deref(), Some("23mm"));
        assert_eq!(
            summary.exposure.as_deref(),
            Some("1/250, f/2.8, ISO 400, Aperture Priority, Pattern")
        );
        assert_eq!(summary.image_size.as_deref(), Some("6240 x 4160"));
        assert_eq!(summary.resolution.as_deref(), Some("72 ppi"));
        assert_eq!(summary.flash.as_deref(), Some("not fired"));
    }

    #[test]
    fn lens_model_wins_over_make() {
        let raw = RawExif {
            lens_model: Some("XF23mmF2 R WR".to_string()),
            ..sample()
        };
        assert_eq!(raw.summarize().lens.as_deref(), Some("XF23mmF2 R WR"));
    }

    #[test]
    fn shutter_and_aperture_formats() {
        assert_eq!(format_shutter(Some(2.0)).as_deref(), Some("2 s"));
        assert_eq!(format_shutter(Some(1.6)).as_deref(), Some("1.6 s"));
        assert_eq!(format_shutter(Some(0.3)).as_deref(), Some("1/3"));
        assert_eq!(format_shutter(Some(0.0)), None);
        assert_eq!(format_f_number(Some(8.0)).as_deref(), Some("f/8"));
        assert_eq!(format_f_number(Some(1.4)).as_deref(), Some("f/1.4"));
        assert_eq!(format_f_number(Some(11.3)).as_deref(), Some("f/11"));
        assert_eq!(format_f_number(None), None);
    }

    #[test]
    fn neutral_program_and_metering_are_dropped() {
        let raw = RawExif {
            exposure_program: Some(0),
            metering_mode: Some(0),
            exposure_time: None,
            f_number: None,
            iso: None,
            ..sample()
        };
        assert_eq!(raw.summarize().exposure, None);
    }

    #[test]
    fn image_size_falls_back_to_primary_dimensions() {
        let raw = RawExif {
            exif_width: None,
            exif_height: None,
            image_width: Some(3000),
            image_height: Some(2000),
            x_resolution: None,
            y_resolution: Some(118.11),
            resolution_unit: Some(3),
            ..sample()
        };
        let summary = raw.summarize();
        assert_eq!(summary.image_size.as_deref(), Some("3000 x 2000"));
        assert_eq!(summary.resolution.as_deref(), Some("118 ppcm"));
    }

    #[test]
    fn absent_optional_fields_are_not_serialized() {
        let json = serde_json::to_value(ExifSummary::default()).unwrap();
        let object = json.as_object().unwrap();

        assert!(object["model"].is_null());
        assert!(object["flash"].is_null());
        assert!(!object.contains_key("exposure"));
    }

    #[test]
    fn image_without_exif_yields_none() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("plain.jpg");
        image::RgbImage::new(16, 16).save(&path).unwrap();

        assert_eq!(extract_exif(&path).unwrap(), None);
    }

    #[test]
    fn index_skips_missing_and_exifless_images() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path());
        std::fs::create_dir_all(&paths.images_root).unwrap();
        image::RgbImage::new(8, 8)
            .save(paths.images_root.join("plain.jpg"))
            .unwrap();

        let manifest = crate::manifest::Manifest::from_json(
            r#"[{"src": "plain.jpg"}, {"src": "missing.jpg"}, {"src": ""}]"#,
        )
        .unwrap();

        assert!(build_exif_index(&paths, &manifest.entries).is_empty());
    }

    #[test]
    fn index_ignores_entries_outside_the_images_root() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path());
        let assets = temp.path().join("src/assets");
        std::fs::create_dir_all(&assets).unwrap();
        image::RgbImage::new(8, 8).save(assets.join("logo.jpg")).unwrap();

        let manifest = crate::manifest::Manifest::from_json(
            r#"[{"src": "logo.jpg", "imgDir": "/assets/"}]"#,
        )
        .unwrap();

        assert!(manifest.entries[0].location(&paths).is_err());
        assert!(build_exif_index(&paths, &manifest.entries).is_empty());
    }
}
