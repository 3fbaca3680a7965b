use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_WIDTHS: [u32; 4] = [300, 480, 640, 1024];
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_URL_PATH: &str = "/img/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    Webp,
    Jpeg,
}

impl DerivativeFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DerivativeConfig {
    pub widths: Vec<u32>,
    pub formats: Vec<DerivativeFormat>,
    pub jpeg_quality: u8,
    pub url_path: String,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            widths: DEFAULT_WIDTHS.to_vec(),
            formats: vec![DerivativeFormat::Webp, DerivativeFormat::Jpeg],
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            url_path: DEFAULT_URL_PATH.to_string(),
        }
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Derivative {
    pub format: DerivativeFormat,
    pub width: u32,
    pub height: u32,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// Write every configured width/format pair for `source` into `output_dir`.
pub fn generate_derivatives(
    source: &Path,
    output_dir: &Path,
    config: &DerivativeConfig,
) -> Result<Vec<Derivative>> {
    tracing::info!("Generating derivatives for {}", source.display());

    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    let stem = crate::manifest::base_name(&source.to_string_lossy());

    fs::create_dir_all(output_dir)?;

    let mut derivatives = Vec::new();
    for target_width in effective_widths(width, &config.widths) {
        let resized = resize_to_width(&img, target_width);
        let target_height = resized.height();

        for &format in &config.formats {
            let bytes = match format {
                DerivativeFormat::Jpeg => encode_jpeg(&resized, config.jpeg_quality)?,
                DerivativeFormat::Webp => encode_webp(&resized)?,
            };

            let filename = format!("{stem}-{target_width}.{}", format.extension());
            fs::write(output_dir.join(&filename), &bytes)?;
            tracing::debug!("Wrote {} ({} bytes)", filename, bytes.len());

            derivatives.push(Derivative {
                format,
                width: target_width,
                height: target_height,
                url: format!("{}{filename}", config.url_path),
                filename,
                size: bytes.len() as u64,
            });
        }
    }

    Ok(derivatives)
}

/// Delete the derivatives generated for `src`, returning how many were removed.
pub fn remove_derivatives(src: &str, output_dir: &Path) -> Result<usize> {
    let stem = crate::manifest::base_name(src);
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        if !is_derivative_of(&stem, &name.to_string_lossy()) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Unable to remove derivative {:?}: {}", name, e),
        }
    }

    tracing::debug!("Removed {} derivatives for {}", removed, src);
    Ok(removed)
}

/// Widths to generate for a source of `source_width` pixels; never upscales.
pub fn effective_widths(source_width: u32, widths: &[u32]) -> Vec<u32> {
    let mut selected: Vec<u32> = widths
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= source_width)
        .collect();
    selected.sort_unstable();
    selected.dedup();

    if selected.is_empty() {
        selected.push(source_width);
    }
    selected
}

fn is_derivative_of(stem: &str, filename: &str) -> bool {
    let Some(rest) = filename
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };
    match rest.split_once('.') {
        Some((width, _ext)) => !width.is_empty() && width.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn resize_to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if target_width == width {
        return img.clone();
    }

    let target_height = ((height as f64 * target_width as f64) / width as f64)
        .round()
        .max(1.0) as u32;
    img.resize_exact(target_width, target_height, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;

    Ok(buffer.into_inner())
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let pixels = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    pixels.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?;

    Ok(buffer.into_inner())
}

pub fn is_image_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        matches!(
            ext.to_str().unwrap_or("").to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "gif" | "tif" | "tiff"
        )
    } else {
        false
    }
}
