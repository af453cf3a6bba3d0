// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image source loading.
//!
//! A source is a local file path, a `data:` URI with a base64 payload, or an
//! http(s) URL. The source string also identifies the image for persistence.

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::time::Duration;

const USER_AGENT: &str = concat!("clinic-annotator/", env!("CARGO_PKG_VERSION"));

/// How a source string is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Path,
    DataUri,
    Url,
}

pub fn classify(source: &str) -> SourceKind {
    let lower = source.trim_start().to_ascii_lowercase();
    if lower.starts_with("data:") {
        SourceKind::DataUri
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        SourceKind::Url
    } else {
        SourceKind::Path
    }
}

/// Base name for exports when the host does not supply one.
pub fn default_filename(source: &str) -> String {
    let name = match classify(source) {
        SourceKind::DataUri => None,
        SourceKind::Url => source
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .and_then(|last| Path::new(last).file_stem())
            .and_then(|stem| stem.to_str())
            .map(str::to_string),
        SourceKind::Path => Path::new(source)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned()),
    };
    name.filter(|n| !n.is_empty()).unwrap_or_else(|| "image".to_string())
}

/// Decoded image ready for display and export.
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl From<DynamicImage> for LoadedImage {
    fn from(image: DynamicImage) -> Self {
        let pixels = image.to_rgba8();
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        }
    }
}

/// Load and decode the image a source refers to.
pub fn load_image(source: &str) -> Result<LoadedImage> {
    let image = match classify(source) {
        SourceKind::Path => image::open(Path::new(source))
            .with_context(|| format!("Failed to open image {}", source))?,
        SourceKind::DataUri => decode_bytes(&decode_data_uri(source)?)?,
        SourceKind::Url => decode_bytes(&fetch_bytes(source)?)?,
    };
    Ok(image.into())
}

/// Read the raw bytes of a source again, bypassing any decoded copy.
pub fn refetch(source: &str) -> Result<LoadedImage> {
    let bytes = match classify(source) {
        SourceKind::Path => std::fs::read(source)
            .with_context(|| format!("Failed to read {}", source))?,
        SourceKind::DataUri => decode_data_uri(source)?,
        SourceKind::Url => fetch_bytes(source)?,
    };
    Ok(decode_bytes(&bytes)?.into())
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to decode image data")
}

/// Payload of a `data:[<mime>][;base64],<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .trim()
        .get(5..)
        .ok_or_else(|| anyhow!("Not a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URI has no payload"))?;
    if !meta.ends_with(";base64") {
        bail!("Only base64 data URIs are supported");
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .context("Invalid base64 payload in data URI")
}

/// Download a URL.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Request to {} failed", url))?;
    let status = response.status();
    if !status.is_success() {
        bail!("Fetching {} returned HTTP {}", url, status);
    }
    let bytes = response.bytes().context("Failed to read response body")?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("data:image/png;base64,AAAA"), SourceKind::DataUri);
        assert_eq!(classify("HTTPS://example.org/a.png"), SourceKind::Url);
        assert_eq!(classify("/tmp/scan.png"), SourceKind::Path);
        assert_eq!(classify("C:\\scans\\a.png"), SourceKind::Path);
    }

    #[test]
    fn test_default_filename() {
        assert_eq!(default_filename("/tmp/scans/xray-01.png"), "xray-01");
        assert_eq!(default_filename("https://example.org/img/scan.jpg?size=2"), "scan");
        assert_eq!(default_filename("https://example.org/"), "image");
        assert_eq!(default_filename("data:image/png;base64,AAAA"), "image");
    }

    #[test]
    fn test_data_uri_source() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes());
        let uri = format!("data:image/png;base64,{encoded}");
        let loaded = load_image(&uri).unwrap();
        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(loaded.pixels.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_rejects_non_base64_data_uri() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn test_path_source_and_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, png_bytes()).unwrap();
        let source = path.to_string_lossy().to_string();

        assert_eq!(load_image(&source).unwrap().width, 3);
        assert_eq!(refetch(&source).unwrap().height, 2);
        assert!(load_image(&dir.path().join("missing.png").to_string_lossy()).is_err());
    }
}
