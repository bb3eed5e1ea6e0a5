use std::{io::Cursor, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};

/// Frames below this size are blank or truncated grabs.
pub const MIN_FRAME_BYTES: usize = 1000;

const JPEG_QUALITY: u8 = 95;

/// A grabbed frame. Lives only between grab and submission.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub bytes: Arc<Vec<u8>>,
    pub captured_at: DateTime<Utc>,
}

impl CaptureFrame {
    pub fn new(bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            captured_at,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decodes any supported image format and re-encodes it as a JPEG, which is
/// what the recognition backend expects.
pub fn normalize_to_jpeg(raw: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(raw).context("failed to decode captured frame")?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Cursor::new(Vec::with_capacity(raw.len()));
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .context("failed to encode frame as JPEG")?;
    Ok(buffer.into_inner())
}
