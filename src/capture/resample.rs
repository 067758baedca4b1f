use super::stitch::StitchCanvas;
use crate::core::constants::{CAPTURE_FILENAME, CAPTURE_MIME_TYPE};
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Final encoded image of a captured map region
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub filename: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl CapturedImage {
    /// Decodes the PNG again, mostly useful for inspection and tests
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes).map_err(|e| Error::Encoding(e.to_string()))
    }
}

/// Scales `canvas` to `target_size` with a bilinear filter and encodes it as PNG
/// named `map-view.png`.
pub fn resample(canvas: StitchCanvas, target_size: (u32, u32)) -> Result<CapturedImage> {
    let (width, height) = target_size;
    if width == 0 || height == 0 {
        return Err(Error::Encoding(format!(
            "cannot resample to {}x{}",
            width, height
        )));
    }

    let scaled = if canvas.dimensions() == target_size {
        canvas.image
    } else {
        imageops::resize(&canvas.image, width, height, FilterType::Triangle)
    };

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(scaled)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| Error::Encoding(e.to_string()))?;

    if bytes.is_empty() {
        return Err(Error::Encoding("encoder produced no data".into()));
    }

    Ok(CapturedImage {
        filename: CAPTURE_FILENAME.to_string(),
        mime_type: CAPTURE_MIME_TYPE.to_string(),
        width,
        height,
        bytes,
    })
}
