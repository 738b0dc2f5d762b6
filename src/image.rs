// Snapshot container and image encoding.
//
// `Snapshot::save()` dispatches by file extension:
// - Standard formats (png, bmp, jpg, tiff): `basic` submodule via `image` crate.
//   RGBA16F frames are converted from linear scRGB to 8-bit sRGB first.
// - OpenEXR (.exr): `exr` submodule, both formats, no conversion for RGBA16F.

pub mod basic;
pub mod exr;

use std::path::Path;

use crate::capture::PixelFormat;
use crate::error::{CaptureError, Result};

/// CPU copy of a presented frame. Rows are tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Snapshot {
    /// Wrap raw pixels, checking the buffer holds exactly `width * height` pixels.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(CaptureError::InvalidArgument(format!(
                "snapshot buffer is {} bytes, {width}x{height} {format} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Save to file. Format is determined by extension.
    ///
    /// Supported extensions:
    /// - `.png`: PNG (lossless)
    /// - `.bmp`: BMP (lossless)
    /// - `.jpg` / `.jpeg`: JPEG (lossy, alpha dropped)
    /// - `.tiff` / `.tif`: TIFF (lossless)
    /// - `.exr`: OpenEXR (lossless, keeps HDR values of RGBA16F frames)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "exr" => exr::save_exr(path, self)?,
            "png" | "bmp" | "jpg" | "jpeg" | "tiff" | "tif" => basic::save(path, self)?,
            _ => {
                return Err(CaptureError::InvalidArgument(format!(
                    "unsupported extension '.{ext}'; supported: .png .bmp .jpg .tiff .exr"
                )))
            }
        }
        tracing::debug!("snapshot {}x{} saved to {}", self.width, self.height, path.display());
        Ok(())
    }
}
