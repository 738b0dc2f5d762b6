// OpenEXR (.exr) encoding via the `exr` crate.
//
// Supports both BGRA8 (SDR) and RGBA16F (HDR) pixel data.
// EXR keeps scRGB values above 1.0, so it is the lossless choice for HDR frames.

use std::path::Path;

use anyhow::{Context, Result};
use exr::prelude::*;

use super::Snapshot;
use crate::capture::PixelFormat;

/// Save a snapshot as OpenEXR (.exr) file.
///
/// - `Bgra8`: converted to `f32` RGBA channels (0.0–1.0).
/// - `Rgba16f`: written as `f16` RGBA channels (native half-float).
pub fn save_exr(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let (w, h) = (snapshot.width as usize, snapshot.height as usize);

    match snapshot.format {
        PixelFormat::Bgra8 => save_bgra8(path, &snapshot.data, w, h),
        PixelFormat::Rgba16f => save_rgba16f(path, &snapshot.data, w, h),
    }
}

/// Write BGRA8 data as f32 RGBA EXR.
fn save_bgra8(path: &Path, data: &[u8], w: usize, h: usize) -> Result<()> {
    let channels = SpecificChannels::rgba(|Vec2(x, y)| {
        let offset = (y * w + x) * 4;
        let b = data[offset] as f32 / 255.0;
        let g = data[offset + 1] as f32 / 255.0;
        let r = data[offset + 2] as f32 / 255.0;
        let a = data[offset + 3] as f32 / 255.0;
        (r, g, b, a)
    });

    let image = Image::from_channels((w, h), channels);
    image
        .write()
        .to_file(path)
        .context("failed to write EXR (BGRA8)")?;

    Ok(())
}

/// Write RGBA16F data as f16 RGBA EXR.
fn save_rgba16f(path: &Path, data: &[u8], w: usize, h: usize) -> Result<()> {
    // Decoded up front; readback buffers carry no alignment guarantee for f16.
    let pixels: Vec<f16> = data
        .chunks_exact(2)
        .map(|b| f16::from_le_bytes([b[0], b[1]]))
        .collect();

    let channels = SpecificChannels::rgba(|Vec2(x, y)| {
        let offset = (y * w + x) * 4;
        (
            pixels[offset],
            pixels[offset + 1],
            pixels[offset + 2],
            pixels[offset + 3],
        )
    });

    let image = Image::from_channels((w, h), channels);
    image
        .write()
        .to_file(path)
        .context("failed to write EXR (RGBA16F)")?;

    Ok(())
}
