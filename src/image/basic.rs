// Standard image format encoding via the `image` crate.
//
// - PNG  (lossless)
// - BMP  (lossless)
// - JPEG (lossy)
// - TIFF (lossless)
//
// BGRA8 frames are written as-is after a channel swap. RGBA16F frames hold
// linear scRGB half floats and are clipped and sRGB-encoded to 8 bits.

use std::path::Path;

use anyhow::{bail, Context, Result};
use half::f16;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use super::Snapshot;
use crate::capture::PixelFormat;

/// SDR format variants handled by the `image` crate.
enum SdrFormat {
    Png,
    Bmp,
    Jpeg,
    Tiff,
}

/// Save a snapshot using the `image` crate.
///
/// The target format is inferred from the file extension.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let sdr_fmt = match ext.as_str() {
        "png" => SdrFormat::Png,
        "bmp" => SdrFormat::Bmp,
        "jpg" | "jpeg" => SdrFormat::Jpeg,
        "tiff" | "tif" => SdrFormat::Tiff,
        _ => bail!("basic: unsupported extension '.{}'", ext),
    };

    let rgba = to_rgba8(snapshot);
    let (width, height) = (snapshot.width, snapshot.height);

    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    match sdr_fmt {
        SdrFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(writer, CompressionType::Fast, FilterType::Sub);
            encoder.write_image(&rgba, width, height, ExtendedColorType::Rgba8)?;
        }
        SdrFormat::Jpeg => {
            // JPEG doesn't support alpha; strip to RGB
            let rgb: Vec<u8> = rgba
                .chunks_exact(4)
                .flat_map(|px| &px[..3])
                .copied()
                .collect();
            image::write_buffer_with_format(
                &mut writer,
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
                ImageFormat::Jpeg,
            )?;
        }
        SdrFormat::Bmp | SdrFormat::Tiff => {
            let img_fmt = if matches!(sdr_fmt, SdrFormat::Bmp) {
                ImageFormat::Bmp
            } else {
                ImageFormat::Tiff
            };
            image::write_buffer_with_format(
                &mut writer,
                &rgba,
                width,
                height,
                ExtendedColorType::Rgba8,
                img_fmt,
            )?;
        }
    }

    Ok(())
}

/// Convert snapshot pixels to tightly packed RGBA8.
pub fn to_rgba8(snapshot: &Snapshot) -> Vec<u8> {
    match snapshot.format {
        PixelFormat::Bgra8 => {
            // BGRA → RGBA
            let mut rgba = snapshot.data.clone();
            for pixel in rgba.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
            rgba
        }
        PixelFormat::Rgba16f => snapshot
            .data
            .chunks_exact(8)
            .flat_map(|px| {
                let channel = |i: usize| f16::from_le_bytes([px[i * 2], px[i * 2 + 1]]).to_f32();
                [
                    encode_srgb(channel(0)),
                    encode_srgb(channel(1)),
                    encode_srgb(channel(2)),
                    (channel(3).clamp(0.0, 1.0) * 255.0).round() as u8,
                ]
            })
            .collect(),
    }
}

/// Linear → sRGB transfer, clipped to [0, 1].
fn encode_srgb(linear: f32) -> u8 {
    let v = if linear.is_nan() { 0.0 } else { linear.clamp(0.0, 1.0) };
    let encoded = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}
