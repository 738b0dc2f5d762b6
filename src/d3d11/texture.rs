// Texture creation, region copy and CPU readback.

use anyhow::{bail, Context, Result};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::capture::{ContentSize, PixelFormat};
use crate::image::Snapshot;

/// A D3D11 2D texture as handed around by the pipeline.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct D3D11Texture(pub ID3D11Texture2D);

// SAFETY: D3D11 resources are free-threaded; all context work on them goes
// through the multithread-protected immediate context.
unsafe impl Send for D3D11Texture {}
unsafe impl Sync for D3D11Texture {}

impl D3D11Texture {
    pub fn desc(&self) -> D3D11_TEXTURE2D_DESC {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        // SAFETY: GetDesc only writes the out struct.
        unsafe { self.0.GetDesc(&mut desc) };
        desc
    }
}

pub fn dxgi_format(format: PixelFormat) -> DXGI_FORMAT {
    DXGI_FORMAT(format.raw() as i32)
}

pub fn pixel_format(format: DXGI_FORMAT) -> Option<PixelFormat> {
    PixelFormat::from_raw(format.0 as u32)
}

/// Create a default-usage texture with the given bind flags.
pub fn create_texture(
    device: &ID3D11Device,
    width: u32,
    height: u32,
    format: DXGI_FORMAT,
    bind_flags: u32,
) -> Result<D3D11Texture> {
    let desc = D3D11_TEXTURE2D_DESC {
        Width: width,
        Height: height,
        MipLevels: 1,
        ArraySize: 1,
        Format: format,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Usage: D3D11_USAGE_DEFAULT,
        BindFlags: bind_flags,
        CPUAccessFlags: 0,
        MiscFlags: 0,
    };

    // SAFETY: desc is fully initialized; CreateTexture2D allocates a GPU resource.
    let texture = unsafe {
        let mut tex = None;
        device
            .CreateTexture2D(&desc, None, Some(&mut tex))
            .context("CreateTexture2D failed")?;
        tex.context("CreateTexture2D returned no texture")?
    };
    Ok(D3D11Texture(texture))
}

/// Copy the `region` rectangle at the origin of `src` to the origin of `dst`.
///
/// The region is clamped to both textures: right after a resize the pool can
/// still hand out a surface allocated at the previous size.
pub fn copy_region(
    context: &ID3D11DeviceContext,
    dst: &D3D11Texture,
    src: &D3D11Texture,
    region: ContentSize,
) -> Result<()> {
    let d = dst.desc();
    let s = src.desc();
    if d.Format != s.Format {
        bail!(
            "copy between mismatched formats ({} -> {})",
            s.Format.0,
            d.Format.0
        );
    }

    let right = region.width_u32().min(d.Width).min(s.Width);
    let bottom = region.height_u32().min(d.Height).min(s.Height);

    // SAFETY: both textures are live resources on this device with the same format.
    unsafe {
        if (d.Width, d.Height) == (s.Width, s.Height) && (right, bottom) == (s.Width, s.Height) {
            context.CopyResource(&dst.0, &src.0);
        } else {
            let src_box = D3D11_BOX {
                left: 0,
                top: 0,
                front: 0,
                right,
                bottom,
                back: 1,
            };
            context.CopySubresourceRegion(&dst.0, 0, 0, 0, 0, &src.0, 0, Some(&src_box));
        }
    }
    Ok(())
}

struct StagingCache {
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
    format: DXGI_FORMAT,
}

/// Reads GPU textures back to CPU memory through a reused staging texture.
pub struct TextureReader {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    staging: Option<StagingCache>,
}

impl TextureReader {
    pub fn new(device: ID3D11Device, context: ID3D11DeviceContext) -> Self {
        Self {
            device,
            context,
            staging: None,
        }
    }

    /// Ensure the staging texture exists and matches size and format.
    fn ensure_staging(&mut self, width: u32, height: u32, format: DXGI_FORMAT) -> Result<ID3D11Texture2D> {
        if let Some(cache) = &self.staging {
            if cache.width == width && cache.height == height && cache.format == format {
                return Ok(cache.texture.clone());
            }
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: format,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        // SAFETY: desc is fully initialized; CreateTexture2D allocates a staging resource.
        let texture = unsafe {
            let mut texture = None;
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .context("Failed to create staging texture")?;
            texture.context("CreateTexture2D returned no staging texture")?
        };

        self.staging = Some(StagingCache {
            texture: texture.clone(),
            width,
            height,
            format,
        });
        Ok(texture)
    }

    /// Copy `source` to CPU memory with tightly packed rows.
    pub fn read(&mut self, source: &D3D11Texture) -> crate::error::Result<Snapshot> {
        let desc = source.desc();
        let format = pixel_format(desc.Format)
            .with_context(|| format!("unsupported readback format {}", desc.Format.0))?;
        let staging = self.ensure_staging(desc.Width, desc.Height, desc.Format)?;

        let row_bytes = desc.Width as usize * format.bytes_per_pixel();
        let rows = desc.Height as usize;
        let mut data = Vec::with_capacity(row_bytes * rows);

        // SAFETY: staging matches source in size and format; the mapped pointer is
        // valid for RowPitch * Height bytes until Unmap.
        unsafe {
            self.context.CopyResource(&staging, &source.0);

            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            self.context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .context("Failed to map staging texture")?;

            // Drop the per-row padding the driver adds.
            let base = mapped.pData as *const u8;
            let pitch = mapped.RowPitch as usize;
            for y in 0..rows {
                let row = std::slice::from_raw_parts(base.add(y * pitch), row_bytes);
                data.extend_from_slice(row);
            }

            self.context.Unmap(&staging, 0);
        }

        Snapshot::new(data, desc.Width, desc.Height, format)
    }
}
