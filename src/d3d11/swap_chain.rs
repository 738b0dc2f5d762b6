// DXGI flip-model swap chain for composition, plus its composition surface.

use anyhow::{Context, Result};
use windows::core::Interface;
use windows::UI::Composition::{Compositor, ICompositionSurface};
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11Texture2D};
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::WinRT::Composition::ICompositorInterop;

use super::texture::{dxgi_format, D3D11Texture};
use crate::backend::{self, SwapChainUsage};
use crate::capture::{ContentSize, PixelFormat};
use crate::error::Result as CaptureResult;

/// Double-buffered swap chain that is only ever shown through a compositor.
pub struct DxgiSwapChain {
    swap_chain: IDXGISwapChain1,
}

// SAFETY: the swap chain belongs to a multithread-protected device and the
// pipeline only touches it under its resource lock.
unsafe impl Send for DxgiSwapChain {}

/// Composition surface wrapping a swap chain. Hand it to a `CompositionSurfaceBrush`.
#[derive(Clone)]
pub struct CompositionSurface(pub ICompositionSurface);

// SAFETY: the surface is a WinRT composition object with no thread affinity of its own.
unsafe impl Send for CompositionSurface {}

impl DxgiSwapChain {
    pub fn new(
        device: &ID3D11Device,
        size: ContentSize,
        format: PixelFormat,
        buffer_count: u32,
        usage: SwapChainUsage,
    ) -> Result<Self> {
        let dxgi_device: IDXGIDevice = device.cast().context("Device is not a DXGI device")?;
        // SAFETY: adapter/factory queries on a live DXGI device.
        let factory: IDXGIFactory2 = unsafe {
            dxgi_device
                .GetAdapter()
                .context("IDXGIDevice::GetAdapter failed")?
                .GetParent()
                .context("Failed to get IDXGIFactory2")?
        };

        let mut buffer_usage = DXGI_USAGE_RENDER_TARGET_OUTPUT.0;
        if usage.unordered_access {
            buffer_usage |= DXGI_USAGE_UNORDERED_ACCESS.0;
        }

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: size.width_u32(),
            Height: size.height_u32(),
            Format: dxgi_format(format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE(buffer_usage),
            BufferCount: buffer_count,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL,
            AlphaMode: DXGI_ALPHA_MODE_PREMULTIPLIED,
            Flags: 0,
            ..Default::default()
        };

        // SAFETY: desc is fully initialized and device belongs to this factory's adapter.
        let swap_chain = unsafe {
            factory
                .CreateSwapChainForComposition(device, &desc, None)
                .context("CreateSwapChainForComposition failed")?
        };
        tracing::debug!("swap chain created ({size}, {format}, {buffer_count} buffers)");
        Ok(Self { swap_chain })
    }

    /// Surface a `Compositor` can display. Its identity survives `ResizeBuffers`.
    pub fn create_composition_surface(&self, compositor: &Compositor) -> Result<CompositionSurface> {
        let interop: ICompositorInterop = compositor
            .cast()
            .context("Compositor does not implement ICompositorInterop")?;
        // SAFETY: the swap chain is a live composition swap chain.
        let surface = unsafe {
            interop
                .CreateCompositionSurfaceForSwapChain(&self.swap_chain)
                .context("CreateCompositionSurfaceForSwapChain failed")?
        };
        Ok(CompositionSurface(surface))
    }

    pub fn as_raw(&self) -> &IDXGISwapChain1 {
        &self.swap_chain
    }
}

impl backend::SwapChain for DxgiSwapChain {
    type Texture = D3D11Texture;

    fn back_buffer(&self) -> CaptureResult<D3D11Texture> {
        // SAFETY: buffer 0 of a flip-sequential D3D11 swap chain is the current back buffer.
        let texture: ID3D11Texture2D = unsafe {
            self.swap_chain
                .GetBuffer(0)
                .context("IDXGISwapChain1::GetBuffer failed")?
        };
        Ok(D3D11Texture(texture))
    }

    fn resize(
        &mut self,
        size: ContentSize,
        format: PixelFormat,
        buffer_count: u32,
    ) -> CaptureResult<()> {
        // SAFETY: callers hold no back buffer references across a resize.
        unsafe {
            self.swap_chain
                .ResizeBuffers(
                    buffer_count,
                    size.width_u32(),
                    size.height_u32(),
                    dxgi_format(format),
                    DXGI_SWAP_CHAIN_FLAG(0),
                )
                .context("IDXGISwapChain1::ResizeBuffers failed")?;
        }
        Ok(())
    }

    fn present(&self) -> CaptureResult<()> {
        let params = DXGI_PRESENT_PARAMETERS::default();
        // SAFETY: params outlives the call; no dirty rects or scroll info.
        unsafe {
            self.swap_chain
                .Present1(1, DXGI_PRESENT(0), &params)
                .ok()
                .context("IDXGISwapChain1::Present1 failed")?;
        }
        Ok(())
    }
}
