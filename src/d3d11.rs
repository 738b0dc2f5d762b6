// D3D11 device creation and the Direct3D 11 implementation of `GraphicsDevice`.
//
// The immediate context is shared between the owning thread and the frame
// callback thread, so multithread protection is switched on at creation.

pub mod compute;
pub mod swap_chain;
pub mod texture;

use anyhow::Context;
use parking_lot::Mutex;
use windows::core::{Interface, HRESULT};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::UI::Composition::Compositor;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;

use crate::backend::{FrameDelivery, GraphicsDevice, SwapChainUsage};
use crate::capture::wgc::{self, WgcFrame, WgcFramePool, WgcItem, WgcSession};
use crate::capture::{ContentSize, PixelFormat};
use crate::error::Result;
use crate::image::Snapshot;

pub use compute::ComputeStage;
pub use swap_chain::{CompositionSurface, DxgiSwapChain};
pub use texture::{D3D11Texture, TextureReader};

/// D3D11 device, its immediate context and the WinRT wrapper WGC needs.
pub struct D3D11Device {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
    pub dxgi_device: IDXGIDevice,
    pub direct3d_device: IDirect3DDevice,
    reader: Mutex<TextureReader>,
}

// SAFETY: D3D11 devices are free-threaded and the immediate context is
// multithread protected (see `from_device`), so calls from several threads serialize.
unsafe impl Send for D3D11Device {}
unsafe impl Sync for D3D11Device {}

/// Create a hardware D3D11 device with BGRA support.
pub fn create_d3d11_device() -> anyhow::Result<D3D11Device> {
    let mut device = None;
    let mut context = None;

    // SAFETY: out-pointers are valid locals for the duration of the call.
    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            Some(&[D3D_FEATURE_LEVEL_11_0]),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .context("D3D11CreateDevice failed")?;
    }

    let device = device.context("D3D11CreateDevice returned no device")?;
    let context = context.context("D3D11CreateDevice returned no immediate context")?;
    D3D11Device::from_device(device, context)
}

/// DXGI codes after which the device cannot be used again.
pub fn is_device_lost(code: HRESULT) -> bool {
    code == DXGI_ERROR_DEVICE_REMOVED
        || code == DXGI_ERROR_DEVICE_RESET
        || code == DXGI_ERROR_DEVICE_HUNG
}

impl D3D11Device {
    /// Adopt a device created by the host. Turns on multithread protection.
    pub fn from_device(device: ID3D11Device, context: ID3D11DeviceContext) -> anyhow::Result<Self> {
        let multithread: ID3D11Multithread = context
            .cast()
            .context("ID3D11Multithread not available")?;
        // SAFETY: plain COM call on a live interface; the return value is the previous state.
        unsafe {
            let _ = multithread.SetMultithreadProtected(true);
        }

        let dxgi_device: IDXGIDevice = device.cast().context("Device is not a DXGI device")?;

        // SAFETY: dxgi_device is a live DXGI device; the call wraps it for WinRT.
        let direct3d_device: IDirect3DDevice = unsafe {
            CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)
                .context("CreateDirect3D11DeviceFromDXGIDevice failed")?
                .cast()
                .context("Failed to cast to IDirect3DDevice")?
        };

        if let Err(e) = log_device_info(&dxgi_device) {
            tracing::debug!("failed to query adapter description: {e}");
        }

        let reader = Mutex::new(TextureReader::new(device.clone(), context.clone()));
        Ok(Self {
            device,
            context,
            dxgi_device,
            direct3d_device,
            reader,
        })
    }
}

fn log_device_info(dxgi_device: &IDXGIDevice) -> anyhow::Result<()> {
    // SAFETY: read-only adapter queries on a live device.
    let desc = unsafe { dxgi_device.GetAdapter()?.GetDesc()? };
    let name = String::from_utf16_lossy(&desc.Description);
    tracing::info!(
        "D3D11 device created: {} ({} MB dedicated)",
        name.trim_end_matches('\0'),
        desc.DedicatedVideoMemory / 1024 / 1024
    );
    Ok(())
}

impl GraphicsDevice for D3D11Device {
    type Texture = D3D11Texture;
    type Frame = WgcFrame;
    type Item = WgcItem;
    type FramePool = WgcFramePool;
    type Session = WgcSession;
    type SwapChain = DxgiSwapChain;
    type Compositor = Compositor;
    type Surface = CompositionSurface;

    fn create_frame_pool(
        &self,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
        delivery: FrameDelivery,
    ) -> Result<WgcFramePool> {
        Ok(WgcFramePool::new(
            &self.direct3d_device,
            format,
            buffer_count,
            size,
            delivery,
        )?)
    }

    fn recreate_frame_pool(
        &self,
        pool: &WgcFramePool,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
    ) -> Result<()> {
        Ok(pool.recreate(&self.direct3d_device, format, buffer_count, size)?)
    }

    fn create_session(&self, pool: &WgcFramePool, item: &WgcItem) -> Result<WgcSession> {
        Ok(pool.create_session(item)?)
    }

    fn create_swap_chain(
        &self,
        size: ContentSize,
        format: PixelFormat,
        buffer_count: u32,
        usage: SwapChainUsage,
    ) -> Result<DxgiSwapChain> {
        Ok(DxgiSwapChain::new(
            &self.device,
            size,
            format,
            buffer_count,
            usage,
        )?)
    }

    fn create_composition_surface(
        &self,
        compositor: &Compositor,
        swap_chain: &DxgiSwapChain,
    ) -> Result<CompositionSurface> {
        Ok(swap_chain.create_composition_surface(compositor)?)
    }

    fn create_texture(&self, size: ContentSize, format: PixelFormat) -> Result<D3D11Texture> {
        Ok(texture::create_texture(
            &self.device,
            size.width_u32(),
            size.height_u32(),
            texture::dxgi_format(format),
            D3D11_BIND_SHADER_RESOURCE.0 as u32,
        )?)
    }

    fn copy_texture(
        &self,
        dst: &D3D11Texture,
        src: &D3D11Texture,
        region: ContentSize,
    ) -> Result<()> {
        Ok(texture::copy_region(&self.context, dst, src, region)?)
    }

    fn read_texture(&self, texture: &D3D11Texture) -> Result<Snapshot> {
        self.reader.lock().read(texture)
    }

    fn request_borderless_access(&self) -> Result<bool> {
        wgc::request_borderless_access()
    }
}
