// Windows Graphics Capture backend: capture items, frame pools, sessions.
//
// Each type is a thin owner of one WinRT object. Event handlers forward to the
// boxed callbacks handed in by the pipeline and never touch D3D themselves.

use anyhow::{Context, Result};
use windows::core::{h, IInspectable, Interface};
use windows::Foundation::Metadata::ApiInformation;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureAccess,
    GraphicsCaptureAccessKind, GraphicsCaptureItem, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::{IDirect3DDevice, IDirect3DSurface};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Security::Authorization::AppCapabilityAccess::AppCapabilityAccessStatus;
use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::Graphics::Gdi::{MonitorFromPoint, HMONITOR, MONITOR_DEFAULTTOPRIMARY};
use windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use crate::backend::{
    self, CaptureItem, CaptureSession, EventToken, FrameArrivedHandler, FrameDelivery,
    ItemClosedHandler,
};
use crate::capture::{ContentSize, PixelFormat};
use crate::d3d11::D3D11Texture;
use crate::error::{CaptureError, Result as CaptureResult};

fn to_size(size: SizeInt32) -> ContentSize {
    ContentSize::new(size.Width, size.Height)
}

fn from_size(size: ContentSize) -> SizeInt32 {
    SizeInt32 {
        Width: size.width,
        Height: size.height,
    }
}

fn to_directx(format: PixelFormat) -> DirectXPixelFormat {
    DirectXPixelFormat(format.raw() as i32)
}

// ---------------------------------------------------------------------------
// Capture item
// ---------------------------------------------------------------------------

/// A window or monitor to capture.
pub struct WgcItem {
    item: GraphicsCaptureItem,
}

impl WgcItem {
    /// Create a capture item for a monitor handle.
    pub fn for_monitor(hmonitor: HMONITOR) -> Result<Self> {
        // SAFETY: factory function call, failure may mean system not supported or COM not initialized
        let item = unsafe {
            let interop: IGraphicsCaptureItemInterop =
                windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
                    .context("Failed to get IGraphicsCaptureItemInterop factory")?;
            interop
                .CreateForMonitor(hmonitor)
                .context("Failed to create CaptureItem for monitor")?
        };
        Ok(Self { item })
    }

    /// Create a capture item for a top-level window handle.
    pub fn for_window(hwnd: HWND) -> Result<Self> {
        // SAFETY: factory function call, same as above
        let item = unsafe {
            let interop: IGraphicsCaptureItemInterop =
                windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
                    .context("Failed to get IGraphicsCaptureItemInterop factory")?;
            interop
                .CreateForWindow(hwnd)
                .context("Failed to create CaptureItem for window")?
        };
        Ok(Self { item })
    }

    /// Capture item for the primary monitor.
    pub fn primary_monitor() -> Result<Self> {
        // SAFETY: MonitorFromPoint has no preconditions; DEFAULTTOPRIMARY never returns null.
        let hmonitor = unsafe { MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY) };
        Self::for_monitor(hmonitor)
    }

    /// Wrap an item obtained elsewhere, e.g. from a `GraphicsCapturePicker`.
    pub fn from_item(item: GraphicsCaptureItem) -> Self {
        Self { item }
    }

    pub fn as_raw(&self) -> &GraphicsCaptureItem {
        &self.item
    }
}

impl CaptureItem for WgcItem {
    fn size(&self) -> CaptureResult<ContentSize> {
        let size = self
            .item
            .Size()
            .context("Failed to query capture item size")?;
        Ok(to_size(size))
    }

    fn display_name(&self) -> CaptureResult<String> {
        let name = self
            .item
            .DisplayName()
            .context("Failed to query capture item name")?;
        Ok(name.to_string())
    }

    fn subscribe_closed(&self, handler: ItemClosedHandler) -> CaptureResult<EventToken> {
        let token = self
            .item
            .Closed(&TypedEventHandler::<GraphicsCaptureItem, IInspectable>::new(
                move |_, _| {
                    handler();
                    Ok(())
                },
            ))
            .context("GraphicsCaptureItem::Closed registration failed")?;
        Ok(EventToken(token))
    }

    fn unsubscribe_closed(&self, token: EventToken) -> CaptureResult<()> {
        self.item
            .RemoveClosed(token.0)
            .context("GraphicsCaptureItem::RemoveClosed failed")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame pool
// ---------------------------------------------------------------------------

/// Pool of capture surfaces on one D3D device.
pub struct WgcFramePool {
    pool: Direct3D11CaptureFramePool,
}

impl WgcFramePool {
    /// `Dispatcher` delivery needs a DispatcherQueue on the calling thread.
    pub(crate) fn new(
        device: &IDirect3DDevice,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
        delivery: FrameDelivery,
    ) -> Result<Self> {
        let pixel_format = to_directx(format);
        let size = from_size(size);
        let pool = match delivery {
            FrameDelivery::Dispatcher => {
                Direct3D11CaptureFramePool::Create(device, pixel_format, buffer_count as i32, size)
                    .context("Direct3D11CaptureFramePool::Create failed (no DispatcherQueue on this thread?)")?
            }
            FrameDelivery::FreeThreaded => Direct3D11CaptureFramePool::CreateFreeThreaded(
                device,
                pixel_format,
                buffer_count as i32,
                size,
            )
            .context("Direct3D11CaptureFramePool::CreateFreeThreaded failed")?,
        };
        Ok(Self { pool })
    }

    pub(crate) fn recreate(
        &self,
        device: &IDirect3DDevice,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
    ) -> Result<()> {
        self.pool
            .Recreate(device, to_directx(format), buffer_count as i32, from_size(size))
            .context("Direct3D11CaptureFramePool::Recreate failed")?;
        Ok(())
    }

    pub(crate) fn create_session(&self, item: &WgcItem) -> Result<WgcSession> {
        let session = self
            .pool
            .CreateCaptureSession(&item.item)
            .context("Failed to create capture session")?;
        Ok(WgcSession { session })
    }
}

impl backend::FramePool for WgcFramePool {
    type Frame = WgcFrame;

    fn subscribe_frame_arrived(&mut self, handler: FrameArrivedHandler) -> CaptureResult<EventToken> {
        let token = self
            .pool
            .FrameArrived(&TypedEventHandler::<
                Direct3D11CaptureFramePool,
                IInspectable,
            >::new(move |_, _| {
                handler();
                Ok(())
            }))
            .context("FrameArrived registration failed")?;
        Ok(EventToken(token))
    }

    fn unsubscribe_frame_arrived(&mut self, token: EventToken) -> CaptureResult<()> {
        self.pool
            .RemoveFrameArrived(token.0)
            .context("RemoveFrameArrived failed")?;
        Ok(())
    }

    fn try_get_next_frame(&self) -> CaptureResult<Option<WgcFrame>> {
        match self.pool.TryGetNextFrame() {
            Ok(frame) => Ok(Some(WgcFrame { frame })),
            // An empty pool hands back null, which surfaces as an error with a success code.
            Err(e) if e.code().is_ok() => Ok(None),
            Err(e) => Err(CaptureError::from_platform(
                anyhow::Error::new(e).context("TryGetNextFrame failed"),
            )),
        }
    }

    fn close(&mut self) -> CaptureResult<()> {
        self.pool.Close().context("Failed to close frame pool")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One captured frame. Returned to the pool on drop.
pub struct WgcFrame {
    frame: Direct3D11CaptureFrame,
}

impl WgcFrame {
    /// Extract `ID3D11Texture2D` from the frame surface.
    ///
    /// The frame must outlive every use of the returned texture.
    fn texture(&self) -> Result<ID3D11Texture2D> {
        let surface: IDirect3DSurface = self.frame.Surface()?;
        let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;

        // SAFETY: GetInterface is Win32 COM interop call
        // access obtained successfully from cast() above, guaranteed valid
        let texture: ID3D11Texture2D = unsafe {
            access
                .GetInterface()
                .context("Failed to get ID3D11Texture2D interface")?
        };
        Ok(texture)
    }
}

impl backend::CapturedFrame for WgcFrame {
    type Texture = D3D11Texture;

    fn content_size(&self) -> CaptureResult<ContentSize> {
        let size = self
            .frame
            .ContentSize()
            .context("Failed to query frame content size")?;
        Ok(to_size(size))
    }

    fn surface(&self) -> CaptureResult<D3D11Texture> {
        Ok(D3D11Texture(self.texture()?))
    }
}

impl Drop for WgcFrame {
    fn drop(&mut self) {
        let _ = self.frame.Close();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Binding of a frame pool to an item.
pub struct WgcSession {
    session: GraphicsCaptureSession,
}

impl CaptureSession for WgcSession {
    fn start(&self) -> CaptureResult<()> {
        self.session
            .StartCapture()
            .context("GraphicsCaptureSession::StartCapture failed")?;
        Ok(())
    }

    fn close(&mut self) -> CaptureResult<()> {
        self.session
            .Close()
            .context("Failed to close capture session")?;
        Ok(())
    }

    fn is_cursor_capture_enabled(&self) -> CaptureResult<bool> {
        Ok(self.session.IsCursorCaptureEnabled().context("IsCursorCaptureEnabled failed")?)
    }

    fn set_cursor_capture_enabled(&self, enabled: bool) -> CaptureResult<()> {
        self.session
            .SetIsCursorCaptureEnabled(enabled)
            .context("SetIsCursorCaptureEnabled failed")?;
        Ok(())
    }

    fn is_border_required(&self) -> CaptureResult<bool> {
        ensure_session_property("IsBorderRequired")?;
        Ok(self.session.IsBorderRequired().context("IsBorderRequired failed")?)
    }

    fn set_border_required(&self, required: bool) -> CaptureResult<()> {
        ensure_session_property("IsBorderRequired")?;
        self.session
            .SetIsBorderRequired(required)
            .context("SetIsBorderRequired failed")?;
        Ok(())
    }
}

/// Fail with `Unsupported` when this Windows build lacks a session property.
fn ensure_session_property(name: &str) -> CaptureResult<()> {
    let present = ApiInformation::IsPropertyPresent(
        h!("Windows.Graphics.Capture.GraphicsCaptureSession"),
        &name.into(),
    )
    .unwrap_or(false);
    if present {
        Ok(())
    } else {
        Err(CaptureError::Unsupported(format!(
            "GraphicsCaptureSession.{name} needs a newer Windows build"
        )))
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Ask for borderless capture access. Blocks until the user or policy answers.
pub(crate) fn request_borderless_access() -> CaptureResult<bool> {
    let present =
        ApiInformation::IsTypePresent(h!("Windows.Graphics.Capture.GraphicsCaptureAccess"))
            .unwrap_or(false);
    if !present {
        return Err(CaptureError::Unsupported(
            "GraphicsCaptureAccess needs a newer Windows build".into(),
        ));
    }

    let status = GraphicsCaptureAccess::RequestAccessAsync(GraphicsCaptureAccessKind::Borderless)
        .context("RequestAccessAsync failed")?
        .get()
        .context("Borderless access request failed")?;
    Ok(status == AppCapabilityAccessStatus::Allowed)
}
