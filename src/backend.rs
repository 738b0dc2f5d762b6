// Graphics/capture backend abstraction.
//
// The pipeline drives these traits; `crate::d3d11` implements them with
// Windows Graphics Capture + Direct3D 11 + DXGI. All creation and GPU work goes
// through the device; pools, sessions and swap chains are owned by the pipeline.

use crate::capture::{ContentSize, PixelFormat};
use crate::error::Result;
use crate::image::Snapshot;

/// Callback fired once per newly available frame in a pool.
pub type FrameArrivedHandler = Box<dyn Fn() + Send + Sync>;

/// Callback fired when the capture item goes away.
pub type ItemClosedHandler = Box<dyn Fn() + Send + Sync>;

/// Registration token returned by event subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventToken(pub i64);

/// Thread on which frame-arrived notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameDelivery {
    /// Serially, on the dispatcher queue of the thread that created the pool.
    #[default]
    Dispatcher,
    /// On a platform worker thread; no dispatcher queue required.
    FreeThreaded,
}

/// Extra bind usage requested for swap chain buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapChainUsage {
    /// Back buffers may be bound as unordered-access (compute output) views.
    pub unordered_access: bool,
}

/// Logical GPU device plus its immediate context.
///
/// Shared with the caller; the pipeline only ever holds it behind an `Arc`.
pub trait GraphicsDevice: Send + Sync + 'static {
    /// A GPU image.
    type Texture: Send;
    type Frame: CapturedFrame<Texture = Self::Texture>;
    type Item: CaptureItem;
    type FramePool: FramePool<Frame = Self::Frame>;
    type Session: CaptureSession;
    type SwapChain: SwapChain<Texture = Self::Texture>;
    type Compositor;
    /// Opaque handle a compositor can display.
    type Surface: Clone + Send;

    fn create_frame_pool(
        &self,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
        delivery: FrameDelivery,
    ) -> Result<Self::FramePool>;

    /// Swap the pool's buffers for newly sized/formatted ones without stopping its session.
    fn recreate_frame_pool(
        &self,
        pool: &Self::FramePool,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
    ) -> Result<()>;

    fn create_session(&self, pool: &Self::FramePool, item: &Self::Item) -> Result<Self::Session>;

    fn create_swap_chain(
        &self,
        size: ContentSize,
        format: PixelFormat,
        buffer_count: u32,
        usage: SwapChainUsage,
    ) -> Result<Self::SwapChain>;

    fn create_composition_surface(
        &self,
        compositor: &Self::Compositor,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::Surface>;

    /// Plain shader-readable texture, used to retain presented frames.
    fn create_texture(&self, size: ContentSize, format: PixelFormat) -> Result<Self::Texture>;

    /// GPU-to-GPU copy of the `region` rectangle anchored at the origin.
    fn copy_texture(
        &self,
        dst: &Self::Texture,
        src: &Self::Texture,
        region: ContentSize,
    ) -> Result<()>;

    /// Read a texture back to tightly packed CPU memory.
    fn read_texture(&self, texture: &Self::Texture) -> Result<Snapshot>;

    /// Ask the platform to allow borderless capture. `Ok(false)` means denied.
    fn request_borderless_access(&self) -> Result<bool>;
}

/// A frame taken from a pool. Its surface stays valid while the frame is alive.
pub trait CapturedFrame {
    type Texture;

    fn content_size(&self) -> Result<ContentSize>;
    fn surface(&self) -> Result<Self::Texture>;
}

/// The window, monitor or surface being captured.
pub trait CaptureItem: Send + Sync + 'static {
    fn size(&self) -> Result<ContentSize>;
    fn display_name(&self) -> Result<String>;
    fn subscribe_closed(&self, handler: ItemClosedHandler) -> Result<EventToken>;
    fn unsubscribe_closed(&self, token: EventToken) -> Result<()>;
}

/// Ring of capturable surfaces.
pub trait FramePool: Send + 'static {
    type Frame: CapturedFrame;

    fn subscribe_frame_arrived(&mut self, handler: FrameArrivedHandler) -> Result<EventToken>;
    fn unsubscribe_frame_arrived(&mut self, token: EventToken) -> Result<()>;
    fn try_get_next_frame(&self) -> Result<Option<Self::Frame>>;
    fn close(&mut self) -> Result<()>;
}

/// Active/inactive binding of a pool to an item.
pub trait CaptureSession: Send + 'static {
    fn start(&self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn is_cursor_capture_enabled(&self) -> Result<bool>;
    fn set_cursor_capture_enabled(&self, enabled: bool) -> Result<()>;
    fn is_border_required(&self) -> Result<bool>;
    fn set_border_required(&self, required: bool) -> Result<()>;
}

/// Double-buffered presentation surface.
pub trait SwapChain: Send + 'static {
    type Texture;

    /// The buffer currently being written to.
    fn back_buffer(&self) -> Result<Self::Texture>;
    /// Destructive reallocation of every buffer; buffer count is preserved by the caller.
    fn resize(&mut self, size: ContentSize, format: PixelFormat, buffer_count: u32) -> Result<()>;
    /// Swap buffers, synchronized to one vertical blank.
    fn present(&self) -> Result<()>;
}
