// Recording mock backend for driving `Pipeline` without a GPU.
//
// Every device, pool, session and swap chain call is appended to one shared
// event log, so tests can assert on the exact order of GPU operations.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use livecapture::backend::{
    CaptureItem, CaptureSession, CapturedFrame, EventToken, FrameArrivedHandler, FrameDelivery,
    FramePool, GraphicsDevice, ItemClosedHandler, SwapChain, SwapChainUsage,
};
use livecapture::image::Snapshot;
use livecapture::processing::FrameProcessor;
use livecapture::{CaptureError, ContentSize, PixelFormat, Result};

pub const SIZE_800X600: ContentSize = ContentSize::new(800, 600);
pub const SIZE_1024X768: ContentSize = ContentSize::new(1024, 768);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexKind {
    BackBuffer,
    Surface,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateSwapChain {
        size: ContentSize,
        format: PixelFormat,
        buffers: u32,
        unordered_access: bool,
    },
    CreatePool {
        size: ContentSize,
        format: PixelFormat,
        buffers: u32,
        delivery: FrameDelivery,
    },
    CreateSession,
    SessionStart,
    SessionClose,
    PoolClose,
    Resize {
        size: ContentSize,
        format: PixelFormat,
        buffers: u32,
    },
    Copy {
        dst: TexKind,
        src: TexKind,
        region: ContentSize,
        dst_size: ContentSize,
        src_size: ContentSize,
    },
    Process {
        size: ContentSize,
        format: PixelFormat,
    },
    Present,
    Recreate {
        size: ContentSize,
        format: PixelFormat,
        buffers: u32,
    },
    CreateSurface,
    CreateTexture {
        size: ContentSize,
        format: PixelFormat,
    },
    ReadTexture,
    AccessRequested,
}

pub type Log = Arc<Mutex<Vec<Event>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTexture {
    pub kind: TexKind,
    pub size: ContentSize,
    pub format: PixelFormat,
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ItemState {
    size: Mutex<ContentSize>,
    closed_handler: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    unsubscribed: AtomicBool,
}

impl ItemState {
    /// Simulate the window being closed or the monitor unplugged.
    pub fn fire_closed(&self) {
        let handler = self.closed_handler.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Closed handler as currently registered, kept alive independently of the item.
    pub fn handler(&self) -> Option<Arc<dyn Fn() + Send + Sync>> {
        self.closed_handler.lock().clone()
    }

    pub fn was_unsubscribed(&self) -> bool {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

pub struct MockItem {
    pub state: Arc<ItemState>,
}

impl MockItem {
    pub fn new(size: ContentSize) -> Self {
        let state = ItemState::default();
        *state.size.lock() = size;
        Self {
            state: Arc::new(state),
        }
    }
}

impl CaptureItem for MockItem {
    fn size(&self) -> Result<ContentSize> {
        Ok(*self.state.size.lock())
    }

    fn display_name(&self) -> Result<String> {
        Ok("Mock Window".to_string())
    }

    fn subscribe_closed(&self, handler: ItemClosedHandler) -> Result<EventToken> {
        *self.state.closed_handler.lock() = Some(Arc::from(handler));
        Ok(EventToken(7))
    }

    fn unsubscribe_closed(&self, token: EventToken) -> Result<()> {
        assert_eq!(token, EventToken(7));
        *self.state.closed_handler.lock() = None;
        self.state.unsubscribed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame pool
// ---------------------------------------------------------------------------

pub struct PoolState {
    handler: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    frames: Mutex<VecDeque<ContentSize>>,
    format: Mutex<PixelFormat>,
}

impl PoolState {
    /// Handler as currently registered, kept alive independently of the pool.
    pub fn handler(&self) -> Option<Arc<dyn Fn() + Send + Sync>> {
        self.handler.lock().clone()
    }
}

pub struct MockPool {
    state: Arc<PoolState>,
    log: Log,
}

pub struct MockFrame {
    content_size: ContentSize,
    format: PixelFormat,
}

impl CapturedFrame for MockFrame {
    type Texture = MockTexture;

    fn content_size(&self) -> Result<ContentSize> {
        Ok(self.content_size)
    }

    fn surface(&self) -> Result<MockTexture> {
        Ok(MockTexture {
            kind: TexKind::Surface,
            size: self.content_size,
            format: self.format,
        })
    }
}

impl FramePool for MockPool {
    type Frame = MockFrame;

    fn subscribe_frame_arrived(&mut self, handler: FrameArrivedHandler) -> Result<EventToken> {
        *self.state.handler.lock() = Some(Arc::from(handler));
        Ok(EventToken(1))
    }

    fn unsubscribe_frame_arrived(&mut self, _token: EventToken) -> Result<()> {
        *self.state.handler.lock() = None;
        Ok(())
    }

    fn try_get_next_frame(&self) -> Result<Option<MockFrame>> {
        let format = *self.state.format.lock();
        Ok(self
            .state
            .frames
            .lock()
            .pop_front()
            .map(|content_size| MockFrame {
                content_size,
                format,
            }))
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().push(Event::PoolClose);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct MockSession {
    log: Log,
    cursor: AtomicBool,
    border: AtomicBool,
}

impl CaptureSession for MockSession {
    fn start(&self) -> Result<()> {
        self.log.lock().push(Event::SessionStart);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().push(Event::SessionClose);
        Ok(())
    }

    fn is_cursor_capture_enabled(&self) -> Result<bool> {
        Ok(self.cursor.load(Ordering::SeqCst))
    }

    fn set_cursor_capture_enabled(&self, enabled: bool) -> Result<()> {
        self.cursor.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn is_border_required(&self) -> Result<bool> {
        Ok(self.border.load(Ordering::SeqCst))
    }

    fn set_border_required(&self, required: bool) -> Result<()> {
        self.border.store(required, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Swap chain
// ---------------------------------------------------------------------------

pub struct MockSwapChain {
    log: Log,
    size: ContentSize,
    format: PixelFormat,
    faults: Arc<Faults>,
}

impl SwapChain for MockSwapChain {
    type Texture = MockTexture;

    fn back_buffer(&self) -> Result<MockTexture> {
        Ok(MockTexture {
            kind: TexKind::BackBuffer,
            size: self.size,
            format: self.format,
        })
    }

    fn resize(&mut self, size: ContentSize, format: PixelFormat, buffer_count: u32) -> Result<()> {
        let format_fault = {
            let mut resize_to = self.faults.resize_to.lock();
            *resize_to == Some(format) && resize_to.take().is_some()
        };
        if self.faults.resize.swap(false, Ordering::SeqCst) || format_fault {
            return Err(anyhow::anyhow!("ResizeBuffers failed").into());
        }
        self.log.lock().push(Event::Resize {
            size,
            format,
            buffers: buffer_count,
        });
        self.size = size;
        self.format = format;
        Ok(())
    }

    fn present(&self) -> Result<()> {
        if self.faults.device_lost.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceLost("device removed".into()));
        }
        self.log.lock().push(Event::Present);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Faults {
    pub copy: AtomicBool,
    pub resize: AtomicBool,
    /// Fail the next resize that targets this format.
    pub resize_to: Mutex<Option<PixelFormat>>,
    pub recreate: AtomicBool,
    pub device_lost: AtomicBool,
}

pub struct MockCompositor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSurface {
    pub id: u64,
}

pub struct MockDevice {
    pub log: Log,
    pub faults: Arc<Faults>,
    pools: Mutex<Vec<Arc<PoolState>>>,
    next_surface: AtomicU64,
    pub borderless_allowed: AtomicBool,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(Mutex::new(Vec::new())),
            faults: Arc::new(Faults::default()),
            pools: Mutex::new(Vec::new()),
            next_surface: AtomicU64::new(1),
            borderless_allowed: AtomicBool::new(true),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().clear();
    }

    pub fn record(&self, event: Event) {
        self.log.lock().push(event);
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.log.lock().iter().filter(|e| pred(e)).count()
    }

    /// State of the most recently created pool.
    pub fn pool(&self) -> Arc<PoolState> {
        Arc::clone(self.pools.lock().last().expect("no frame pool created"))
    }

    /// Queue a frame of `size` and fire FrameArrived, as the capture service would.
    pub fn deliver(&self, size: ContentSize) {
        let pool = self.pool();
        pool.frames.lock().push_back(size);
        if let Some(handler) = pool.handler() {
            handler();
        }
    }

    /// Fire FrameArrived with nothing queued.
    pub fn fire_empty(&self) {
        if let Some(handler) = self.pool().handler() {
            handler();
        }
    }
}

impl GraphicsDevice for MockDevice {
    type Texture = MockTexture;
    type Frame = MockFrame;
    type Item = MockItem;
    type FramePool = MockPool;
    type Session = MockSession;
    type SwapChain = MockSwapChain;
    type Compositor = MockCompositor;
    type Surface = MockSurface;

    fn create_frame_pool(
        &self,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
        delivery: FrameDelivery,
    ) -> Result<MockPool> {
        self.record(Event::CreatePool {
            size,
            format,
            buffers: buffer_count,
            delivery,
        });
        let state = Arc::new(PoolState {
            handler: Mutex::new(None),
            frames: Mutex::new(VecDeque::new()),
            format: Mutex::new(format),
        });
        self.pools.lock().push(Arc::clone(&state));
        Ok(MockPool {
            state,
            log: Arc::clone(&self.log),
        })
    }

    fn recreate_frame_pool(
        &self,
        pool: &MockPool,
        format: PixelFormat,
        buffer_count: u32,
        size: ContentSize,
    ) -> Result<()> {
        if self.faults.recreate.swap(false, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Recreate failed").into());
        }
        self.record(Event::Recreate {
            size,
            format,
            buffers: buffer_count,
        });
        *pool.state.format.lock() = format;
        Ok(())
    }

    fn create_session(&self, _pool: &MockPool, _item: &MockItem) -> Result<MockSession> {
        self.record(Event::CreateSession);
        Ok(MockSession {
            log: Arc::clone(&self.log),
            cursor: AtomicBool::new(true),
            border: AtomicBool::new(true),
        })
    }

    fn create_swap_chain(
        &self,
        size: ContentSize,
        format: PixelFormat,
        buffer_count: u32,
        usage: SwapChainUsage,
    ) -> Result<MockSwapChain> {
        self.record(Event::CreateSwapChain {
            size,
            format,
            buffers: buffer_count,
            unordered_access: usage.unordered_access,
        });
        Ok(MockSwapChain {
            log: Arc::clone(&self.log),
            size,
            format,
            faults: Arc::clone(&self.faults),
        })
    }

    fn create_composition_surface(
        &self,
        _compositor: &MockCompositor,
        _swap_chain: &MockSwapChain,
    ) -> Result<MockSurface> {
        self.record(Event::CreateSurface);
        Ok(MockSurface {
            id: self.next_surface.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn create_texture(&self, size: ContentSize, format: PixelFormat) -> Result<MockTexture> {
        self.record(Event::CreateTexture { size, format });
        Ok(MockTexture {
            kind: TexKind::Plain,
            size,
            format,
        })
    }

    fn copy_texture(&self, dst: &MockTexture, src: &MockTexture, region: ContentSize) -> Result<()> {
        if self.faults.copy.swap(false, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("CopySubresourceRegion failed").into());
        }
        self.record(Event::Copy {
            dst: dst.kind,
            src: src.kind,
            region,
            dst_size: dst.size,
            src_size: src.size,
        });
        Ok(())
    }

    fn read_texture(&self, texture: &MockTexture) -> Result<Snapshot> {
        self.record(Event::ReadTexture);
        let len = texture.size.width_u32() as usize
            * texture.size.height_u32() as usize
            * texture.format.bytes_per_pixel();
        Snapshot::new(
            vec![0x7f; len],
            texture.size.width_u32(),
            texture.size.height_u32(),
            texture.format,
        )
    }

    fn request_borderless_access(&self) -> Result<bool> {
        self.record(Event::AccessRequested);
        Ok(self.borderless_allowed.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Processor that records its calls; shares counters with the test.
#[derive(Clone, Default)]
pub struct RecordingProcessor {
    pub prepared: Arc<AtomicUsize>,
    pub processed: Arc<AtomicUsize>,
}

impl FrameProcessor<MockDevice> for RecordingProcessor {
    fn prepare(&mut self, _device: &MockDevice) -> Result<()> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn needs_unordered_access(&self) -> bool {
        true
    }

    fn process(
        &mut self,
        device: &MockDevice,
        target: &MockTexture,
        size: ContentSize,
        format: PixelFormat,
    ) -> Result<()> {
        assert_eq!(target.kind, TexKind::BackBuffer);
        assert_eq!(target.size, size);
        self.processed.fetch_add(1, Ordering::SeqCst);
        device.record(Event::Process { size, format });
        Ok(())
    }
}

/// Processor that cannot handle one pixel format.
pub struct FormatLimitedProcessor {
    pub refuses: PixelFormat,
}

impl FrameProcessor<MockDevice> for FormatLimitedProcessor {
    fn check_format(&self, _device: &MockDevice, format: PixelFormat) -> Result<()> {
        if format == self.refuses {
            return Err(CaptureError::Unsupported(format!("{format} not supported")));
        }
        Ok(())
    }

    fn process(
        &mut self,
        device: &MockDevice,
        _target: &MockTexture,
        size: ContentSize,
        format: PixelFormat,
    ) -> Result<()> {
        assert_ne!(format, self.refuses);
        device.record(Event::Process { size, format });
        Ok(())
    }
}

/// Processor whose compile step always fails.
pub struct BrokenProcessor;

impl FrameProcessor<MockDevice> for BrokenProcessor {
    fn prepare(&mut self, _device: &MockDevice) -> Result<()> {
        Err(CaptureError::Shader("syntax error at line 1".into()))
    }

    fn process(
        &mut self,
        _device: &MockDevice,
        _target: &MockTexture,
        _size: ContentSize,
        _format: PixelFormat,
    ) -> Result<()> {
        unreachable!("never prepared")
    }
}

pub fn is_present(e: &Event) -> bool {
    matches!(e, Event::Present)
}

pub fn is_resize(e: &Event) -> bool {
    matches!(e, Event::Resize { .. })
}

pub fn is_recreate(e: &Event) -> bool {
    matches!(e, Event::Recreate { .. })
}

pub fn is_frame_copy(e: &Event) -> bool {
    matches!(e, Event::Copy { dst: TexKind::BackBuffer, .. })
}
