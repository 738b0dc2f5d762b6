// Capture-to-display pipeline: frame pool → per-frame stage → swap chain → compositor
//
// One `Pipeline` mirrors one capture item into one swap chain.
// - Frame-arrived notifications run the per-frame stage (process.rs) on the delivery thread.
// - The owning thread starts, reconfigures and closes the pipeline.
// Only the closed flag and the pending-format slot are touched from both sides without
// the resource lock; everything GPU-side lives behind `Shared::resources`.

mod build;
mod guard;
mod options;
mod pending;
mod process;
mod stats;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::backend::{CaptureItem, CaptureSession, EventToken, FramePool, GraphicsDevice};
use crate::capture::{ContentSize, PixelFormat};
use crate::error::{CaptureError, Result};
use crate::image::Snapshot;
use crate::processing::FrameProcessor;

use guard::LifecycleGuard;
pub use options::{ErrorSink, ItemClosedCallback, PipelineOptions};
use pending::PendingFormat;
pub use stats::PipelineStats;
use stats::StatsCounters;

/// Live mirror of a capture item into a composition-ready swap chain.
///
/// `close()` (or drop) tears everything down exactly once, even when raced by
/// other `close()` calls or by an in-flight frame notification.
///
/// # Examples
/// ```ignore
/// # use livecapture::pipeline::{Pipeline, PipelineOptions};
/// let pipeline = Pipeline::new(device, item, PipelineOptions::default())?;
/// let surface = pipeline.create_surface(&compositor)?;
/// pipeline.start_capture()?;
/// // ...
/// pipeline.close();
/// ```
pub struct Pipeline<D: GraphicsDevice> {
    shared: Arc<Shared<D>>,
}

pub(crate) struct Shared<D: GraphicsDevice> {
    device: Arc<D>,
    guard: LifecycleGuard,
    pending_format: PendingFormat,
    resources: Mutex<Option<Resources<D>>>,
    stats: StatsCounters,
    error_sink: Option<ErrorSink>,
    on_item_closed: Option<ItemClosedCallback>,
    retain_last_frame: bool,
}

/// Everything the pipeline exclusively owns. `None` once closed.
pub(crate) struct Resources<D: GraphicsDevice> {
    item: D::Item,
    item_closed_token: Option<EventToken>,
    pool: D::FramePool,
    frame_arrived_token: Option<EventToken>,
    session: D::Session,
    swap_chain: D::SwapChain,
    surface: Option<D::Surface>,
    processor: Option<Box<dyn FrameProcessor<D>>>,
    /// Most recently observed content size; the swap chain always matches it.
    last_size: ContentSize,
    pixel_format: PixelFormat,
    /// Pool buffers no longer match `last_size`/`pixel_format`.
    pool_stale: bool,
    started: bool,
    retained: Option<RetainedFrame<D::Texture>>,
}

/// Copy of the last presented frame, kept for snapshots.
pub(crate) struct RetainedFrame<T> {
    texture: T,
    size: ContentSize,
    format: PixelFormat,
}

impl<D: GraphicsDevice> Pipeline<D> {
    /// Start delivering frames. A second call is a no-op.
    pub fn start_capture(&self) -> Result<()> {
        self.shared.with_resources(|res| {
            if res.started {
                tracing::debug!("start_capture called on an already started session");
                return Ok(());
            }
            res.session.start()?;
            res.started = true;
            tracing::info!("capture started ({}, {})", res.last_size, res.pixel_format);
            Ok(())
        })
    }

    /// Composition surface backed by the swap chain.
    ///
    /// Created on first call; later calls return the same surface, whose identity
    /// survives every resize.
    pub fn create_surface(&self, compositor: &D::Compositor) -> Result<D::Surface> {
        let device = Arc::clone(&self.shared.device);
        self.shared.with_resources(|res| {
            if let Some(surface) = &res.surface {
                return Ok(surface.clone());
            }
            let surface = device.create_composition_surface(compositor, &res.swap_chain)?;
            res.surface = Some(surface.clone());
            Ok(surface)
        })
    }

    /// Request a pixel format change.
    ///
    /// Applied by the next frame notification, after its present. Requests made
    /// between two notifications coalesce; only the last one is applied.
    pub fn set_pixel_format(&self, format: PixelFormat) -> Result<()> {
        self.shared.guard.check()?;
        self.shared.pending_format.set(format);
        tracing::debug!("pixel format {format} requested");
        Ok(())
    }

    /// Format currently used by the swap chain and frame pool.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        self.shared.with_resources(|res| Ok(res.pixel_format))
    }

    /// Size the swap chain currently matches.
    pub fn content_size(&self) -> Result<ContentSize> {
        self.shared.with_resources(|res| Ok(res.last_size))
    }

    /// Human-readable name of the captured window or monitor.
    pub fn display_name(&self) -> Result<String> {
        self.shared.with_resources(|res| res.item.display_name())
    }

    /// Whether the mouse cursor is drawn into captured frames.
    pub fn is_cursor_enabled(&self) -> Result<bool> {
        self.shared
            .with_resources(|res| res.session.is_cursor_capture_enabled())
    }

    /// Show or hide the cursor in captured frames. Takes effect on the next frame.
    pub fn set_cursor_enabled(&self, enabled: bool) -> Result<()> {
        self.shared
            .with_resources(|res| res.session.set_cursor_capture_enabled(enabled))
    }

    /// Whether the platform draws a highlight border around the captured item.
    pub fn is_border_required(&self) -> Result<bool> {
        self.shared.with_resources(|res| res.session.is_border_required())
    }

    /// Set whether the capture border is drawn.
    ///
    /// Borderless capture needs platform permission, which is requested on a
    /// background thread. The property is set whatever the answer: a denial is
    /// logged and the platform keeps drawing the border until policy allows it.
    pub fn request_border_required(&self, required: bool) -> Result<JoinHandle<()>> {
        self.shared.guard.check()?;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("livecapture-border-access".into())
            .spawn(move || {
                match shared.device.request_borderless_access() {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!("borderless capture access denied"),
                    Err(e) => tracing::warn!("borderless capture access request failed: {e}"),
                }
                let applied =
                    shared.with_resources(|res| res.session.set_border_required(required));
                match applied {
                    Ok(()) | Err(CaptureError::Closed) => {}
                    Err(e) => tracing::warn!("failed to set border requirement: {e}"),
                }
            })
            .map_err(|e| anyhow::anyhow!("failed to spawn border access thread: {e}"))?;
        Ok(handle)
    }

    /// Read back the last presented frame.
    ///
    /// Requires `PipelineOptions::retain_last_frame`.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.shared.guard.check()?;
        if !self.shared.retain_last_frame {
            return Err(CaptureError::Unsupported(
                "snapshots need PipelineOptions::retain_last_frame".into(),
            ));
        }
        let device = Arc::clone(&self.shared.device);
        self.shared.with_resources(|res| match &res.retained {
            Some(retained) => device.read_texture(&retained.texture),
            None => Err(CaptureError::InvalidArgument(
                "no frame has been presented yet".into(),
            )),
        })
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.guard.is_closed()
    }

    /// Stop capture and release the pool, session, swap chain and item.
    ///
    /// Safe to call any number of times from any thread; only the first call does work.
    pub fn close(&self) {
        let _ = self.shared.close();
    }
}

impl<D: GraphicsDevice> Drop for Pipeline<D> {
    fn drop(&mut self) {
        let _ = self.shared.close();
    }
}

impl<D: GraphicsDevice> Shared<D> {
    /// Run `f` against live resources, or fail with `Closed`.
    fn with_resources<T>(&self, f: impl FnOnce(&mut Resources<D>) -> Result<T>) -> Result<T> {
        self.guard.check()?;
        let mut resources = self.resources.lock();
        match resources.as_mut() {
            Some(res) => f(res),
            None => Err(CaptureError::Closed),
        }
    }

    /// Returns true for the call that actually tore down.
    fn close(&self) -> bool {
        if !self.guard.try_close() {
            return false;
        }

        // Waits for an in-flight frame to finish; later notifications find `None`.
        let taken = self.resources.lock().take();
        let Some(mut res) = taken else {
            return true;
        };

        if let Some(token) = res.item_closed_token.take() {
            if let Err(e) = res.item.unsubscribe_closed(token) {
                tracing::debug!("failed to unsubscribe item closed handler: {e}");
            }
        }
        if let Some(token) = res.frame_arrived_token.take() {
            if let Err(e) = res.pool.unsubscribe_frame_arrived(token) {
                tracing::debug!("failed to unsubscribe frame arrived handler: {e}");
            }
        }
        if let Err(e) = res.session.close() {
            tracing::warn!("failed to close capture session: {e}");
        }
        if let Err(e) = res.pool.close() {
            tracing::warn!("failed to close frame pool: {e}");
        }
        drop(res);
        tracing::info!("pipeline closed");
        true
    }

    fn on_item_closed(&self) {
        if !self.close() {
            return;
        }
        tracing::info!("capture item closed, pipeline closed");
        if let Some(callback) = &self.on_item_closed {
            callback();
        }
    }

    fn report(&self, err: &CaptureError) {
        match &self.error_sink {
            Some(sink) => sink(err),
            None => options::log_error(err),
        }
    }
}
