use std::fmt;
use std::sync::Arc;

use crate::backend::FrameDelivery;
use crate::capture::PixelFormat;
use crate::error::CaptureError;

/// Receives errors raised inside the frame-arrived callback, which has no caller
/// to return to. Never invoked while the pipeline holds its internal lock.
pub type ErrorSink = Arc<dyn Fn(&CaptureError) + Send + Sync>;

/// Invoked after the pipeline closed itself because the capture item went away.
pub type ItemClosedCallback = Arc<dyn Fn() + Send + Sync>;

/// Pipeline construction options.
#[derive(Clone, Default)]
pub struct PipelineOptions {
    /// Initial format of the frame pool and swap chain.
    pub pixel_format: PixelFormat,
    pub delivery: FrameDelivery,
    /// Applied to the session at construction when set.
    pub cursor_enabled: Option<bool>,
    /// Applied to the session at construction when set. No access request is made.
    pub border_required: Option<bool>,
    /// Keep a copy of each presented frame so `snapshot()` can read it back.
    pub retain_last_frame: bool,
    pub error_sink: Option<ErrorSink>,
    pub on_item_closed: Option<ItemClosedCallback>,
}

impl PipelineOptions {
    pub fn new(pixel_format: PixelFormat) -> Self {
        Self {
            pixel_format,
            ..Self::default()
        }
    }

    pub fn with_delivery(mut self, delivery: FrameDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_retain_last_frame(mut self, retain: bool) -> Self {
        self.retain_last_frame = retain;
        self
    }

    pub fn with_error_sink(mut self, sink: impl Fn(&CaptureError) + Send + Sync + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    pub fn with_item_closed(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_item_closed = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("pixel_format", &self.pixel_format)
            .field("delivery", &self.delivery)
            .field("cursor_enabled", &self.cursor_enabled)
            .field("border_required", &self.border_required)
            .field("retain_last_frame", &self.retain_last_frame)
            .field("error_sink", &self.error_sink.is_some())
            .field("on_item_closed", &self.on_item_closed.is_some())
            .finish()
    }
}

/// Default sink: log and carry on.
pub(crate) fn log_error(err: &CaptureError) {
    if err.is_fatal() {
        tracing::error!("frame processing failed, pipeline must be rebuilt: {err}");
    } else {
        tracing::error!("frame processing failed: {err}");
    }
}
