use std::sync::Weak;

use super::*;
use crate::backend::SwapChainUsage;
use crate::capture::BUFFER_COUNT;

impl<D: GraphicsDevice> Pipeline<D> {
    /// Bind a pipeline to `item`, presenting through a swap chain on `device`.
    ///
    /// The swap chain and frame pool start at the item's current size and
    /// `options.pixel_format`. Capture does not start until `start_capture()`.
    pub fn new(device: Arc<D>, item: D::Item, options: PipelineOptions) -> Result<Self> {
        Self::build(device, item, options, None)
    }

    /// Like `new`, with a processing stage run on every frame before present.
    ///
    /// `processor.prepare()` runs here, once; its GPU programs live as long as the pipeline.
    pub fn with_processor(
        device: Arc<D>,
        item: D::Item,
        options: PipelineOptions,
        processor: Box<dyn FrameProcessor<D>>,
    ) -> Result<Self> {
        Self::build(device, item, options, Some(processor))
    }

    fn build(
        device: Arc<D>,
        item: D::Item,
        options: PipelineOptions,
        mut processor: Option<Box<dyn FrameProcessor<D>>>,
    ) -> Result<Self> {
        let size = item.size()?;
        if size.is_empty() {
            return Err(CaptureError::InvalidArgument(format!(
                "capture item has empty content size {size}"
            )));
        }
        let pixel_format = options.pixel_format;

        if let Some(processor) = processor.as_mut() {
            processor.prepare(&device)?;
            processor.check_format(&device, pixel_format)?;
        }
        let usage = SwapChainUsage {
            unordered_access: processor
                .as_ref()
                .is_some_and(|p| p.needs_unordered_access()),
        };

        let swap_chain = device.create_swap_chain(size, pixel_format, BUFFER_COUNT, usage)?;
        let mut pool =
            device.create_frame_pool(pixel_format, BUFFER_COUNT, size, options.delivery)?;
        let session = device.create_session(&pool, &item)?;

        if let Some(enabled) = options.cursor_enabled {
            session.set_cursor_capture_enabled(enabled)?;
        }
        if let Some(required) = options.border_required {
            session.set_border_required(required)?;
        }

        let shared = Arc::new(Shared {
            device,
            guard: LifecycleGuard::new(),
            pending_format: PendingFormat::new(),
            resources: Mutex::new(None),
            stats: StatsCounters::default(),
            error_sink: options.error_sink,
            on_item_closed: options.on_item_closed,
            retain_last_frame: options.retain_last_frame,
        });

        // Handlers hold weak references so the pool and item never keep the pipeline alive.
        let weak: Weak<Shared<D>> = Arc::downgrade(&shared);
        let frame_arrived_token = pool.subscribe_frame_arrived(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_frame_arrived();
            }
        }))?;

        let weak: Weak<Shared<D>> = Arc::downgrade(&shared);
        let item_closed_token = item.subscribe_closed(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_item_closed();
            }
        }))?;

        *shared.resources.lock() = Some(Resources {
            item,
            item_closed_token: Some(item_closed_token),
            pool,
            frame_arrived_token: Some(frame_arrived_token),
            session,
            swap_chain,
            surface: None,
            processor,
            last_size: size,
            pixel_format,
            pool_stale: false,
            started: false,
            retained: None,
        });

        tracing::info!(
            "pipeline created ({size}, {pixel_format}, {:?} delivery)",
            options.delivery
        );
        Ok(Self { shared })
    }
}
