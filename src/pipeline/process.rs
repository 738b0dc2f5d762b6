// Per-frame stage: get frame → resize check → copy → process → present → format check → recreate
//
// Runs on the frame-arrived delivery thread with the resource lock held, so it
// never interleaves with close() or with another notification.

use super::*;
use crate::backend::{CapturedFrame, SwapChain};
use crate::capture::BUFFER_COUNT;

enum FrameOutcome {
    /// Notification fired but the pool had nothing for us.
    Idle,
    Presented,
    Dropped,
}

/// What one notification did. Drawing and the post-present steps fail independently.
struct FrameReport {
    drawn: Result<FrameOutcome>,
    reformatted: Result<()>,
    recreated: Result<()>,
}

impl FrameReport {
    fn idle() -> Self {
        Self {
            drawn: Ok(FrameOutcome::Idle),
            reformatted: Ok(()),
            recreated: Ok(()),
        }
    }
}

impl<D: GraphicsDevice> Shared<D> {
    /// Frame-arrived handler. A closed pipeline makes this a no-op.
    pub(super) fn on_frame_arrived(&self) {
        let report = {
            let mut resources = self.resources.lock();
            let Some(res) = resources.as_mut() else {
                tracing::trace!("frame arrived after close, ignoring");
                return;
            };
            self.process_frame(res)
        };

        // Reported without the lock so the sink may call close().
        match report.drawn {
            Ok(FrameOutcome::Presented) => self.stats.presented(),
            Ok(FrameOutcome::Dropped) => self.stats.dropped(),
            Ok(FrameOutcome::Idle) => {}
            Err(e) => {
                self.stats.dropped();
                self.report(&e);
            }
        }
        // The frame is already on screen (or already counted as dropped).
        if let Err(e) = report.reformatted {
            self.report(&e);
        }
        if let Err(e) = report.recreated {
            self.report(&e);
        }
    }

    fn process_frame(&self, res: &mut Resources<D>) -> FrameReport {
        let frame = match res.pool.try_get_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("frame arrived but the pool was empty");
                return FrameReport::idle();
            }
            Err(e) => {
                return FrameReport {
                    drawn: Err(e),
                    ..FrameReport::idle()
                }
            }
        };

        let drawn = self.draw(res, &frame);
        // Release the pool slot before the pool is touched again.
        drop(frame);

        // Format and pool updates run even when drawing failed, so a resize that
        // already happened still gets its matching pool.
        let reformatted = self.apply_pending_format(res).map(|applied| {
            if applied {
                res.pool_stale = true;
            }
        });
        let recreated = if res.pool_stale {
            self.recreate_pool(res)
        } else {
            Ok(())
        };

        FrameReport {
            drawn,
            reformatted,
            recreated,
        }
    }

    /// Step 7. A failure leaves the pool marked stale so the next notification retries.
    fn recreate_pool(&self, res: &mut Resources<D>) -> Result<()> {
        self.device
            .recreate_frame_pool(&res.pool, res.pixel_format, BUFFER_COUNT, res.last_size)?;
        res.pool_stale = false;
        self.stats.recreated();
        tracing::debug!(
            "frame pool recreated ({}, {})",
            res.last_size,
            res.pixel_format
        );
        Ok(())
    }

    /// Steps 2 to 5: resize check, copy, optional processing, present.
    fn draw(&self, res: &mut Resources<D>, frame: &D::Frame) -> Result<FrameOutcome> {
        let content_size = frame.content_size()?;
        if content_size.is_empty() {
            tracing::warn!("dropping frame with empty content size {content_size}");
            return Ok(FrameOutcome::Dropped);
        }

        if content_size != res.last_size {
            // last_size only moves once the swap chain matches it; a failed resize retries next frame.
            res.swap_chain
                .resize(content_size, res.pixel_format, BUFFER_COUNT)?;
            tracing::debug!("content size {} -> {content_size}", res.last_size);
            res.last_size = content_size;
            self.stats.resized();
            res.pool_stale = true;
        }

        let back_buffer = res.swap_chain.back_buffer()?;
        let surface = frame.surface()?;
        self.device
            .copy_texture(&back_buffer, &surface, res.last_size)?;

        if let Some(processor) = res.processor.as_mut() {
            processor.process(&self.device, &back_buffer, res.last_size, res.pixel_format)?;
        }

        if self.retain_last_frame {
            self.retain(res, &back_buffer)?;
        }

        res.swap_chain.present()?;
        tracing::trace!("presented {} frame", res.last_size);
        Ok(FrameOutcome::Presented)
    }

    /// Step 6: consume the pending format. `Ok(true)` when a new format was applied.
    ///
    /// A rejected or failed request is dropped; the current format stays.
    fn apply_pending_format(&self, res: &mut Resources<D>) -> Result<bool> {
        let Some(format) = self.pending_format.take() else {
            return Ok(false);
        };
        if format == res.pixel_format {
            return Ok(false);
        }
        if let Some(processor) = res.processor.as_ref() {
            processor.check_format(&self.device, format)?;
        }
        res.swap_chain.resize(res.last_size, format, BUFFER_COUNT)?;
        tracing::debug!("pixel format {} -> {format}", res.pixel_format);
        res.pixel_format = format;
        self.stats.resized();
        self.stats.format_changed();
        Ok(true)
    }

    /// Copy the back buffer aside; flip-model buffers are not readable after present.
    fn retain(&self, res: &mut Resources<D>, back_buffer: &D::Texture) -> Result<()> {
        let stale = res
            .retained
            .as_ref()
            .is_none_or(|r| r.size != res.last_size || r.format != res.pixel_format);
        if stale {
            res.retained = Some(RetainedFrame {
                texture: self.device.create_texture(res.last_size, res.pixel_format)?,
                size: res.last_size,
                format: res.pixel_format,
            });
        }
        if let Some(retained) = &res.retained {
            self.device
                .copy_texture(&retained.texture, back_buffer, res.last_size)?;
        }
        Ok(())
    }
}
