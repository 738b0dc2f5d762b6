// Pluggable per-frame GPU transform.
//
// The pipeline calls `prepare` exactly once, at construction, and `process` once
// per presented frame, after the captured surface has been copied into the back
// buffer and before `Present`. The processor must leave its result in `target`.

use crate::backend::GraphicsDevice;
use crate::capture::{ContentSize, PixelFormat};
use crate::error::Result;

pub trait FrameProcessor<D: GraphicsDevice>: Send {
    /// Build GPU programs and other long-lived state.
    fn prepare(&mut self, _device: &D) -> Result<()> {
        Ok(())
    }

    /// Fail with `Unsupported` if frames of `format` cannot be processed on `device`.
    ///
    /// Checked at construction and before a requested format is applied, never per frame.
    fn check_format(&self, _device: &D, _format: PixelFormat) -> Result<()> {
        Ok(())
    }

    /// Whether swap chain buffers must be bindable as unordered-access views.
    fn needs_unordered_access(&self) -> bool {
        false
    }

    /// Transform `target` in place. `size` and `format` describe `target`.
    fn process(
        &mut self,
        device: &D,
        target: &D::Texture,
        size: ContentSize,
        format: PixelFormat,
    ) -> Result<()>;
}
