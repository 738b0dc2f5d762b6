// Capture-side types and the Windows Graphics Capture backend.

pub mod types;
#[cfg(windows)]
pub mod wgc;

pub use types::{ContentSize, PixelFormat, BUFFER_COUNT};
#[cfg(windows)]
pub use wgc::{WgcFrame, WgcFramePool, WgcItem, WgcSession};
