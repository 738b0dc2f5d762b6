//! # livecapture
//!
//! Live mirror of a window or monitor into a GPU swap chain ready for composition.
//!
//! Frames delivered by Windows Graphics Capture are copied into the back buffer
//! of a DXGI flip-model swap chain, optionally run through a compute shader, and
//! presented. The swap chain follows the source's size and the requested pixel
//! format, and teardown is safe against in-flight frame callbacks.
//!
//! The pipeline core is generic over [`backend::GraphicsDevice`]; the Direct3D 11
//! backend lives in `d3d11` and is only built on Windows.
//!
//! ## Rust usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use livecapture::capture::WgcItem;
//! use livecapture::d3d11::create_d3d11_device;
//! use livecapture::pipeline::{Pipeline, PipelineOptions};
//!
//! let device = Arc::new(create_d3d11_device()?);
//! let item = WgcItem::primary_monitor()?;
//! let pipeline = Pipeline::new(device, item, PipelineOptions::default())?;
//! let surface = pipeline.create_surface(&compositor)?;
//! pipeline.start_capture()?;
//! ```

pub mod backend;
pub mod capture;
#[cfg(windows)]
pub mod d3d11;
pub mod error;
pub mod image;
pub mod logging;
pub mod pipeline;
pub mod processing;
#[cfg(windows)]
mod shader;

pub use capture::{ContentSize, PixelFormat};
pub use error::{CaptureError, Result};
pub use pipeline::{Pipeline, PipelineOptions, PipelineStats};
