// Plain value types shared by the pipeline core and the backends.

use std::fmt;
use std::str::FromStr;

use crate::error::CaptureError;

/// Number of buffers in both the frame pool and the swap chain.
pub const BUFFER_COUNT: u32 = 2;

/// Content size of a capture item or frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ContentSize {
    pub width: i32,
    pub height: i32,
}

impl ContentSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero or negative (e.g. a minimized window).
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn width_u32(&self) -> u32 {
        self.width.max(0) as u32
    }

    pub fn height_u32(&self) -> u32 {
        self.height.max(0) as u32
    }
}

impl fmt::Display for ContentSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of the frame pool and the swap chain.
///
/// Discriminants are the DirectX pixel format values, so they map 1:1 onto
/// `DirectXPixelFormat` and `DXGI_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    /// 8-bit BGRA, normalized. SDR.
    #[default]
    Bgra8 = 87,
    /// 16-bit float RGBA, linear scRGB. HDR.
    Rgba16f = 10,
}

impl PixelFormat {
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            87 => Some(Self::Bgra8),
            10 => Some(Self::Rgba16f),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 => 4,
            Self::Rgba16f => 8,
        }
    }

    /// Parse from a mode string ("bgra8", "rgba16f") or the platform name.
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode {
            "bgra8" | "B8G8R8A8UIntNormalized" => Some(Self::Bgra8),
            "rgba16f" | "R16G16B16A16Float" => Some(Self::Rgba16f),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bgra8 => "bgra8",
            Self::Rgba16f => "rgba16f",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mode(s).ok_or_else(|| {
            CaptureError::InvalidArgument(format!(
                "unknown pixel format '{s}'; expected bgra8 or rgba16f"
            ))
        })
    }
}
