// Error taxonomy shared by the pipeline core and the platform backends.
//
// Backends work with anyhow internally and classify at the trait boundary:
// device-removed style failures become `DeviceLost`, everything else `Platform`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Null/empty inputs rejected before any state is created.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation on closed pipeline")]
    Closed,

    /// The GPU device was removed or reset. The pipeline must be closed and rebuilt
    /// against a fresh device.
    #[error("graphics device lost: {0}")]
    DeviceLost(String),

    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("not supported on this system: {0}")]
    Unsupported(String),

    #[error("shader compilation failed: {0}")]
    Shader(String),

    #[error(transparent)]
    Platform(anyhow::Error),
}

impl From<anyhow::Error> for CaptureError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_platform(err)
    }
}

impl CaptureError {
    /// Whether the owning pipeline is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::DeviceLost(_))
    }

    /// Classify a backend failure.
    ///
    /// Walks the anyhow chain looking for a platform error code that means the
    /// device is gone; anything else stays a generic platform error.
    pub fn from_platform(err: anyhow::Error) -> Self {
        #[cfg(windows)]
        {
            let lost = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<windows::core::Error>())
                .any(|e| crate::d3d11::is_device_lost(e.code()));
            if lost {
                return CaptureError::DeviceLost(format!("{err:#}"));
            }
        }
        CaptureError::Platform(err)
    }
}
