// Single-slot, last-writer-wins pending pixel format.
//
// Written from the owning thread, consumed by the frame stage. Zero means empty;
// every PixelFormat has a non-zero raw value.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::capture::PixelFormat;

const EMPTY: u32 = 0;

#[derive(Debug, Default)]
pub(crate) struct PendingFormat {
    slot: AtomicU32,
}

impl PendingFormat {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Overwrites any request not yet consumed.
    pub(crate) fn set(&self, format: PixelFormat) {
        self.slot.store(format.raw(), Ordering::Release);
    }

    /// Takes the pending request, leaving the slot empty.
    pub(crate) fn take(&self) -> Option<PixelFormat> {
        PixelFormat::from_raw(self.slot.swap(EMPTY, Ordering::AcqRel))
    }
}
