// Lifecycle guard: a single atomic closed flag.
//
// `try_close` is a compare-and-set; exactly one caller ever wins and runs teardown.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CaptureError, Result};

#[derive(Debug, Default)]
pub(crate) struct LifecycleGuard {
    closed: AtomicBool,
}

impl LifecycleGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fails with `Closed` once any `try_close` has won.
    pub(crate) fn check(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CaptureError::Closed);
        }
        Ok(())
    }

    /// Returns true for the one caller that flips the flag.
    pub(crate) fn try_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_winner() {
        let guard = LifecycleGuard::new();
        assert!(guard.check().is_ok());
        assert!(guard.try_close());
        assert!(!guard.try_close());
        assert!(matches!(guard.check(), Err(CaptureError::Closed)));
    }

    #[test]
    fn test_single_winner_across_threads() {
        let guard = Arc::new(LifecycleGuard::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if guard.try_close() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(guard.is_closed());
    }
}
