//! Wave Context
//!
//! Tracks whether a graph is in the middle of a mutation. Every write, node
//! construction and `end` enters the context first; a second mutation that
//! arrives before the first one has finished is rejected.
//!
//! # Implementation
//!
//! Each graph owns one `AtomicBool`. Entering flips it from `false` to
//! `true` and hands back a guard; dropping the guard flips it back. The guard
//! is released on unwind too, so a panicking compute function does not leave
//! the graph locked.
//!
//! Compute functions run while the context is held. A write from inside one
//! (or from another thread while a wave is running) fails with
//! [`GraphError::Reentrant`] instead of corrupting the wave in progress.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{GraphError, Result};

/// Guard that releases the context when dropped.
#[derive(Debug)]
pub(crate) struct WaveContext<'a> {
    busy: &'a AtomicBool,
    op: &'static str,
}

impl<'a> WaveContext<'a> {
    /// Enter the context for `op`, or fail if another mutation holds it.
    pub(crate) fn enter(busy: &'a AtomicBool, op: &'static str) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GraphError::Reentrant { op })?;
        Ok(Self { busy, op })
    }

    /// Check if a mutation is in progress.
    pub(crate) fn is_active(busy: &AtomicBool) -> bool {
        busy.load(Ordering::Acquire)
    }

    /// The operation holding the context.
    pub(crate) fn op(&self) -> &'static str {
        self.op
    }
}

impl Drop for WaveContext<'_> {
    fn drop(&mut self) {
        let was_busy = self.busy.swap(false, Ordering::AcqRel);
        debug_assert!(was_busy, "wave context for {} released twice", self.op());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn context_is_exclusive() {
        let busy = AtomicBool::new(false);
        assert!(!WaveContext::is_active(&busy));

        {
            let ctx = WaveContext::enter(&busy, "write").unwrap();
            assert_eq!(ctx.op(), "write");
            assert!(WaveContext::is_active(&busy));

            let nested = WaveContext::enter(&busy, "end");
            assert_eq!(nested.unwrap_err(), GraphError::Reentrant { op: "end" });
        }

        // Context should be released after drop
        assert!(!WaveContext::is_active(&busy));
        assert!(WaveContext::enter(&busy, "write").is_ok());
    }

    #[test]
    fn context_is_released_on_panic() {
        let busy = AtomicBool::new(false);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _ctx = WaveContext::enter(&busy, "write").unwrap();
            panic!("compute function blew up");
        }));

        assert!(result.is_err());
        assert!(!WaveContext::is_active(&busy));
    }
}
