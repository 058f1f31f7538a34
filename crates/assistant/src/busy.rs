//! Busy flags for the two kinds of long-running action.
//!
//! Each flag is held by an RAII guard, so it is cleared on every exit path
//! including errors and cancellation of the awaiting task.

use std::sync::atomic::{AtomicBool, Ordering};

use paperdesk_core::error::{Error, Result};

#[derive(Debug, Default)]
pub struct BusyFlags {
    processing: AtomicBool,
    analyzing: AtomicBool,
}

/// Which flag an action holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    /// Upload and text extraction.
    Processing,
    /// Initial analysis and follow-up questions.
    Analyzing,
}

impl BusyFlags {
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    /// Claim the flag for `kind`, or fail with `Busy` if it is already held.
    pub fn acquire(&self, kind: BusyKind) -> Result<BusyGuard<'_>> {
        let flag = match kind {
            BusyKind::Processing => &self.processing,
            BusyKind::Analyzing => &self.analyzing,
        };
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                Error::Busy(match kind {
                    BusyKind::Processing => "a paper is already being processed".into(),
                    BusyKind::Analyzing => "an analysis is already in progress".into(),
                })
            })?;
        Ok(BusyGuard { flag })
    }
}

/// Clears its flag on drop.
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
