//! Pull-based access to the latest preview frame

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

use crate::backend::NativeWindow;
use crate::types::FrameBuffer;

/// Counters kept by a [`FrameAccessor`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Calls that returned a buffer
    pub frames_pulled: u64,
    /// Calls that returned the same buffer as the previous call
    pub repeated: u64,
    /// Calls that found no buffer queued
    pub empty_polls: u64,
    /// Sequence number of the last buffer returned
    pub last_sequence: Option<u64>,
}

/// Non-blocking reader of the most recently queued buffer on a window
pub struct FrameAccessor {
    window: Arc<dyn NativeWindow>,
    stats: Mutex<FrameStats>,
}

impl FrameAccessor {
    pub fn new(window: Arc<dyn NativeWindow>) -> Self {
        Self {
            window,
            stats: Mutex::new(FrameStats::default()),
        }
    }

    /// Latest buffer queued on the window, or `None` if nothing was queued yet
    pub fn latest(&self) -> Option<FrameBuffer> {
        let buffer = self.window.last_queued_buffer();

        let mut stats = self.stats.lock();
        match &buffer {
            Some(frame) => {
                if stats.last_sequence == Some(frame.sequence) {
                    stats.repeated += 1;
                }
                stats.frames_pulled += 1;
                stats.last_sequence = Some(frame.sequence);
                trace!(
                    "Pulled frame #{} ({}x{})",
                    frame.sequence, frame.width, frame.height
                );
            }
            None => stats.empty_polls += 1,
        }

        buffer
    }

    pub fn stats(&self) -> FrameStats {
        *self.stats.lock()
    }

    pub fn window(&self) -> &Arc<dyn NativeWindow> {
        &self.window
    }
}
