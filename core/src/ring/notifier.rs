//! Driver-side slot release

use std::sync::Arc;

use tracing::warn;

use super::OutputRing;

/// Releases output slots when the device finishes playing them
///
/// Cheap to clone and safe to call from the driver's callback thread at any
/// point relative to the frame loop. Completing a slot only clears its
/// `in_flight` flag and wakes a waiting producer.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    ring: Arc<OutputRing>,
}

impl CompletionNotifier {
    pub(super) fn new(ring: Arc<OutputRing>) -> Self {
        Self { ring }
    }

    /// Mark slot `index` as free for reuse
    pub fn complete(&self, index: usize) {
        if index >= self.ring.depth() {
            warn!("completion for unknown output slot {}", index);
            return;
        }
        self.ring.release(index);
    }

    pub fn ring(&self) -> &Arc<OutputRing> {
        &self.ring
    }
}
