use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Longest video id the ledger will remember
const MAX_VIDEO_ID_LEN: usize = 64;

/// Live entries kept at once; the oldest is evicted beyond this
const MAX_PENDING: usize = 10_000;

/// Video ids whose automated acquisition failed recently.
///
/// A manual upload naming one of these ids completes that failed request.
/// Entries expire after `window` and are consumed by a matching upload.
pub struct UploadLedger {
    window: Duration,
    capacity: usize,
    pending: Mutex<HashMap<String, Instant>>,
}

impl UploadLedger {
    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, MAX_PENDING)
    }

    pub fn with_capacity(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Remember that every strategy failed for `video_id`
    pub fn record_exhausted(&self, video_id: &str) {
        if video_id.len() > MAX_VIDEO_ID_LEN {
            tracing::debug!("Not recording oversized video id ({} bytes)", video_id.len());
            return;
        }

        let now = Instant::now();
        let mut pending = self.pending.lock();
        Self::prune(&mut pending, now, self.window);

        if !pending.contains_key(video_id) && pending.len() >= self.capacity {
            let oldest = pending
                .iter()
                .min_by_key(|(_, recorded)| **recorded)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                pending.remove(&oldest);
            }
        }

        pending.insert(video_id.to_string(), now);
    }

    /// Consume the pending entry for `video_id`, if one is still live
    pub fn claim(&self, video_id: &str) -> bool {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        Self::prune(&mut pending, now, self.window);
        pending.remove(video_id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock();
        Self::prune(&mut pending, Instant::now(), self.window);
        pending.len()
    }

    fn prune(pending: &mut HashMap<String, Instant>, now: Instant, window: Duration) {
        pending.retain(|_, recorded| now.duration_since(*recorded) < window);
    }
}
