use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frame receipt counters shared between ingestion and health queries
#[derive(Clone)]
pub struct FrameStats {
    /// Frames received since start (lifetime counter)
    total_frames: Arc<AtomicU64>,

    /// Receipt times (ms since epoch), oldest evicted once full
    receipt_times: Arc<RwLock<VecDeque<i64>>>,

    capacity: usize,

    /// When the ingestion path was started, if it is running
    started_at: Arc<Mutex<Option<i64>>>,
}

impl FrameStats {
    /// `capacity` receipt times are kept (~5 s at 120 Hz for 600)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            receipt_times: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            started_at: Arc::new(Mutex::new(None)),
        }
    }

    /// Record a frame receipt; returns the new frame count
    pub fn record_frame(&self, now_ms: i64) -> u64 {
        let count = self.total_frames.fetch_add(1, Ordering::Relaxed) + 1;

        let mut times = self.receipt_times.write();
        if times.len() == self.capacity {
            times.pop_front();
        }
        times.push_back(now_ms);

        count
    }

    pub fn mark_started(&self, now_ms: i64) {
        *self.started_at.lock() = Some(now_ms);
    }

    pub fn mark_stopped(&self) {
        *self.started_at.lock() = None;
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        *self.started_at.lock()
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    pub fn last_receipt_ms(&self) -> Option<i64> {
        self.receipt_times.read().back().copied()
    }

    /// Receipts younger than `window_ms` divided by the span they cover
    /// (frames per second); 0 with fewer than two receipts in the window.
    pub fn frame_rate(&self, now_ms: i64, window_ms: i64) -> f64 {
        let times = self.receipt_times.read();
        let mut recent = times.iter().filter(|&&t| now_ms - t < window_ms);

        let Some(&first) = recent.next() else {
            return 0.0;
        };
        let (count, last) = recent.fold((1usize, first), |(n, _), &t| (n + 1, t));
        if count < 2 {
            return 0.0;
        }

        let span_seconds = (last - first) as f64 / 1000.0;
        if span_seconds > 0.0 {
            count as f64 / span_seconds
        } else {
            0.0
        }
    }

    /// Receipt times currently held
    pub fn window_len(&self) -> usize {
        self.receipt_times.read().len()
    }
}
