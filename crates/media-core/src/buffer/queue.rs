//! Playout-ordered frame queue

use std::collections::VecDeque;

use rtpjb_rtp_core::MediaFrame;

/// A frame waiting for its playout time
#[derive(Debug, Clone)]
struct QueuedFrame {
    playout: i64,
    frame: MediaFrame,
}

/// Frames ordered by ascending playout time
///
/// Frames with equal playout times keep their insertion order. Dequeued frames
/// carry their playout time in [`MediaFrame::delivery`].
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: VecDeque<QueuedFrame>,
    depth_ms: i64,
}

impl FrameQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total nominal duration of the queued frames
    pub fn depth_ms(&self) -> i64 {
        self.depth_ms
    }

    /// Insert a frame, keeping ascending playout order
    pub fn enqueue(&mut self, playout: i64, frame: MediaFrame) {
        // Arrivals are mostly in order, so search from the back
        let pos = self
            .frames
            .iter()
            .rposition(|queued| queued.playout <= playout)
            .map_or(0, |i| i + 1);
        self.depth_ms += frame.len_ms;
        self.frames.insert(pos, QueuedFrame { playout, frame });
    }

    /// Whether a frame is already queued for `playout`
    pub fn contains_playout(&self, playout: i64) -> bool {
        self.frames.iter().any(|queued| queued.playout == playout)
    }

    /// Remove every frame due at `now`, in playout order
    pub fn dequeue_due(&mut self, now: i64) -> Vec<MediaFrame> {
        let mut due = Vec::new();
        while let Some(frame) = self.pop_due(now) {
            due.push(frame);
        }
        due
    }

    /// Remove the earliest frame if it is due at `now`
    pub fn pop_due(&mut self, now: i64) -> Option<MediaFrame> {
        match self.frames.front() {
            Some(queued) if queued.playout <= now => self.pop_front(),
            _ => None,
        }
    }

    /// Remove the earliest frame regardless of its playout time
    pub fn pop_front(&mut self) -> Option<MediaFrame> {
        let QueuedFrame { playout, mut frame } = self.frames.pop_front()?;
        self.depth_ms -= frame.len_ms;
        frame.delivery = Some(playout);
        Some(frame)
    }

    /// Playout time of the earliest frame
    pub fn peek_next_due_time(&self) -> Option<i64> {
        self.frames.front().map(|queued| queued.playout)
    }

    /// Move every playout time by `delta`, never below `floor`
    ///
    /// Clamping to a common floor keeps the order intact.
    pub fn shift(&mut self, delta: i64, floor: Option<i64>) {
        for queued in &mut self.frames {
            queued.playout += delta;
            if let Some(floor) = floor {
                queued.playout = queued.playout.max(floor);
            }
        }
    }

    /// Drop every frame, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        self.depth_ms = 0;
        dropped
    }
}
