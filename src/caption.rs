use crate::lanes::LANE_COUNT;
use std::time::{Duration, Instant};

/// Identifier of a launched caption, unique within one overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptionId(pub u64);

/// A caption scrolling right to left across one lane.
#[derive(Debug, Clone)]
pub struct Caption {
    id: CaptionId,
    text: String,
    lane: usize,
    start: (f32, f32),
    end: (f32, f32),
    launched_at: Instant,
    duration: Duration,
}

impl Caption {
    pub(crate) fn new(
        id: CaptionId,
        text: String,
        lane: usize,
        surface: (u32, u32),
        exit_x: f32,
        duration: Duration,
        launched_at: Instant,
    ) -> Self {
        let (width, height) = surface;
        let y = lane_offset(lane, height) as f32;
        Self {
            id,
            text,
            lane,
            start: (width as f32, y),
            end: (exit_x, y),
            launched_at,
            duration,
        }
    }

    pub fn id(&self) -> CaptionId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Point the caption enters from.
    pub fn start(&self) -> (f32, f32) {
        self.start
    }

    /// Point at which the caption is finished.
    pub fn end(&self) -> (f32, f32) {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Fraction of the traversal completed at `now`, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.launched_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    /// Top-left position at `now`, moving linearly from start to end.
    pub fn position_at(&self, now: Instant) -> (f32, f32) {
        let t = self.progress(now);
        let x = self.start.0 + (self.end.0 - self.start.0) * t;
        (x, self.start.1)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.launched_at) >= self.duration
    }
}

/// Vertical offset of `lane` on a surface `height` pixels tall.
pub fn lane_offset(lane: usize, height: u32) -> u32 {
    lane as u32 * (height / LANE_COUNT as u32)
}
