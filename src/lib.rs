//! # GPUI Danmaku
//!
//! Floating caption ("danmaku") support for video players.
//!
//! ## Features
//!
//! - Lane scheduling over 24 lanes with a shuffled hand-out order
//! - Load-sensitive lane count (12 lanes normally, 24 under heavy traffic)
//! - Caption geometry and linear scroll timing for any surface size
//! - Show/hide toggling that restarts the scheduler on every enable
//! - Event-driven architecture for handling overlay events
//!
//! ## Example
//!
//! ```rust
//! use gpui_danmaku::{DanmakuOptions, DanmakuOverlay, LaneScheduler};
//! use std::time::{Duration, Instant};
//!
//! let start = Instant::now();
//! let mut overlay = DanmakuOverlay::new(
//!     DanmakuOptions::default(),
//!     (1280, 720),
//!     LaneScheduler::seeded(7),
//!     start,
//! )
//! .unwrap();
//!
//! let caption = overlay.launch("first!", start).unwrap();
//! assert!(caption.lane() < 12);
//!
//! // Drive the overlay from the host's frame or timer callback.
//! overlay.advance(start + Duration::from_secs(1));
//! ```

mod caption;
mod error;
mod lanes;
mod options;
mod overlay;

pub use caption::{Caption, CaptionId, lane_offset};
pub use error::Error;
pub use lanes::{
    FrequencyHistory, HIGH_FREQUENCY_THRESHOLD, LANE_COUNT, LanePermutation, LaneScheduler, Mode,
    NORMAL_LANES, partial_shuffle,
};
pub use options::{DanmakuOptions, Rgb};
pub use overlay::{DanmakuEvent, DanmakuOverlay, MAX_PENDING_EVENTS, SharedOverlay};

// Re-export commonly used types
pub use rand;
