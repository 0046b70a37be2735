//! Simulates a chat burst against the caption overlay and logs lane choices.
//!
//! Run with `RUST_LOG=debug cargo run --example burst`.

use gpui_danmaku::{DanmakuEvent, DanmakuOptions, DanmakuOverlay, LaneScheduler, lane_offset};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let start = Instant::now();
    let mut overlay = DanmakuOverlay::new(
        DanmakuOptions::default(),
        (1280, 720),
        LaneScheduler::from_entropy(),
        start,
    )
    .expect("default options are valid");

    // Captions per second: quiet, a burst, then quiet again.
    let load = [2, 3, 14, 15, 16, 12, 3, 1, 0, 0, 0, 2];

    for (second, &count) in load.iter().enumerate() {
        let now = start + Duration::from_secs(second as u64);
        overlay.advance(now);

        let mut lanes = Vec::with_capacity(count);
        for n in 0..count {
            let at = now + Duration::from_millis(n as u64 * 1000 / count as u64);
            match overlay.launch(&format!("caption {second}.{n}"), at) {
                Ok(caption) => lanes.push(caption.lane()),
                Err(err) => log::error!("launch failed: {err}"),
            }
        }

        for event in overlay.drain_events() {
            if let DanmakuEvent::ModeChanged(mode) = event {
                log::info!("t={second}s switched to {mode:?}");
            }
        }

        let offsets: Vec<u32> = lanes.iter().map(|&l| lane_offset(l, 720)).collect();
        log::info!(
            "t={second}s mode={:?} on_screen={} lanes={lanes:?} y={offsets:?}",
            overlay.mode(),
            overlay.captions().count()
        );
    }

    overlay.set_visible(false);
    for event in overlay.drain_events() {
        log::info!("{event:?}");
    }
}
