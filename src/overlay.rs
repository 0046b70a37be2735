use crate::Error;
use crate::caption::{Caption, CaptionId};
use crate::lanes::{LaneScheduler, Mode};
use crate::options::DanmakuOptions;
use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use rand::rngs::StdRng;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ticks after which an idle load history is all zeros.
const IDLE_FLUSH_TICKS: u128 = 4;

/// Undrained events kept before the oldest are discarded.
pub const MAX_PENDING_EVENTS: usize = 1024;

/// Events that can be emitted by the caption overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanmakuEvent {
    /// A caption started scrolling.
    Launched { id: CaptionId, lane: usize },
    /// A caption reached the exit edge and was dropped.
    Expired(CaptionId),
    /// The overlay was hidden and its captions removed.
    Cleared { count: usize },
    /// The scheduler switched lane mode.
    ModeChanged(Mode),
}

/// Bounded queue of events waiting for the host.
#[derive(Debug, Default)]
struct EventQueue {
    events: SmallVec<[DanmakuEvent; 4]>,
    dropped: u64,
}

impl EventQueue {
    fn push(&mut self, event: DanmakuEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            let discard = MAX_PENDING_EVENTS / 2;
            if self.dropped == 0 {
                log::warn!("overlay events are not being drained, discarding oldest");
            }
            self.events.drain(..discard);
            self.dropped += discard as u64;
        }
        self.events.push(event);
    }

    fn take(&mut self) -> SmallVec<[DanmakuEvent; 4]> {
        self.dropped = 0;
        std::mem::take(&mut self.events)
    }
}

/// Caption overlay state for a video surface.
///
/// Owns the lane scheduler and the captions currently on screen. The host
/// calls [`launch`](Self::launch) for each outgoing caption and
/// [`advance`](Self::advance) once per frame or timer tick.
#[derive(Debug)]
pub struct DanmakuOverlay<R = StdRng> {
    scheduler: LaneScheduler<R>,
    options: DanmakuOptions,
    surface: (u32, u32),
    visible: bool,
    captions: Vec<Caption>,
    events: EventQueue,
    next_id: u64,
    last_tick: Instant,
}

impl DanmakuOverlay<StdRng> {
    /// Create an overlay whose lane order is seeded from the operating system.
    pub fn from_entropy(
        options: DanmakuOptions,
        surface: (u32, u32),
        now: Instant,
    ) -> Result<Self, Error> {
        Self::new(options, surface, LaneScheduler::from_entropy(), now)
    }
}

impl<R: Rng> DanmakuOverlay<R> {
    /// Create a visible overlay on a `(width, height)` surface.
    pub fn new(
        options: DanmakuOptions,
        surface: (u32, u32),
        scheduler: LaneScheduler<R>,
        now: Instant,
    ) -> Result<Self, Error> {
        options.validate()?;
        check_surface(surface)?;
        Ok(Self {
            scheduler,
            options,
            surface,
            visible: true,
            captions: Vec::new(),
            events: EventQueue::default(),
            next_id: 0,
            last_tick: now,
        })
    }

    /// Update the surface size used for captions launched from now on.
    pub fn set_surface_size(&mut self, width: u32, height: u32) -> Result<(), Error> {
        check_surface((width, height))?;
        self.surface = (width, height);
        Ok(())
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    /// Start a caption scrolling across the surface.
    pub fn launch(&mut self, text: &str, now: Instant) -> Result<&Caption, Error> {
        if !self.visible {
            log::warn!("dropping caption while overlay is hidden");
            return Err(Error::Hidden);
        }
        let text = self.options.prepare_text(text)?;

        let mode = self.scheduler.mode();
        let lane = self.scheduler.submit();
        if self.scheduler.mode() != mode {
            self.events.push(DanmakuEvent::ModeChanged(self.scheduler.mode()));
        }

        let id = CaptionId(self.next_id);
        self.next_id += 1;

        let caption = Caption::new(
            id,
            text,
            lane,
            self.surface,
            self.options.exit_x,
            self.options.scroll_duration(self.surface.0),
            now,
        );
        log::debug!("caption {} -> lane {lane}", id.0);
        self.events.push(DanmakuEvent::Launched { id, lane });
        self.captions.push(caption);
        Ok(&self.captions[self.captions.len() - 1])
    }

    /// Show or hide the overlay.
    ///
    /// Hiding removes every caption; showing starts the scheduler afresh.
    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        if visible {
            log::info!("caption overlay enabled");
            self.scheduler.reset();
        } else {
            let count = self.captions.len();
            log::info!("caption overlay disabled, closing {count} captions");
            self.captions.clear();
            self.events.push(DanmakuEvent::Cleared { count });
        }
    }

    /// Flip visibility, returning the new state.
    pub fn toggle_visible(&mut self) -> bool {
        self.set_visible(!self.visible);
        self.visible
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Run any load ticks that fell due and drop finished captions.
    ///
    /// After a long gap only enough ticks to empty the history are run; the
    /// tick clock still moves forward by every whole interval that passed.
    pub fn advance(&mut self, now: Instant) {
        let interval = self.options.tick_interval;
        let elapsed = now.saturating_duration_since(self.last_tick);
        let due = elapsed.as_nanos() / interval.as_nanos();
        if due > 0 {
            for _ in 0..due.min(IDLE_FLUSH_TICKS) {
                self.scheduler.tick();
            }
            let rest = elapsed.as_nanos() % interval.as_nanos();
            let rest = Duration::from_nanos(u64::try_from(rest).unwrap_or(u64::MAX));
            self.last_tick = now.checked_sub(rest).unwrap_or(now);
        }

        let events = &mut self.events;
        self.captions.retain(|caption| {
            let finished = caption.is_finished(now);
            if finished {
                events.push(DanmakuEvent::Expired(caption.id()));
            }
            !finished
        });
    }

    /// Captions currently on screen, oldest first.
    pub fn captions(&self) -> impl Iterator<Item = &Caption> {
        self.captions.iter()
    }

    pub fn mode(&self) -> Mode {
        self.scheduler.mode()
    }

    pub fn scheduler(&self) -> &LaneScheduler<R> {
        &self.scheduler
    }

    pub fn options(&self) -> &DanmakuOptions {
        &self.options
    }

    /// Take every event queued since the last call.
    ///
    /// At most [`MAX_PENDING_EVENTS`] are held; hosts that fall behind lose
    /// the oldest ones.
    pub fn drain_events(&mut self) -> SmallVec<[DanmakuEvent; 4]> {
        self.events.take()
    }

    /// Events discarded since the last [`drain_events`](Self::drain_events).
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped
    }
}

fn check_surface((width, height): (u32, u32)) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidSurface { width, height });
    }
    Ok(())
}

/// Cloneable, lock-protected handle to a [`DanmakuOverlay`].
///
/// For hosts that launch captions and drive the timer from different
/// threads.
#[derive(Debug)]
pub struct SharedOverlay<R = StdRng>(Arc<Mutex<DanmakuOverlay<R>>>);

impl<R> Clone for SharedOverlay<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: Rng> SharedOverlay<R> {
    pub fn new(overlay: DanmakuOverlay<R>) -> Self {
        Self(Arc::new(Mutex::new(overlay)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DanmakuOverlay<R>> {
        self.0.lock()
    }

    /// Launch a caption, returning its id and lane.
    pub fn launch(&self, text: &str, now: Instant) -> Result<(CaptionId, usize), Error> {
        let mut overlay = self.lock();
        let caption = overlay.launch(text, now)?;
        Ok((caption.id(), caption.lane()))
    }

    pub fn advance(&self, now: Instant) {
        self.lock().advance(now)
    }

    pub fn set_visible(&self, visible: bool) {
        self.lock().set_visible(visible)
    }

    pub fn toggle_visible(&self) -> bool {
        self.lock().toggle_visible()
    }

    pub fn set_surface_size(&self, width: u32, height: u32) -> Result<(), Error> {
        self.lock().set_surface_size(width, height)
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode()
    }

    /// Snapshot of on-screen captions as `(id, text, position)` at `now`.
    pub fn positions(&self, now: Instant) -> Vec<(CaptionId, String, (f32, f32))> {
        self.lock()
            .captions()
            .map(|c| (c.id(), c.text().to_string(), c.position_at(now)))
            .collect()
    }

    pub fn drain_events(&self) -> SmallVec<[DanmakuEvent; 4]> {
        self.lock().drain_events()
    }

    /// Run `f` with exclusive access to the overlay.
    pub fn with<T>(&self, f: impl FnOnce(&mut DanmakuOverlay<R>) -> T) -> T {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::NORMAL_LANES;

    fn overlay(now: Instant) -> DanmakuOverlay {
        DanmakuOverlay::new(
            DanmakuOptions::default(),
            (1280, 720),
            LaneScheduler::seeded(17),
            now,
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_surface() {
        let now = Instant::now();
        let err = DanmakuOverlay::new(
            DanmakuOptions::default(),
            (0, 720),
            LaneScheduler::seeded(1),
            now,
        )
        .unwrap_err();
        assert_eq!(err, Error::InvalidSurface { width: 0, height: 720 });

        let mut o = overlay(now);
        assert!(o.set_surface_size(640, 0).is_err());
        assert_eq!(o.surface_size(), (1280, 720));
    }

    #[test]
    fn launch_places_caption_on_lane() {
        let now = Instant::now();
        let mut o = overlay(now);
        let first_lane = o.scheduler().permutation().as_slice()[0];

        let caption = o.launch("  hi there ", now).unwrap();
        assert_eq!(caption.text(), "hi there");
        assert_eq!(caption.lane(), first_lane);
        assert_eq!(caption.start(), (1280.0, (first_lane as u32 * 30) as f32));
        assert_eq!(caption.duration(), Duration::from_millis(12_800));

        let events = o.drain_events();
        assert_eq!(
            events.as_slice(),
            &[DanmakuEvent::Launched { id: CaptionId(0), lane: first_lane }]
        );
        assert!(o.drain_events().is_empty());
    }

    #[test]
    fn empty_caption_is_rejected_without_consuming_a_lane() {
        let now = Instant::now();
        let mut o = overlay(now);
        assert_eq!(o.launch("   ", now).unwrap_err(), Error::EmptyCaption);
        assert_eq!(o.scheduler().cursor(), 0);
        assert_eq!(o.scheduler().history().current(), 0);
    }

    #[test]
    fn hidden_overlay_rejects_and_clears() {
        let now = Instant::now();
        let mut o = overlay(now);
        o.launch("a", now).unwrap();
        o.launch("b", now).unwrap();
        o.drain_events();

        assert!(!o.toggle_visible());
        assert_eq!(o.captions().count(), 0);
        assert_eq!(o.drain_events().as_slice(), &[DanmakuEvent::Cleared { count: 2 }]);
        assert_eq!(o.launch("c", now).unwrap_err(), Error::Hidden);

        assert!(o.toggle_visible());
        assert_eq!(o.scheduler().cursor(), 0);
        assert!(o.scheduler().permutation().is_bijection());
        o.launch("d", now).unwrap();
    }

    #[test]
    fn advance_ticks_once_per_interval() {
        let now = Instant::now();
        let mut o = overlay(now);
        for _ in 0..12 {
            o.launch("x", now).unwrap();
        }
        o.advance(now + Duration::from_millis(999));
        assert_eq!(o.scheduler().history().current(), 12);

        o.advance(now + Duration::from_millis(1000));
        assert_eq!(o.scheduler().history().counters(), [0, 12, 0, 4]);

        o.drain_events();
        o.launch("y", now + Duration::from_millis(1000)).unwrap();
        assert_eq!(o.mode(), Mode::HighFrequency);
        assert!(o.drain_events().contains(&DanmakuEvent::ModeChanged(Mode::HighFrequency)));

        o.advance(now + Duration::from_millis(3500));
        assert_eq!(o.scheduler().history().counters(), [1, 0, 0, 4]);
    }

    #[test]
    fn long_gap_catches_up_at_once() {
        let now = Instant::now();
        let options = DanmakuOptions::new().tick_interval(Duration::from_nanos(1));
        let mut o =
            DanmakuOverlay::new(options, (1280, 720), LaneScheduler::seeded(23), now).unwrap();
        for _ in 0..12 {
            o.launch("x", now).unwrap();
        }

        let later = now + Duration::from_secs(3600);
        o.advance(later);
        assert_eq!(o.scheduler().history().counters(), [0; 4]);
        assert_eq!(o.last_tick, later);

        for _ in 0..12 {
            o.launch("y", later).unwrap();
        }
        o.advance(later + Duration::from_nanos(1));
        assert_eq!(o.scheduler().history().counters(), [0, 12, 0, 4]);
    }

    #[test]
    fn partial_interval_carries_over() {
        let now = Instant::now();
        let mut o = overlay(now);
        o.advance(now + Duration::from_millis(2300));
        assert_eq!(o.last_tick, now + Duration::from_millis(2000));
    }

    #[test]
    fn undrained_events_are_bounded() {
        let now = Instant::now();
        let mut o = overlay(now);
        for _ in 0..3 * MAX_PENDING_EVENTS {
            o.launch("spam", now).unwrap();
        }
        assert!(o.dropped_events() > 0);

        let events = o.drain_events();
        assert!(events.len() <= MAX_PENDING_EVENTS);
        let last = CaptionId(3 * MAX_PENDING_EVENTS as u64 - 1);
        assert!(matches!(events.last(), Some(DanmakuEvent::Launched { id, .. }) if *id == last));
        assert_eq!(o.dropped_events(), 0);
    }

    #[test]
    fn finished_captions_expire() {
        let now = Instant::now();
        let mut o = overlay(now);
        o.set_surface_size(100, 240).unwrap();
        o.launch("short", now).unwrap();
        o.drain_events();

        o.advance(now + Duration::from_millis(999));
        assert_eq!(o.captions().count(), 1);
        o.advance(now + Duration::from_millis(1000));
        assert_eq!(o.captions().count(), 0);
        assert_eq!(o.drain_events().as_slice(), &[DanmakuEvent::Expired(CaptionId(0))]);
    }

    #[test]
    fn normal_load_stays_in_lower_lanes() {
        let now = Instant::now();
        let mut o = overlay(now);
        for i in 0..NORMAL_LANES * 3 {
            let lane = o.launch("z", now).unwrap().lane();
            assert!(lane < NORMAL_LANES, "launch {i} got lane {lane}");
            o.advance(now + Duration::from_secs(i as u64 + 1));
        }
        assert_eq!(o.mode(), Mode::Normal);
    }

    #[test]
    fn shared_handle_serializes_access() {
        let now = Instant::now();
        let shared = SharedOverlay::new(overlay(now));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..6 {
                        shared.launch("t", now).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.with(|o| o.scheduler().history().current()), 24);
        assert_eq!(shared.positions(now).len(), 24);
        assert_eq!(shared.drain_events().len(), 24);
    }
}
