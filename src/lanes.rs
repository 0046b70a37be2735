use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Total number of addressable caption lanes across the surface height.
pub const LANE_COUNT: usize = 24;

/// Lanes in use while the overlay is in [`Mode::Normal`].
pub const NORMAL_LANES: usize = LANE_COUNT / 2;

/// Rolling average at or above which the scheduler opens every lane.
pub const HIGH_FREQUENCY_THRESHOLD: u32 = 4;

/// Lane allocation mode, derived from recent submission load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Only the first half of the lane order is handed out.
    #[default]
    Normal,
    /// Every lane is handed out.
    HighFrequency,
}

impl Mode {
    /// Number of lanes available in this mode.
    pub const fn active_lanes(self) -> usize {
        match self {
            Mode::Normal => NORMAL_LANES,
            Mode::HighFrequency => LANE_COUNT,
        }
    }

    fn from_average(average: u32) -> Self {
        if average >= HIGH_FREQUENCY_THRESHOLD {
            Mode::HighFrequency
        } else {
            Mode::Normal
        }
    }
}

/// Order in which physical lanes are handed out.
///
/// Always a permutation of `0..LANE_COUNT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanePermutation([usize; LANE_COUNT]);

impl LanePermutation {
    /// The identity order `0, 1, ..., 23`.
    pub fn identity() -> Self {
        Self(std::array::from_fn(|i| i))
    }

    /// Lane stored at `slot`, if `slot` is in range.
    pub fn get(&self, slot: usize) -> Option<usize> {
        self.0.get(slot).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Check that every lane appears exactly once.
    pub fn is_bijection(&self) -> bool {
        let mut seen = [false; LANE_COUNT];
        for &lane in &self.0 {
            match seen.get_mut(lane) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

impl Default for LanePermutation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Submission counts over the last three windows plus their rolling average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrequencyHistory([u32; 4]);

impl FrequencyHistory {
    const CURRENT: usize = 2;
    const AVERAGE: usize = 3;

    /// Submissions counted in the window still being accumulated.
    pub fn current(&self) -> u32 {
        self.0[Self::CURRENT]
    }

    /// Rolling average computed at the last tick.
    pub fn average(&self) -> u32 {
        self.0[Self::AVERAGE]
    }

    /// Raw counters: two closed windows, the current window, the average.
    pub fn counters(&self) -> [u32; 4] {
        self.0
    }

    fn record(&mut self) {
        self.0[Self::CURRENT] = self.0[Self::CURRENT].saturating_add(1);
    }

    fn roll(&mut self) {
        let [oldest, previous, current, _] = self.0;
        let sum = u64::from(oldest) + u64::from(previous) + u64::from(current);
        self.0 = [previous, current, 0, (sum / 3) as u32];
    }
}

/// Shuffle `len` lanes ending at `base` (inclusive), walking downward.
///
/// `len` is clamped to `base + 1` so the walk never passes the start of the
/// slice. A `base` past the end of the slice leaves it untouched.
pub fn partial_shuffle<R: Rng + ?Sized>(
    lanes: &mut [usize],
    base: usize,
    len: usize,
    rng: &mut R,
) {
    if base >= lanes.len() {
        log::warn!("shuffle base {base} outside {} lanes", lanes.len());
        return;
    }
    let len = len.min(base + 1);
    if len == 0 {
        return;
    }
    for i in 0..len {
        let offset = rng.gen_range(0..len);
        lanes.swap(base - i, base - offset);
    }
}

/// Assigns scrolling captions to lanes.
///
/// Captions are handed out round robin over a shuffled lane order. Under
/// sustained load ([`Mode::HighFrequency`]) the whole order is used, otherwise
/// only its first half. Call [`submit`](Self::submit) once per caption and
/// [`tick`](Self::tick) on a fixed cadence.
///
/// The scheduler does no locking; see [`SharedOverlay`](crate::SharedOverlay)
/// for a thread-safe host.
#[derive(Debug, Clone)]
pub struct LaneScheduler<R = StdRng> {
    permutation: LanePermutation,
    history: FrequencyHistory,
    mode: Mode,
    cursor: usize,
    rng: R,
}

impl LaneScheduler<StdRng> {
    /// Scheduler seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Scheduler with a reproducible lane order.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> LaneScheduler<R> {
    /// Create a scheduler and shuffle its lane order.
    pub fn new(rng: R) -> Self {
        let mut scheduler = Self {
            permutation: LanePermutation::identity(),
            history: FrequencyHistory::default(),
            mode: Mode::Normal,
            cursor: 0,
            rng,
        };
        scheduler.reset();
        scheduler
    }

    /// Reshuffle both halves of the lane order and clear all load state.
    pub fn reset(&mut self) {
        self.permutation = LanePermutation::identity();
        let lanes = &mut self.permutation.0;
        partial_shuffle(lanes, LANE_COUNT - 1, NORMAL_LANES, &mut self.rng);
        partial_shuffle(lanes, NORMAL_LANES - 1, NORMAL_LANES, &mut self.rng);
        self.history = FrequencyHistory::default();
        self.mode = Mode::Normal;
        self.cursor = 0;
    }

    /// Record one caption and return the lane it should scroll in.
    pub fn submit(&mut self) -> usize {
        self.history.record();

        let mode = Mode::from_average(self.history.average());
        if mode != self.mode {
            log::debug!(
                "lane mode {:?} -> {:?} (average {})",
                self.mode,
                mode,
                self.history.average()
            );
            self.mode = mode;
        }

        let active = self.mode.active_lanes();
        // A cursor left over from the wider mode is folded back into range.
        self.cursor %= active;
        let lane = self.permutation.0[self.cursor];
        self.cursor = (self.cursor + 1) % active;
        lane
    }

    /// Close the current load window and recompute the rolling average.
    ///
    /// The mode itself is only re-evaluated by the next [`submit`](Self::submit).
    pub fn tick(&mut self) {
        self.history.roll();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn permutation(&self) -> &LanePermutation {
        &self.permutation
    }

    pub fn history(&self) -> &FrequencyHistory {
        &self.history
    }
}
