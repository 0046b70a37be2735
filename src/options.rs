use crate::Error;
use std::time::Duration;

/// Caption text color as `0xRRGGBB`.
pub type Rgb = u32;

/// Appearance and timing of the caption overlay.
///
/// Fields can be read directly. The overlay [`validate`](Self::validate)s
/// them when it is created.
#[derive(Debug, Clone, PartialEq)]
pub struct DanmakuOptions {
    pub tick_interval: Duration,
    pub ms_per_pixel: u32,
    pub exit_x: f32,
    pub font_size: f32,
    pub color: Rgb,
    pub shadow_color: Rgb,
    pub shadow_blur: f32,
    pub shadow_offset: (f32, f32),
    pub max_text_len: usize,
}

impl Default for DanmakuOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            ms_per_pixel: 10,
            exit_x: -500.0,
            font_size: 18.0,
            color: 0xFFFFFF,
            shadow_color: 0x000000,
            shadow_blur: 4.0,
            shadow_offset: (1.0, 1.0),
            max_text_len: 200,
        }
    }
}

impl DanmakuOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of one load window; the overlay ticks its scheduler this often.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Scroll time per pixel of surface width, in milliseconds.
    pub fn ms_per_pixel(mut self, ms: u32) -> Self {
        self.ms_per_pixel = ms;
        self
    }

    /// Horizontal position at which a caption is finished.
    pub fn exit_x(mut self, x: f32) -> Self {
        self.exit_x = x;
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Drop shadow drawn behind caption text.
    pub fn shadow(mut self, color: Rgb, blur: f32, offset: (f32, f32)) -> Self {
        self.shadow_color = color;
        self.shadow_blur = blur;
        self.shadow_offset = offset;
        self
    }

    /// Longest caption kept, in characters. Longer text is cut.
    pub fn max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }

    /// Check that the options describe a usable overlay.
    pub fn validate(&self) -> Result<(), Error> {
        if self.tick_interval.is_zero() {
            return Err(Error::InvalidOptions("tick interval must be non-zero"));
        }
        if self.ms_per_pixel == 0 {
            return Err(Error::InvalidOptions("scroll speed must be non-zero"));
        }
        if self.max_text_len == 0 {
            return Err(Error::InvalidOptions("max text length must be non-zero"));
        }
        if !self.exit_x.is_finite() || !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(Error::InvalidOptions("geometry must be finite and positive"));
        }
        Ok(())
    }

    /// Time a caption takes to cross a surface `width` pixels wide.
    pub fn scroll_duration(&self, width: u32) -> Duration {
        Duration::from_millis(u64::from(width) * u64::from(self.ms_per_pixel))
    }

    /// Trim `text` and cut it to the configured length.
    pub(crate) fn prepare_text(&self, text: &str) -> Result<String, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyCaption);
        }
        Ok(match text.char_indices().nth(self.max_text_len) {
            Some((end, _)) => text[..end].to_string(),
            None => text.to_string(),
        })
    }
}
