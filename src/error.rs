/// Errors returned by the caption overlay.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The overlay surface has a zero dimension.
    #[error("invalid surface size {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },
    /// An option is outside its accepted range.
    #[error("invalid option: {0}")]
    InvalidOptions(&'static str),
    /// Caption text is empty after trimming.
    #[error("caption text is empty")]
    EmptyCaption,
    /// A caption was launched while the overlay is disabled.
    #[error("caption overlay is hidden")]
    Hidden,
}
