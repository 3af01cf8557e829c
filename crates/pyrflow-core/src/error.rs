use thiserror::Error;

/// Failures surfaced by the public entry points.
///
/// Numeric trouble inside a single track (ill-conditioned window, warp
/// leaving the frame) is not an error; it is reported per point as
/// [`crate::track::TrackStatus::Lost`].
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("pyramid base dimensions differ: {prev:?} vs {curr:?}")]
    PyramidMismatch { prev: (u32, u32), curr: (u32, u32) },
    #[error("seed and guess slices differ in length: {seeds} seeds, {guesses} guesses")]
    SeedGuessMismatch { seeds: usize, guesses: usize },
}

pub type Result<T> = std::result::Result<T, FlowError>;
