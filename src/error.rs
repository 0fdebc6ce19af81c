use thiserror::Error;

/// Top-level error type for spline construction, editing and tessellation.
#[derive(Debug, Error)]
pub enum SplineError {
    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),
}

/// Errors raised while validating curve data.
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("key {key} at index {index} is not greater than previous key {previous}")]
    NonIncreasingKeys {
        index: usize,
        previous: f64,
        key: f64,
    },

    #[error("track lengths differ: position {position}, rotation {rotation}, scale {scale}")]
    TrackLengthMismatch {
        position: usize,
        rotation: usize,
        scale: usize,
    },

    #[error("tracks disagree on the key at index {index}")]
    TrackKeyMismatch { index: usize },

    #[error("non-finite value at index {index}")]
    NonFiniteValue { index: usize },
}

/// Errors raised by spline mutators and index-based queries.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("point index {index} is out of range (len = {len})")]
    PointIndexOutOfRange { index: usize, len: usize },

    #[error("segment index {index} is out of range (segments = {len})")]
    SegmentIndexOutOfRange { index: usize, len: usize },

    #[error("loop key {key} must be greater than the last key {last}")]
    InvalidLoopKey { key: f64, last: f64 },
}

/// Errors related to tessellation.
#[derive(Debug, Error)]
pub enum TessellationError {
    #[error("invalid tessellation parameters: {0}")]
    InvalidParameters(String),
}

/// Convenience type alias for results using [`SplineError`].
pub type Result<T> = std::result::Result<T, SplineError>;
