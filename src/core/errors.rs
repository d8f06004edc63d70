// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining

use thiserror::Error;

/// Fatal errors surfaced to the caller of the segmentation engine.
///
/// An exhausted cascade is NOT an error: it produces an empty
/// `PanelSegmentationResult` so the caller can fall back to treating the
/// whole page as a single panel.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("failed to decode page image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid page dimensions: {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("failed to encode panel sub-image: {0}")]
    PanelEncode(#[source] image::ImageError),

    #[error("segmentation task failed to join: {0}")]
    TaskJoin(String),
}

/// Failures internal to a single detection strategy.
///
/// The cascade driver catches these (and panics out of the image pipeline)
/// and treats the strategy as having produced zero candidates, advancing to
/// the next tier instead of aborting the call.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("working region degenerated to {width}x{height}")]
    DegenerateRegion { width: u32, height: u32 },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("area fraction must be in [0.0, 1.0], got {0}")]
    InvalidAreaFraction(f64),

    #[error("overlap tolerance must be in [0.0, 1.0], got {0}")]
    InvalidOverlapTolerance(f64),

    #[error("aspect ratio range is inverted: [{0}, {1}]")]
    InvalidAspectRange(f32, f32),

    #[error("canny thresholds must satisfy 0 < low < high, got {low}/{high}")]
    InvalidCannyThresholds { low: f32, high: f32 },

    #[error("row epsilon must be > 0")]
    InvalidRowEpsilon,

    #[error("jpeg quality must be in [1, 100], got {0}")]
    InvalidJpegQuality(u8),

    #[error("invalid grid config: {0}")]
    InvalidGridConfig(String),

    #[error("environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type SegmentationResult<T> = Result<T, SegmentationError>;
pub type StrategyResult<T> = Result<T, StrategyError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
