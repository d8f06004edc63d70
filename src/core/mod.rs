pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::SegmenterConfig;
pub use errors::{ConfigError, SegmentationError, StrategyError};
pub use types::{
    BoundingBox, CandidateRect, CropRegion, ImageDimensions, LineSegment, Orientation,
    PanelSegmentationResult, SegmentedPanel,
};
