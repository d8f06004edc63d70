// Library exports for the manga panel segmentation engine

// Core modules
pub mod core;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::SegmenterConfig,
    errors::{ConfigError, SegmentationError, StrategyError},
    types::{
        BoundingBox, CandidateRect, CropRegion, ImageDimensions, PanelSegmentationResult,
        SegmentedPanel,
    },
};

pub use services::{BorderCropper, ContourDetector, DetectionStrategy, GridDetector, PanelSegmenter};

pub use utils::{Metrics, MetricsSnapshot};
