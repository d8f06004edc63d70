pub mod contour;
pub mod cropper;
pub mod grid;
pub mod segmentation;

// Re-export commonly used services
pub use contour::ContourDetector;
pub use cropper::BorderCropper;
pub use grid::GridDetector;
pub use segmentation::{DetectionStrategy, PanelSegmenter};
