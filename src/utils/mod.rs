pub mod geometry;
pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use geometry::{dedup_by_overlap, intersection_area};
pub use image_ops::{crop_and_encode_jpeg, jpeg_data_url};
pub use metrics::{Metrics, MetricsSnapshot};
