// Types flowing through the panel segmentation pipeline

use serde::{Deserialize, Serialize};

/// Content region detected by the border cropper, in page coordinates.
///
/// Always fully contained in the page; detectors work in coordinates local
/// to this region and the materializer adds the offset back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn full_page(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Candidate panel rectangle in crop-local coordinates.
///
/// Transient: produced and consumed within one detection strategy, then
/// mapped to absolute coordinates by the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CandidateRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height. Degenerate heights yield 0 so the aspect filter
    /// rejects them.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Axis class of a detected gutter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight line segment recovered from the edge map, tagged by axis.
///
/// Intermediate artifact of the grid detector only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub orientation: Orientation,
}

impl LineSegment {
    pub fn horizontal(y: u32, x_start: u32, x_end: u32) -> Self {
        Self {
            x1: x_start.min(x_end),
            y1: y,
            x2: x_start.max(x_end),
            y2: y,
            orientation: Orientation::Horizontal,
        }
    }

    pub fn vertical(x: u32, y_start: u32, y_end: u32) -> Self {
        Self {
            x1: x,
            y1: y_start.min(y_end),
            x2: x,
            y2: y_start.max(y_end),
            orientation: Orientation::Vertical,
        }
    }

    pub fn length(&self) -> u32 {
        (self.x2 - self.x1).max(self.y2 - self.y1)
    }

    /// Coordinate perpendicular to the segment axis (the cut position).
    pub fn position(&self) -> u32 {
        match self.orientation {
            Orientation::Horizontal => self.y1,
            Orientation::Vertical => self.x1,
        }
    }

    /// Extent along the segment axis.
    pub fn span(&self) -> (u32, u32) {
        match self.orientation {
            Orientation::Horizontal => (self.x1, self.x2),
            Orientation::Vertical => (self.y1, self.y2),
        }
    }
}

/// Panel bounding box in absolute page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Area of the intersection with `other`, 0 when disjoint.
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return 0;
        }
        (x2 - x1) as u64 * (y2 - y1) as u64
    }
}

/// One extracted panel: an independent JPEG copy of the original artwork
/// plus its absolute bounding box and reading-order position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentedPanel {
    pub id: String,
    pub bounding_box: BoundingBox,
    /// JPEG bytes in memory, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub pixel_data: Vec<u8>,
    pub reading_order_index: usize,
}

impl SegmentedPanel {
    /// Render the panel payload as a `data:` URL for downstream consumers.
    pub fn data_url(&self) -> String {
        crate::utils::image_ops::jpeg_data_url(&self.pixel_data)
    }
}

/// Dimensions of the original (uncropped) page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Final result of one segmentation request.
///
/// `reading_order` is a 1-based permutation parallel to `panels`. Created
/// fresh per request and never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSegmentationResult {
    pub panels: Vec<SegmentedPanel>,
    pub total_panels: usize,
    pub original_image: ImageDimensions,
    pub reading_order: Vec<usize>,
}

impl PanelSegmentationResult {
    /// Empty result for a page where every strategy came up dry.
    ///
    /// This is a valid outcome, not an error; callers typically fall back
    /// to treating the whole page as a single panel.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            panels: Vec::new(),
            total_panels: 0,
            original_image: ImageDimensions { width, height },
            reading_order: Vec::new(),
        }
    }
}

/// Serde adapter: `Vec<u8>` <-> base64 string (standard alphabet).
mod base64_bytes {
    use base64::{engine::general_purpose, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_rect_derived_values() {
        let rect = CandidateRect::new(10, 20, 200, 100);
        assert_eq!(rect.area(), 20_000);
        assert!((rect.aspect_ratio() - 2.0).abs() < f32::EPSILON);
        assert_eq!(rect.right(), 210);
        assert_eq!(rect.bottom(), 120);
    }

    #[test]
    fn test_line_segment_accessors() {
        let h = LineSegment::horizontal(300, 700, 50);
        assert_eq!(h.position(), 300);
        assert_eq!(h.span(), (50, 700));
        assert_eq!(h.length(), 650);

        let v = LineSegment::vertical(400, 0, 600);
        assert_eq!(v.position(), 400);
        assert_eq!(v.span(), (0, 600));
        assert_eq!(v.length(), 600);
    }

    #[test]
    fn test_bounding_box_intersection() {
        let a = BoundingBox {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        let b = BoundingBox {
            x: 50,
            y: 50,
            width: 100,
            height: 100,
        };
        let c = BoundingBox {
            x: 200,
            y: 200,
            width: 10,
            height: 10,
        };
        assert_eq!(a.intersection_area(&b), 2_500);
        assert_eq!(b.intersection_area(&a), 2_500);
        assert_eq!(a.intersection_area(&c), 0);
    }

    #[test]
    fn test_result_wire_shape() {
        let result = PanelSegmentationResult {
            panels: vec![SegmentedPanel {
                id: "panel_0".to_string(),
                bounding_box: BoundingBox {
                    x: 1,
                    y: 2,
                    width: 3,
                    height: 4,
                },
                pixel_data: vec![0xFF, 0xD8, 0xFF],
                reading_order_index: 0,
            }],
            total_panels: 1,
            original_image: ImageDimensions {
                width: 800,
                height: 600,
            },
            reading_order: vec![1],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalPanels"], 1);
        assert_eq!(json["originalImage"]["width"], 800);
        assert_eq!(json["readingOrder"][0], 1);
        assert_eq!(json["panels"][0]["boundingBox"]["height"], 4);
        assert!(json["panels"][0]["pixelData"].is_string());

        let back: PanelSegmentationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.panels[0].pixel_data, vec![0xFF, 0xD8, 0xFF]);
    }
}
