// Panel materialization: maps crop-local candidates to absolute page
// coordinates and extracts full-fidelity sub-images from the original
// raster, never from the edge-processed intermediates.

use image::DynamicImage;

use crate::core::errors::{SegmentationError, SegmentationResult};
use crate::core::types::{BoundingBox, CandidateRect, CropRegion, SegmentedPanel};
use crate::utils::image_ops::crop_and_encode_jpeg;

/// Turn candidate rectangles into panels with absolute bounding boxes and
/// independent JPEG payloads cropped from the original page.
///
/// Boxes are clamped to the page bounds; ids and indices are provisional
/// until the reading-order pass reassigns them.
pub fn materialize_panels(
    page: &DynamicImage,
    region: &CropRegion,
    candidates: &[CandidateRect],
    jpeg_quality: u8,
) -> SegmentationResult<Vec<SegmentedPanel>> {
    let (page_width, page_height) = (page.width(), page.height());

    let mut panels = Vec::with_capacity(candidates.len());
    for rect in candidates {
        let x = rect.x + region.x;
        let y = rect.y + region.y;
        if x >= page_width || y >= page_height {
            continue;
        }
        let width = rect.width.min(page_width - x);
        let height = rect.height.min(page_height - y);
        if width == 0 || height == 0 {
            continue;
        }

        let pixel_data = crop_and_encode_jpeg(page, x, y, width, height, jpeg_quality)
            .map_err(SegmentationError::PanelEncode)?;

        let index = panels.len();
        panels.push(SegmentedPanel {
            id: format!("panel_{index}"),
            bounding_box: BoundingBox {
                x,
                y,
                width,
                height,
            },
            pixel_data,
            reading_order_index: index,
        });
    }
    Ok(panels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([180, 180, 180])))
    }

    #[test]
    fn test_offsets_applied_and_payload_encoded() {
        let page = page(800, 600);
        let region = CropRegion {
            x: 100,
            y: 50,
            width: 600,
            height: 500,
        };
        let candidates = [CandidateRect::new(10, 20, 200, 150)];

        let panels = materialize_panels(&page, &region, &candidates, 90).unwrap();
        assert_eq!(panels.len(), 1);
        assert_eq!(
            panels[0].bounding_box,
            BoundingBox {
                x: 110,
                y: 70,
                width: 200,
                height: 150
            }
        );

        let decoded = image::load_from_memory(&panels[0].pixel_data).unwrap();
        assert_eq!(decoded.width(), 200);
        assert_eq!(decoded.height(), 150);
    }

    #[test]
    fn test_boxes_clamped_to_page_bounds() {
        let page = page(400, 300);
        let region = CropRegion {
            x: 350,
            y: 250,
            width: 50,
            height: 50,
        };
        let candidates = [CandidateRect::new(0, 0, 200, 200)];

        let panels = materialize_panels(&page, &region, &candidates, 90).unwrap();
        assert_eq!(panels[0].bounding_box.width, 50);
        assert_eq!(panels[0].bounding_box.height, 50);
    }

    #[test]
    fn test_out_of_page_candidates_skipped() {
        let page = page(400, 300);
        let region = CropRegion::full_page(400, 300);
        let candidates = [
            CandidateRect::new(500, 0, 50, 50),
            CandidateRect::new(0, 0, 100, 100),
        ];

        let panels = materialize_panels(&page, &region, &candidates, 90).unwrap();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].id, "panel_0");
    }
}
