// Black-border removal: establishes the content sub-region the detection
// strategies operate on.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use tracing::{debug, instrument};

use crate::core::config::CropParams;
use crate::core::types::CropRegion;

/// Finds and removes uniform black padding around the page content.
///
/// Never fails: when no foreground contour exists (fully black or fully
/// white pages) the whole page is used as the content region.
pub struct BorderCropper {
    params: CropParams,
}

impl BorderCropper {
    pub fn new(params: CropParams) -> Self {
        Self { params }
    }

    /// Detect the content region and return it together with a cropped
    /// copy of the page.
    #[instrument(skip(self, page), fields(width = page.width(), height = page.height()))]
    pub fn crop(&self, page: &DynamicImage) -> (CropRegion, DynamicImage) {
        let (width, height) = (page.width(), page.height());
        let gray = page.to_luma8();

        // Foreground = anything brighter than the border threshold. Dark
        // gray artwork stays foreground; only near-black padding is cut.
        let threshold = self.params.black_threshold;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            if gray.get_pixel(x, y).0[0] > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let region = self
            .content_region(&mask, width, height)
            .unwrap_or_else(|| CropRegion::full_page(width, height));

        debug!(
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "content region selected"
        );

        let view = page.crop_imm(region.x, region.y, region.width, region.height);
        (region, view)
    }

    /// Largest external contour of the foreground mask, padded and clamped.
    fn content_region(&self, mask: &GrayImage, width: u32, height: u32) -> Option<CropRegion> {
        let contours = find_contours::<i32>(mask);

        let mut best: Option<(u64, (u32, u32, u32, u32))> = None;
        for contour in &contours {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let Some(bounds) = contour_bounds(contour) else {
                continue;
            };
            let area = bounds.2 as u64 * bounds.3 as u64;
            if best.map_or(true, |(best_area, _)| area > best_area) {
                best = Some((area, bounds));
            }
        }

        let (_, (bx, by, bw, bh)) = best?;
        let pad = self.params.padding;
        let x = bx.saturating_sub(pad);
        let y = by.saturating_sub(pad);
        let right = (bx + bw).saturating_add(pad).min(width);
        let bottom = (by + bh).saturating_add(pad).min(height);
        Some(CropRegion {
            x,
            y,
            width: right - x,
            height: bottom - y,
        })
    }
}

/// Axis-aligned bounds of a contour's point set as (x, y, width, height).
fn contour_bounds(contour: &Contour<i32>) -> Option<(u32, u32, u32, u32)> {
    let first = contour.points.first()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for point in &contour.points[1..] {
        min_x = min_x.min(point.x);
        max_x = max_x.max(point.x);
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }
    Some((
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SegmenterConfig;
    use image::{Rgb, RgbImage};

    fn cropper() -> BorderCropper {
        BorderCropper::new(SegmenterConfig::default().crop)
    }

    fn black_page_with_white_rect(
        width: u32,
        height: u32,
        rx: u32,
        ry: u32,
        rw: u32,
        rh: u32,
    ) -> DynamicImage {
        let mut img = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
        for y in ry..ry + rh {
            for x in rx..rx + rw {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_crop_removes_black_border() {
        let page = black_page_with_white_rect(200, 160, 40, 30, 80, 60);
        let (region, view) = cropper().crop(&page);

        // Content box padded by 5 on each side.
        assert_eq!(region, CropRegion { x: 35, y: 25, width: 90, height: 70 });
        assert_eq!(view.width(), 90);
        assert_eq!(view.height(), 70);
    }

    #[test]
    fn test_padding_clamps_at_page_edge() {
        let page = black_page_with_white_rect(100, 100, 0, 0, 100, 50);
        let (region, _) = cropper().crop(&page);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 100);
        assert_eq!(region.height, 55);
    }

    #[test]
    fn test_fully_black_page_falls_back_to_full_page() {
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([0, 0, 0])));
        let (region, _) = cropper().crop(&page);
        assert_eq!(region, CropRegion::full_page(120, 80));
    }

    #[test]
    fn test_fully_white_page_keeps_full_page() {
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([255, 255, 255])));
        let (region, _) = cropper().crop(&page);
        assert_eq!(region, CropRegion::full_page(120, 80));
    }
}
