// Contour-based panel detection: edge map -> morphology -> external
// contours -> geometric filtering. Runs as the primary cascade tier and,
// with looser parameters, as the final relaxed tier.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate, open};
use tracing::{debug, trace};

use crate::core::config::ContourParams;
use crate::core::errors::{StrategyError, StrategyResult};
use crate::core::types::CandidateRect;
use crate::services::segmentation::DetectionStrategy;
use crate::utils::geometry::{dedup_by_overlap, intersection_area};

/// Pre-blur applied before the adaptive-threshold sweep (a 5x5 window).
const ADAPTIVE_PRE_BLUR_SIGMA: f32 = 1.1;

pub struct ContourDetector {
    name: &'static str,
    min_panels: usize,
    params: ContourParams,
}

impl ContourDetector {
    /// Primary tier: accepted only when it yields 2+ panels.
    pub fn primary(params: ContourParams) -> Self {
        Self {
            name: "contour",
            min_panels: 2,
            params,
        }
    }

    /// Relaxed fallback tier: a single panel is an acceptable outcome.
    pub fn relaxed(params: ContourParams) -> Self {
        Self {
            name: "contour_relaxed",
            min_panels: 1,
            params,
        }
    }

    /// Edge pass: Canny with low thresholds to catch faint interior panel
    /// borders, then a small dilation and close to reconnect the borders
    /// without fusing unrelated interior artwork.
    fn edge_pass(&self, gray: &GrayImage) -> Vec<CandidateRect> {
        let source = if self.params.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.params.blur_sigma)
        } else {
            gray.clone()
        };

        let mut edges = canny(&source, self.params.canny_low, self.params.canny_high);
        if self.params.dilate_radius > 0 {
            edges = dilate(&edges, Norm::LInf, self.params.dilate_radius);
        }
        if self.params.close_radius > 0 {
            edges = close(&edges, Norm::LInf, self.params.close_radius);
        }

        self.collect_candidates(&edges)
    }

    /// Second pass for pages where edges alone found too little: adaptive
    /// thresholding over a small grid of block-size/constant pairs with
    /// lighter morphology, stopping early once enough candidates exist.
    fn adaptive_pass(&self, gray: &GrayImage, candidates: &mut Vec<CandidateRect>) {
        let blurred = gaussian_blur_f32(gray, ADAPTIVE_PRE_BLUR_SIGMA);
        let radius = self.params.adaptive.morph_radius;

        for &block_size in &self.params.adaptive.block_sizes {
            for &constant in &self.params.adaptive.constants {
                if candidates.len() >= self.params.adaptive.target_candidates {
                    return;
                }

                let mask = adaptive_threshold_inv(&blurred, block_size, constant);
                // close + open keeps small features that a heavy close
                // would erase.
                let mask = close(&mask, Norm::LInf, radius);
                let mask = open(&mask, Norm::LInf, radius);

                for candidate in self.collect_candidates(&mask) {
                    let own_area = candidate.area();
                    let duplicate = candidates.iter().any(|existing| {
                        intersection_area(existing, &candidate) as f64
                            > self.params.overlap_tolerance * own_area as f64
                    });
                    if !duplicate {
                        trace!(
                            block_size,
                            constant,
                            ?candidate,
                            "adaptive pass added candidate"
                        );
                        candidates.push(candidate);
                    }
                }
            }
        }
    }

    /// External-contour bounding boxes of a binary image, filtered.
    fn collect_candidates(&self, binary: &GrayImage) -> Vec<CandidateRect> {
        let (width, height) = binary.dimensions();
        let contours = find_contours::<i32>(binary);

        let mut kept = Vec::new();
        for contour in &contours {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let Some(rect) = contour_bounding_rect(contour) else {
                continue;
            };
            if self.keep(&rect, width, height) {
                kept.push(rect);
            }
        }
        kept
    }

    /// Geometric candidate filter with corner-priority retention.
    ///
    /// A candidate near an image edge, large enough, or inside one of the
    /// four corner zones stays even below the generic minimum area — small
    /// corner panels are the most commonly missed case otherwise.
    pub(crate) fn keep(&self, rect: &CandidateRect, width: u32, height: u32) -> bool {
        let p = &self.params;
        if rect.width <= p.min_dimension || rect.height <= p.min_dimension {
            return false;
        }

        let page_area = width as f64 * height as f64;
        let area = rect.area() as f64;
        if area >= p.max_area_fraction * page_area {
            return false;
        }

        let aspect = rect.aspect_ratio();
        if aspect <= p.min_aspect || aspect >= p.max_aspect {
            return false;
        }

        if area > p.min_area_fraction * page_area {
            return true;
        }

        self.near_edge(rect, width, height)
            || self.in_corner_zone(rect, width, height)
            || area > p.priority_area_fraction * page_area
    }

    fn near_edge(&self, rect: &CandidateRect, width: u32, height: u32) -> bool {
        let margin = self.params.edge_margin;
        rect.x < margin
            || rect.y < margin
            || rect.right() + margin > width
            || rect.bottom() + margin > height
    }

    fn in_corner_zone(&self, rect: &CandidateRect, width: u32, height: u32) -> bool {
        let zone_w = (self.params.corner_zone_fraction * width as f64) as u32;
        let zone_h = (self.params.corner_zone_fraction * height as f64) as u32;
        let cx = rect.x + rect.width / 2;
        let cy = rect.y + rect.height / 2;
        let in_x = cx < zone_w || cx >= width.saturating_sub(zone_w);
        let in_y = cy < zone_h || cy >= height.saturating_sub(zone_h);
        in_x && in_y
    }
}

impl DetectionStrategy for ContourDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_panels(&self) -> usize {
        self.min_panels
    }

    fn detect(&self, gray: &GrayImage) -> StrategyResult<Vec<CandidateRect>> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return Err(StrategyError::DegenerateRegion { width, height });
        }

        let mut candidates = self.edge_pass(gray);
        debug!(
            strategy = self.name,
            edge_candidates = candidates.len(),
            "edge pass complete"
        );

        if candidates.len() < self.params.adaptive_trigger {
            self.adaptive_pass(gray, &mut candidates);
            debug!(
                strategy = self.name,
                total_candidates = candidates.len(),
                "adaptive pass complete"
            );
        }

        Ok(dedup_by_overlap(candidates, self.params.overlap_tolerance))
    }
}

/// Gaussian-weighted adaptive threshold, binary-inverse: pixels darker
/// than their local mean minus `constant` become foreground. The Gaussian
/// sigma follows the usual window convention for the given block size.
fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, constant: i16) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(gray, sigma);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let mean = local_mean.get_pixel(x, y).0[0] as i16;
        let value = gray.get_pixel(x, y).0[0] as i16;
        if value < mean - constant {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Axis-aligned bounding rectangle of a contour's point set.
fn contour_bounding_rect(contour: &Contour<i32>) -> Option<CandidateRect> {
    let first = contour.points.first()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for point in &contour.points[1..] {
        min_x = min_x.min(point.x);
        max_x = max_x.max(point.x);
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }
    Some(CandidateRect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
