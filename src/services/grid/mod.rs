// Line-based grid detection: reconstructs panels purely from gutter lines.
// Preferred when panel content makes contour detection unreliable (heavy
// bleed, pages without internal borders).

pub mod lines;

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tracing::{debug, trace};

use crate::core::config::GridParams;
use crate::core::errors::{StrategyError, StrategyResult};
use crate::core::types::{CandidateRect, LineSegment, Orientation};
use crate::services::segmentation::DetectionStrategy;
use lines::{merge_collinear, merge_parallel_segments, merge_positions, snap_vertical_extents};

pub struct GridDetector {
    params: GridParams,
}

impl GridDetector {
    pub fn new(params: GridParams) -> Self {
        Self { params }
    }

    /// Recover axis-aligned gutter segments from the edge map.
    ///
    /// Hough voting finds the candidate lines; each near-axis line is then
    /// walked through the edge map in a narrow band, extracting runs whose
    /// gaps stay within `max_gap` and whose length clears `min_length`.
    fn collect_segments(
        &self,
        edges: &GrayImage,
        vote_threshold: u32,
        min_length: u32,
        max_gap: u32,
    ) -> (Vec<LineSegment>, Vec<LineSegment>) {
        let (width, height) = edges.dimensions();
        let polar_lines = detect_lines(
            edges,
            LineDetectionOptions {
                vote_threshold,
                suppression_radius: self.params.suppression_radius,
            },
        );
        debug!(
            line_count = polar_lines.len(),
            vote_threshold, "hough lines detected"
        );

        let band = self.params.collinear_tolerance;
        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();
        for line in &polar_lines {
            match classify(line, self.params.angle_tolerance_deg) {
                Some(Orientation::Horizontal) => {
                    if let Some(y) = horizontal_position(line, width, height) {
                        horizontal.extend(trace_runs(
                            edges,
                            Orientation::Horizontal,
                            y,
                            band,
                            max_gap,
                            min_length,
                        ));
                    }
                }
                Some(Orientation::Vertical) => {
                    if let Some(x) = vertical_position(line, width, height) {
                        vertical.extend(trace_runs(
                            edges,
                            Orientation::Vertical,
                            x,
                            band,
                            max_gap,
                            min_length,
                        ));
                    }
                }
                None => {}
            }
        }
        (horizontal, vertical)
    }

    fn keep_cell(&self, cell: &CandidateRect, crop_area: f64) -> bool {
        let p = &self.params;
        if cell.width <= p.min_cell_dimension || cell.height <= p.min_cell_dimension {
            return false;
        }
        if (cell.area() as f64) < p.min_cell_area_fraction * crop_area {
            return false;
        }
        let aspect = cell.aspect_ratio();
        aspect > p.min_cell_aspect && aspect < p.max_cell_aspect
    }
}

impl DetectionStrategy for GridDetector {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn min_panels(&self) -> usize {
        2
    }

    fn detect(&self, gray: &GrayImage) -> StrategyResult<Vec<CandidateRect>> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return Err(StrategyError::DegenerateRegion { width, height });
        }

        let p = &self.params;
        // Detection parameters scale with crop size.
        let min_dim = width.min(height);
        let vote_threshold = p.vote_floor.max(min_dim / p.vote_divisor);
        let min_line_length = p.line_length_floor.max(min_dim / p.line_length_divisor);
        let max_line_gap = p.line_gap_floor.max(min_dim / p.line_gap_divisor);

        let blurred = gaussian_blur_f32(gray, p.blur_sigma);
        let edges = canny(&blurred, p.canny_low, p.canny_high);

        let (horizontal, vertical) =
            self.collect_segments(&edges, vote_threshold, min_line_length, max_line_gap);

        let horizontal = merge_collinear(horizontal, p.collinear_tolerance);
        let vertical = merge_collinear(vertical, p.collinear_tolerance);

        // A cut must span a meaningful share of its dimension; stray artwork
        // strokes rarely do.
        let min_h_len = (p.min_line_fraction * width as f64) as u32;
        let min_v_len = (p.min_line_fraction * height as f64) as u32;

        // Cuts hugging the page border describe the page frame, not gutters.
        let x_border = (p.border_fraction_x * width as f64) as u32;
        let y_border = (p.border_fraction_y * height as f64) as u32;

        let h_positions: Vec<u32> = horizontal
            .iter()
            .filter(|segment| segment.length() >= min_h_len)
            .map(|segment| segment.position())
            .filter(|&y| y > y_border && y < height - y_border)
            .collect();
        let mut vertical: Vec<LineSegment> = vertical
            .into_iter()
            .filter(|segment| segment.length() >= min_v_len)
            .filter(|segment| {
                let x = segment.position();
                x > x_border && x < width - x_border
            })
            .collect();

        let merge_dst = ((p.parallel_merge_fraction * (width + height) as f64 / 2.0) as u32)
            .min(p.parallel_merge_cap);
        let h_cuts = merge_positions(h_positions, merge_dst);
        merge_parallel_segments(&mut vertical, merge_dst);

        if h_cuts.is_empty() && vertical.is_empty() {
            debug!("no cut positions survived; grid inconclusive");
            return Ok(Vec::new());
        }

        let mut row_cuts = Vec::with_capacity(h_cuts.len() + 2);
        row_cuts.push(0);
        row_cuts.extend(&h_cuts);
        row_cuts.push(height);
        row_cuts.dedup();

        snap_vertical_extents(&mut vertical, &row_cuts);

        // Surviving cuts plus the crop boundaries define the grid; a row
        // band is split only by vertical cuts spanning the whole band.
        let crop_area = width as f64 * height as f64;
        let mut cells = Vec::new();
        for band in row_cuts.windows(2) {
            let (y1, y2) = (band[0], band[1]);

            let mut col_cuts = vec![0];
            for segment in &vertical {
                let (sy1, sy2) = segment.span();
                if sy1 <= y1 && sy2 >= y2 {
                    col_cuts.push(segment.position());
                }
            }
            col_cuts.push(width);
            col_cuts.sort_unstable();
            col_cuts.dedup();

            for cols in col_cuts.windows(2) {
                let cell = CandidateRect::new(cols[0], y1, cols[1] - cols[0], y2 - y1);
                if self.keep_cell(&cell, crop_area) {
                    cells.push(cell);
                } else {
                    trace!(?cell, "grid cell rejected");
                }
            }
        }

        debug!(
            h_cuts = h_cuts.len(),
            v_cuts = vertical.len(),
            cells = cells.len(),
            "grid reconstructed"
        );
        Ok(cells)
    }
}

/// `detect_lines` returns polar lines `x·cos(θ) + y·sin(θ) = r` with θ in
/// [0, 180): θ near 0 or 180 is a vertical line, θ near 90 a horizontal one.
fn classify(line: &PolarLine, tolerance_deg: u32) -> Option<Orientation> {
    let angle = line.angle_in_degrees;
    if angle <= tolerance_deg || angle + tolerance_deg >= 180 {
        Some(Orientation::Vertical)
    } else if angle.abs_diff(90) <= tolerance_deg {
        Some(Orientation::Horizontal)
    } else {
        None
    }
}

/// x coordinate of a near-vertical polar line, evaluated at mid-height.
fn vertical_position(line: &PolarLine, width: u32, height: u32) -> Option<u32> {
    let theta = (line.angle_in_degrees as f64).to_radians();
    if theta.cos().abs() < 1e-6 {
        return None;
    }
    let x = ((line.r as f64 - (height as f64 / 2.0) * theta.sin()) / theta.cos()).round();
    if x < 0.0 || x >= width as f64 {
        return None;
    }
    Some(x as u32)
}

/// y coordinate of a near-horizontal polar line, evaluated at mid-width.
fn horizontal_position(line: &PolarLine, width: u32, height: u32) -> Option<u32> {
    let theta = (line.angle_in_degrees as f64).to_radians();
    if theta.sin().abs() < 1e-6 {
        return None;
    }
    let y = ((line.r as f64 - (width as f64 / 2.0) * theta.cos()) / theta.sin()).round();
    if y < 0.0 || y >= height as f64 {
        return None;
    }
    Some(y as u32)
}

/// Walk the edge map along one axis position within a narrow tolerance
/// band, extracting runs of edge evidence separated by at most `max_gap`.
fn trace_runs(
    edges: &GrayImage,
    orientation: Orientation,
    position: u32,
    band: u32,
    max_gap: u32,
    min_length: u32,
) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    let (extent, lanes) = match orientation {
        Orientation::Horizontal => (width, height),
        Orientation::Vertical => (height, width),
    };
    if position >= lanes {
        return Vec::new();
    }
    let lo = position.saturating_sub(band);
    let hi = (position + band).min(lanes - 1);

    let mut segments = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut last_hit = 0u32;
    for i in 0..extent {
        let hit = (lo..=hi).any(|lane| {
            let (x, y) = match orientation {
                Orientation::Horizontal => (i, lane),
                Orientation::Vertical => (lane, i),
            };
            edges.get_pixel(x, y).0[0] > 0
        });
        if !hit {
            continue;
        }
        if let Some(start) = run_start {
            if i - last_hit > max_gap {
                push_run(&mut segments, orientation, position, start, last_hit, min_length);
                run_start = Some(i);
            }
        } else {
            run_start = Some(i);
        }
        last_hit = i;
    }
    if let Some(start) = run_start {
        push_run(&mut segments, orientation, position, start, last_hit, min_length);
    }
    segments
}

fn push_run(
    segments: &mut Vec<LineSegment>,
    orientation: Orientation,
    position: u32,
    start: u32,
    end: u32,
    min_length: u32,
) {
    if end - start + 1 < min_length {
        return;
    }
    let segment = match orientation {
        Orientation::Horizontal => LineSegment::horizontal(position, start, end),
        Orientation::Vertical => LineSegment::vertical(position, start, end),
    };
    segments.push(segment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SegmenterConfig;
    use image::Luma;

    fn detector() -> GridDetector {
        GridDetector::new(SegmenterConfig::default().grid)
    }

    fn white_page(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    fn draw_horizontal_gutter(img: &mut GrayImage, y: u32, x_start: u32, x_end: u32) {
        for dy in y..(y + 3).min(img.height()) {
            for x in x_start..x_end.min(img.width()) {
                img.put_pixel(x, dy, Luma([0]));
            }
        }
    }

    fn draw_vertical_gutter(img: &mut GrayImage, x: u32, y_start: u32, y_end: u32) {
        for dx in x..(x + 3).min(img.width()) {
            for y in y_start..y_end.min(img.height()) {
                img.put_pixel(dx, y, Luma([0]));
            }
        }
    }

    #[test]
    fn test_blank_page_is_inconclusive() {
        let cells = detector().detect(&white_page(800, 600)).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_cross_gutters_yield_four_cells() {
        let mut page = white_page(800, 600);
        draw_horizontal_gutter(&mut page, 300, 0, 800);
        draw_vertical_gutter(&mut page, 400, 0, 600);

        let cells = detector().detect(&page).unwrap();
        assert_eq!(cells.len(), 4);

        for cell in &cells {
            assert!(cell.width.abs_diff(400) <= 10, "unexpected cell {cell:?}");
            assert!(cell.height.abs_diff(300) <= 10, "unexpected cell {cell:?}");
        }
    }

    #[test]
    fn test_horizontal_gutter_splits_into_rows() {
        let mut page = white_page(800, 600);
        draw_horizontal_gutter(&mut page, 200, 0, 800);
        draw_horizontal_gutter(&mut page, 400, 0, 800);

        let cells = detector().detect(&page).unwrap();
        assert_eq!(cells.len(), 3);

        let mut ys: Vec<u32> = cells.iter().map(|c| c.y).collect();
        ys.sort_unstable();
        assert_eq!(ys[0], 0);
        assert!(ys[1].abs_diff(200) <= 10);
        assert!(ys[2].abs_diff(400) <= 10);
    }

    #[test]
    fn test_partial_vertical_gutter_splits_only_its_band() {
        let mut page = white_page(800, 600);
        draw_horizontal_gutter(&mut page, 300, 0, 800);
        // Splits the bottom band only.
        draw_vertical_gutter(&mut page, 400, 310, 600);

        let cells = detector().detect(&page).unwrap();
        assert_eq!(cells.len(), 3);

        let top_row: Vec<_> = cells.iter().filter(|c| c.y < 100).collect();
        assert_eq!(top_row.len(), 1);
        assert!(top_row[0].width.abs_diff(800) <= 10);
    }

    #[test]
    fn test_border_hugging_cuts_discarded() {
        let mut page = white_page(800, 600);
        // Within 10% of the left edge and 9% of the top edge.
        draw_vertical_gutter(&mut page, 40, 0, 600);
        draw_horizontal_gutter(&mut page, 30, 0, 800);

        let cells = detector().detect(&page).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_short_segment_discarded() {
        let mut page = white_page(800, 600);
        // 150 px is under 30% of the 600 px height.
        draw_vertical_gutter(&mut page, 400, 200, 350);

        let cells = detector().detect(&page).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_classify_polar_lines() {
        let vertical = PolarLine {
            r: 400.0,
            angle_in_degrees: 2,
        };
        let horizontal = PolarLine {
            r: 300.0,
            angle_in_degrees: 88,
        };
        let diagonal = PolarLine {
            r: 100.0,
            angle_in_degrees: 45,
        };
        assert_eq!(classify(&vertical, 5), Some(Orientation::Vertical));
        assert_eq!(classify(&horizontal, 5), Some(Orientation::Horizontal));
        assert_eq!(classify(&diagonal, 5), None);

        let wrapped = PolarLine {
            r: -400.0,
            angle_in_degrees: 178,
        };
        assert_eq!(classify(&wrapped, 5), Some(Orientation::Vertical));
    }

    #[test]
    fn test_degenerate_region_is_a_strategy_error() {
        assert!(matches!(
            detector().detect(&white_page(2, 2)),
            Err(StrategyError::DegenerateRegion { .. })
        ));
    }
}
