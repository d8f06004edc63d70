// Line merging: clusters near-collinear segments into single cut positions
// and collapses cut positions that sit closer than the gutter width.

use crate::core::types::{LineSegment, Orientation};

fn remake(orientation: Orientation, position: u32, start: u32, end: u32) -> LineSegment {
    match orientation {
        Orientation::Horizontal => LineSegment::horizontal(position, start, end),
        Orientation::Vertical => LineSegment::vertical(position, start, end),
    }
}

/// Merge segments whose perpendicular coordinate agrees within `tolerance`
/// into one representative segment spanning their combined extent.
///
/// All segments must share one orientation; the representative keeps the
/// cluster anchor's position.
pub fn merge_collinear(mut segments: Vec<LineSegment>, tolerance: u32) -> Vec<LineSegment> {
    segments.sort_by_key(|segment| (segment.position(), segment.span()));

    let mut merged: Vec<LineSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last) if segment.position() - last.position() <= tolerance => {
                let (a1, a2) = last.span();
                let (b1, b2) = segment.span();
                *last = remake(last.orientation, last.position(), a1.min(b1), a2.max(b2));
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Collapse positions that are mutually closer than `distance` onto the
/// first position of their cluster. Returns sorted, deduplicated positions.
pub fn merge_positions(mut positions: Vec<u32>, distance: u32) -> Vec<u32> {
    positions.sort_unstable();
    positions.dedup();

    let mut anchor: Option<u32> = None;
    for position in positions.iter_mut() {
        match anchor {
            Some(a) if *position - a <= distance => *position = a,
            _ => anchor = Some(*position),
        }
    }
    positions.dedup();
    positions
}

/// Position-clustering for whole segments: parallel segments closer than
/// `distance` move onto their cluster anchor's position, keeping their own
/// spans.
pub fn merge_parallel_segments(segments: &mut [LineSegment], distance: u32) {
    segments.sort_by_key(|segment| segment.position());

    let mut anchor: Option<u32> = None;
    for segment in segments.iter_mut() {
        let position = segment.position();
        match anchor {
            Some(a) if position - a <= distance => {
                let (start, end) = segment.span();
                *segment = remake(segment.orientation, a, start, end);
            }
            _ => anchor = Some(position),
        }
    }
}

/// Snap vertical segment extents outward to the enclosing row cuts, so a
/// gutter that stops just short of a horizontal cut still splits the whole
/// band between its neighboring cuts.
///
/// `row_cuts` must be sorted ascending and include the crop boundaries.
pub fn snap_vertical_extents(segments: &mut [LineSegment], row_cuts: &[u32]) {
    for segment in segments.iter_mut() {
        let (mut y1, mut y2) = segment.span();
        for pair in row_cuts.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if y1 >= lo && y1 < hi {
                y1 = lo;
            }
            if y2 > lo && y2 <= hi {
                y2 = hi;
            }
        }
        *segment = LineSegment::vertical(segment.position(), y1, y2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_collinear_combines_spans() {
        let segments = vec![
            LineSegment::horizontal(100, 0, 200),
            LineSegment::horizontal(102, 350, 600),
            LineSegment::horizontal(101, 150, 400),
        ];
        let merged = merge_collinear(segments, 3);
        assert_eq!(merged, vec![LineSegment::horizontal(100, 0, 600)]);
    }

    #[test]
    fn test_merge_collinear_respects_tolerance() {
        let segments = vec![
            LineSegment::vertical(100, 0, 300),
            LineSegment::vertical(110, 0, 300),
        ];
        let merged = merge_collinear(segments, 3);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_positions_collapses_cluster() {
        let positions = vec![305, 120, 300, 118, 302];
        assert_eq!(merge_positions(positions, 10), vec![118, 300]);
    }

    #[test]
    fn test_merge_positions_keeps_distant_values() {
        let positions = vec![50, 200, 400];
        assert_eq!(merge_positions(positions, 10), vec![50, 200, 400]);
    }

    #[test]
    fn test_merge_parallel_segments_moves_to_anchor() {
        let mut segments = vec![
            LineSegment::vertical(400, 0, 100),
            LineSegment::vertical(404, 200, 300),
            LineSegment::vertical(600, 0, 300),
        ];
        merge_parallel_segments(&mut segments, 10);
        assert_eq!(segments[0].position(), 400);
        assert_eq!(segments[1].position(), 400);
        assert_eq!(segments[1].span(), (200, 300));
        assert_eq!(segments[2].position(), 600);
    }

    #[test]
    fn test_snap_vertical_extents_to_band_edges() {
        let mut segments = vec![LineSegment::vertical(400, 12, 588)];
        snap_vertical_extents(&mut segments, &[0, 300, 600]);
        assert_eq!(segments[0].span(), (0, 600));

        // A segment confined to one band snaps to that band only.
        let mut segments = vec![LineSegment::vertical(400, 310, 580)];
        snap_vertical_extents(&mut segments, &[0, 300, 600]);
        assert_eq!(segments[0].span(), (300, 600));
    }
}
