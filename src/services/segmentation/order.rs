// Reading-order assignment: manga reads right-to-left within a row,
// top-to-bottom across rows.

use crate::core::types::SegmentedPanel;

/// Sort materialized panels into reading order and reassign their ids and
/// indices.
///
/// Panels are clustered into rows first: after sorting by top edge, a panel
/// joins the current row while its y stays within `row_epsilon` of the row
/// anchor, otherwise it opens a new row. Rows are emitted top-to-bottom,
/// each row sorted by descending x (rightmost first). Clustering keeps the
/// ordering total; the raw "same row" relation is not transitive.
pub fn assign_reading_order(
    mut panels: Vec<SegmentedPanel>,
    row_epsilon: u32,
) -> Vec<SegmentedPanel> {
    panels.sort_by_key(|panel| (panel.bounding_box.y, panel.bounding_box.x));

    let mut rows: Vec<Vec<SegmentedPanel>> = Vec::new();
    let mut anchor_y = 0;
    for panel in panels {
        let y = panel.bounding_box.y;
        match rows.last_mut() {
            Some(row) if y < anchor_y + row_epsilon => row.push(panel),
            _ => {
                anchor_y = y;
                rows.push(vec![panel]);
            }
        }
    }

    let mut ordered = Vec::new();
    for mut row in rows {
        row.sort_by(|a, b| b.bounding_box.x.cmp(&a.bounding_box.x));
        ordered.extend(row);
    }

    for (index, panel) in ordered.iter_mut().enumerate() {
        panel.reading_order_index = index;
        panel.id = format!("panel_{index}");
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BoundingBox;

    fn panel(x: u32, y: u32) -> SegmentedPanel {
        SegmentedPanel {
            id: "unordered".to_string(),
            bounding_box: BoundingBox {
                x,
                y,
                width: 300,
                height: 200,
            },
            pixel_data: Vec::new(),
            reading_order_index: 0,
        }
    }

    fn positions(panels: &[SegmentedPanel]) -> Vec<(u32, u32)> {
        panels
            .iter()
            .map(|p| (p.bounding_box.x, p.bounding_box.y))
            .collect()
    }

    #[test]
    fn test_two_by_two_reads_tr_tl_br_bl() {
        let ordered = assign_reading_order(
            vec![panel(0, 0), panel(400, 0), panel(0, 300), panel(400, 300)],
            50,
        );
        assert_eq!(
            positions(&ordered),
            vec![(400, 0), (0, 0), (400, 300), (0, 300)]
        );
    }

    #[test]
    fn test_jittered_row_stays_one_row() {
        // Top edges differ by less than the epsilon: one row, right to left.
        let ordered = assign_reading_order(vec![panel(0, 40), panel(400, 0), panel(200, 20)], 50);
        assert_eq!(positions(&ordered), vec![(400, 0), (200, 20), (0, 40)]);
    }

    #[test]
    fn test_epsilon_boundary_opens_new_row() {
        let ordered = assign_reading_order(vec![panel(0, 0), panel(400, 50)], 50);
        // Exactly epsilon apart: different rows, top one first.
        assert_eq!(positions(&ordered), vec![(0, 0), (400, 50)]);
    }

    #[test]
    fn test_ids_and_indices_reassigned() {
        let ordered = assign_reading_order(vec![panel(0, 0), panel(400, 0)], 50);
        assert_eq!(ordered[0].id, "panel_0");
        assert_eq!(ordered[0].reading_order_index, 0);
        assert_eq!(ordered[1].id, "panel_1");
        assert_eq!(ordered[1].reading_order_index, 1);
    }

    #[test]
    fn test_row_order_law() {
        let ordered = assign_reading_order(
            vec![panel(100, 10), panel(500, 0), panel(300, 30), panel(700, 20)],
            50,
        );
        for pair in ordered.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.bounding_box.y.abs_diff(b.bounding_box.y) < 50 {
                assert!(a.bounding_box.x >= b.bounding_box.x);
            }
        }
    }
}
