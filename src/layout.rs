use std::collections::BTreeMap;

use crate::models::{Position, TaskId};

/// Rendered card width; drives the centering offset of each row.
pub const NODE_WIDTH: f64 = 240.0;
/// Rendered card height; informational, the row pitch is `VERTICAL_SPACING`.
pub const NODE_HEIGHT: f64 = 200.0;
/// Distance between node centers within a row.
pub const HORIZONTAL_SPACING: f64 = 300.0;
/// Distance between consecutive level rows.
pub const VERTICAL_SPACING: f64 = 280.0;
pub const START_X: f64 = 100.0;
pub const START_Y: f64 = 100.0;

/// Turns level assignments into pixel coordinates: one row per level, each
/// row centered on the `START_X` centerline. A pure function of its input
/// and the constants above; the same levels always produce bit-identical
/// positions.
pub fn compute_layout(levels: &BTreeMap<TaskId, u32>) -> BTreeMap<TaskId, Position> {
    let mut rows: BTreeMap<u32, Vec<TaskId>> = BTreeMap::new();
    for (task_id, level) in levels {
        rows.entry(*level).or_default().push(*task_id);
    }

    let mut positions = BTreeMap::new();
    for (level, row) in &rows {
        let total_width =
            row.len() as f64 * HORIZONTAL_SPACING - (HORIZONTAL_SPACING - NODE_WIDTH);
        let row_start_x = START_X - total_width / 2.0 + NODE_WIDTH / 2.0;
        let y = START_Y + f64::from(*level) * VERTICAL_SPACING;
        for (index, task_id) in row.iter().enumerate() {
            positions.insert(
                *task_id,
                Position {
                    x: row_start_x + index as f64 * HORIZONTAL_SPACING,
                    y,
                },
            );
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::{HORIZONTAL_SPACING, compute_layout};
    use crate::models::TaskId;

    fn id(n: u128) -> TaskId {
        TaskId(Uuid::from_u128(n))
    }

    fn levels(pairs: &[(TaskId, u32)]) -> BTreeMap<TaskId, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn single_node_sits_at_the_origin() {
        let a = id(1);
        let positions = compute_layout(&levels(&[(a, 0)]));
        assert_eq!(positions[&a].x, 100.0);
        assert_eq!(positions[&a].y, 100.0);
    }

    #[test]
    fn chain_rows_descend_by_row_pitch() {
        let (a, b, c) = (id(1), id(2), id(3));
        let positions = compute_layout(&levels(&[(a, 0), (b, 1), (c, 2)]));

        assert_eq!(positions[&a].x, 100.0);
        assert_eq!(positions[&b].x, 100.0);
        assert_eq!(positions[&c].x, 100.0);
        assert_eq!(positions[&a].y, 100.0);
        assert_eq!(positions[&b].y, 380.0);
        assert_eq!(positions[&c].y, 660.0);
    }

    #[test]
    fn siblings_center_around_the_centerline() {
        let (a, b, c) = (id(1), id(2), id(3));
        let positions = compute_layout(&levels(&[(a, 0), (b, 1), (c, 1)]));

        assert_eq!(positions[&a].x, 100.0);
        assert_eq!(positions[&b].x, -50.0);
        assert_eq!(positions[&c].x, 250.0);
        assert_eq!(positions[&b].y, 380.0);
        assert_eq!(positions[&c].y, 380.0);
    }

    #[test]
    fn edge_free_row_spaces_nodes_exactly() {
        let ids: Vec<TaskId> = (1..=3).map(id).collect();
        let positions = compute_layout(&levels(&[(ids[0], 0), (ids[1], 0), (ids[2], 0)]));

        let mut xs: Vec<f64> = ids.iter().map(|task_id| positions[task_id].x).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).expect("coordinates are finite"));
        assert_eq!(xs[1] - xs[0], HORIZONTAL_SPACING);
        assert_eq!(xs[2] - xs[1], HORIZONTAL_SPACING);
        // Row of three stays centered on x = 100.
        assert_eq!(xs[1], 100.0);
        for task_id in &ids {
            assert_eq!(positions[task_id].y, 100.0);
        }
    }

    #[test]
    fn layout_is_idempotent() {
        let input = levels(&[(id(1), 0), (id(2), 1), (id(3), 1), (id(4), 2)]);
        let first = compute_layout(&input);
        let second = compute_layout(&input);
        assert_eq!(first, second);
    }

    #[test]
    fn within_row_order_is_ascending_by_id() {
        let (a, b) = (id(1), id(2));
        let positions = compute_layout(&levels(&[(b, 0), (a, 0)]));
        assert!(positions[&a].x < positions[&b].x);
    }
}
