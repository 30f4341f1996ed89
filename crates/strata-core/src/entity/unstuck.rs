//! Unstuck recovery - relocating entities embedded in blocked cells
//!
//! Planning is pure: it reads a plane's `FluidGrid` and returns the tile
//! offset that frees the entity. The tracker applies the offset to the body.

use glam::{IVec2, Vec2};
use strata_terrain::{CellIndex, Direction, FluidCell, FluidGrid};

use super::position::Footprint;
use crate::error::UnstuckError;

/// Where a relocated entity's mass center sits inside its new tile
pub const TILE_CENTER: Vec2 = Vec2::splat(0.5);

/// Result of a successful unstuck search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnstuckPlan {
    /// Tile offset from the stuck anchor
    pub offset: IVec2,
    /// Cell the entity is moved into
    pub target: CellIndex,
}

/// Whether a footprint anchored on `anchor` with its mass center at
/// `sub_tile` covers only non-blocked cells.
///
/// A missing anchor cell counts as not free. Cells past the grid edge belong
/// to another chunk and are not checked.
pub fn is_footprint_free(
    grid: &FluidGrid,
    anchor: CellIndex,
    sub_tile: Vec2,
    footprint: &Footprint,
) -> bool {
    match grid.cell(anchor) {
        Some(cell) if !cell.is_blocked() => {}
        _ => return false,
    }
    let (ax, ay) = grid.coord_of(anchor);
    let (lo, hi) = footprint.covered_offsets(sub_tile);
    for dy in lo.y..=hi.y {
        for dx in lo.x..=hi.x {
            if grid.cell_at(ax + dx, ay + dy).is_some_and(FluidCell::is_blocked) {
                return false;
            }
        }
    }
    true
}

/// Find the smallest relocation that frees a footprint stuck at `anchor`.
///
/// The reinsertion cell is the anchor itself when it is open, otherwise the
/// last cell the entity occupied unblocked, otherwise the exit of the
/// shortest run of blocks in any direction (ties: top, bottom, left, right).
/// The footprint is then shifted along each axis until it fits.
pub fn plan_unstuck(
    grid: &FluidGrid,
    anchor: CellIndex,
    footprint: &Footprint,
    last_unblocked: Option<CellIndex>,
) -> Result<UnstuckPlan, UnstuckError> {
    let anchor_cell = grid.cell(anchor).ok_or(UnstuckError::NoClearNeighbor)?;

    let reinsertion = if !anchor_cell.is_blocked() {
        anchor
    } else if let Some(last) = last_unblocked.filter(|c| is_open(grid, *c)) {
        log::trace!("[UNSTUCK] reusing last unblocked cell {:?}", last);
        last
    } else {
        escape_cell(grid, anchor, footprint)?
    };

    let (rx, ry) = grid.coord_of(reinsertion);
    let shift = fit_shift(grid, reinsertion, footprint)?;
    let target = grid
        .index_of(rx + shift.x, ry + shift.y)
        .ok_or(UnstuckError::StillBlocked)?;

    if !is_footprint_free(grid, target, TILE_CENTER, footprint) {
        return Err(UnstuckError::StillBlocked);
    }

    let (ax, ay) = grid.coord_of(anchor);
    let (tx, ty) = grid.coord_of(target);
    Ok(UnstuckPlan {
        offset: IVec2::new(tx - ax, ty - ay),
        target,
    })
}

fn is_open(grid: &FluidGrid, index: CellIndex) -> bool {
    grid.cell(index).is_some_and(|c| !c.is_blocked())
}

/// First open cell past the shortest block run from `anchor`
fn escape_cell(
    grid: &FluidGrid,
    anchor: CellIndex,
    footprint: &Footprint,
) -> Result<CellIndex, UnstuckError> {
    let tiles = footprint.tiles();
    let (ax, ay) = grid.coord_of(anchor);
    let mut best: Option<(u32, CellIndex)> = None;

    for dir in Direction::ALL {
        let extent = if dir.is_vertical() { tiles.y } else { tiles.x };
        let limit = extent as u32 + 1;
        let (run, ends_open) = grid.run_length(anchor, dir, limit, FluidCell::is_blocked);
        if !ends_open {
            continue;
        }
        let (dx, dy) = dir.offset();
        let Some(exit) = grid.index_of(ax + dx * run as i32, ay + dy * run as i32) else {
            continue;
        };
        // Strictly shorter wins, so earlier directions keep ties
        if best.map_or(true, |(best_run, _)| run < best_run) {
            best = Some((run, exit));
        }
    }

    best.map(|(_, exit)| exit).ok_or(UnstuckError::NoClearNeighbor)
}

/// Open cells past `from` along `dir`, at most `limit`
fn open_run(grid: &FluidGrid, from: CellIndex, dir: Direction, limit: i32) -> i32 {
    if limit <= 0 {
        return 0;
    }
    match grid.neighbor(from, dir) {
        Some(next) => grid.run_length(next, dir, limit as u32, |c| !c.is_blocked()).0 as i32,
        None => 0,
    }
}

/// Shift needed so a footprint centered in `cell` only covers open cells
/// along each axis.
fn fit_shift(grid: &FluidGrid, cell: CellIndex, footprint: &Footprint) -> Result<IVec2, UnstuckError> {
    let (lo, hi) = footprint.covered_offsets(TILE_CENTER);
    let x = axis_shift(grid, cell, Direction::Left, Direction::Right, -lo.x, hi.x)
        .ok_or(UnstuckError::FootprintDoesNotFit { axis: 'x' })?;
    let y = axis_shift(grid, cell, Direction::Bottom, Direction::Top, -lo.y, hi.y)
        .ok_or(UnstuckError::FootprintDoesNotFit { axis: 'y' })?;
    Ok(IVec2::new(x, y))
}

fn axis_shift(
    grid: &FluidGrid,
    cell: CellIndex,
    negative: Direction,
    positive: Direction,
    need_negative: i32,
    need_positive: i32,
) -> Option<i32> {
    let need_negative = need_negative.max(0);
    let need_positive = need_positive.max(0);
    let span = need_negative + need_positive;
    let free_negative = open_run(grid, cell, negative, span);
    let free_positive = open_run(grid, cell, positive, span);

    if free_negative + free_positive < span {
        return None;
    }
    if free_positive < need_positive {
        Some(-(need_positive - free_positive))
    } else if free_negative < need_negative {
        Some(need_negative - free_negative)
    } else {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Footprint {
        Footprint::default()
    }

    fn index(grid: &FluidGrid, x: i32, y: i32) -> CellIndex {
        grid.index_of(x, y).unwrap()
    }

    #[test]
    fn test_footprint_free_checks_anchor_and_neighbors() {
        let grid = FluidGrid::parse_rows(&["...", ".#.", "..."]).unwrap();
        assert!(!is_footprint_free(&grid, index(&grid, 1, 1), TILE_CENTER, &unit()));
        assert!(is_footprint_free(&grid, index(&grid, 0, 1), TILE_CENTER, &unit()));
        // Mass center near the right edge: the footprint reaches the block
        assert!(!is_footprint_free(&grid, index(&grid, 0, 1), Vec2::new(0.9, 0.5), &unit()));
    }

    #[test]
    fn test_footprint_missing_anchor_is_not_free() {
        let grid = FluidGrid::new(2, 2);
        assert!(!is_footprint_free(&grid, CellIndex(99), TILE_CENTER, &unit()));
    }

    #[test]
    fn test_footprint_past_grid_edge_is_not_checked() {
        let grid = FluidGrid::new(2, 2);
        assert!(is_footprint_free(&grid, index(&grid, 0, 0), Vec2::new(0.1, 0.1), &unit()));
    }

    #[test]
    fn test_open_anchor_needs_no_offset() {
        let grid = FluidGrid::new(3, 3);
        let plan = plan_unstuck(&grid, index(&grid, 1, 1), &unit(), None).unwrap();
        assert_eq!(plan.offset, IVec2::ZERO);
    }

    #[test]
    fn test_single_left_exit() {
        // Left neighbor open, every other direction blocked for 3+ cells
        let grid = FluidGrid::parse_rows(&[
            "#######",
            "#######",
            "#######",
            "##.####",
            "#######",
            "#######",
            "#######",
        ])
        .unwrap();
        let anchor = index(&grid, 3, 3);
        let plan = plan_unstuck(&grid, anchor, &unit(), None).unwrap();
        assert_eq!(plan.offset, IVec2::new(-1, 0));
        assert_eq!(plan.target, index(&grid, 2, 3));
        assert!(is_footprint_free(&grid, plan.target, TILE_CENTER, &unit()));
    }

    #[test]
    fn test_ties_prefer_top_then_bottom() {
        let grid = FluidGrid::parse_rows(&[".....", "..#..", "....."]).unwrap();
        let plan = plan_unstuck(&grid, index(&grid, 2, 1), &unit(), None).unwrap();
        assert_eq!(plan.offset, IVec2::new(0, 1));

        // Top runs off the grid, bottom and left tie
        let grid = FluidGrid::parse_rows(&["..#..", "..#..", "....."]).unwrap();
        let plan = plan_unstuck(&grid, index(&grid, 2, 1), &unit(), None).unwrap();
        assert_eq!(plan.offset, IVec2::new(0, -1));
    }

    #[test]
    fn test_last_unblocked_preferred() {
        let grid = FluidGrid::parse_rows(&["....", ".#..", "...."]).unwrap();
        let last = index(&grid, 3, 0);
        let plan = plan_unstuck(&grid, index(&grid, 1, 1), &unit(), Some(last)).unwrap();
        assert_eq!(plan.target, last);
        assert_eq!(plan.offset, IVec2::new(2, -1));
    }

    #[test]
    fn test_blocked_last_unblocked_is_ignored() {
        let grid = FluidGrid::parse_rows(&["...", ".##", "..."]).unwrap();
        let stale = index(&grid, 2, 1);
        let plan = plan_unstuck(&grid, index(&grid, 1, 1), &unit(), Some(stale)).unwrap();
        assert_eq!(plan.offset, IVec2::new(0, 1));
    }

    #[test]
    fn test_exit_right_after_longest_allowed_run() {
        // Two blocks above the anchor, then open: the run is exactly the
        // search bound for a 1x1 footprint
        let grid = FluidGrid::parse_rows(&["#####", "##.##", "#####", "#####", "#####"]).unwrap();
        let plan = plan_unstuck(&grid, index(&grid, 2, 1), &unit(), None).unwrap();
        assert_eq!(plan.offset, IVec2::new(0, 2));
        assert_eq!(plan.target, index(&grid, 2, 3));
    }

    #[test]
    fn test_run_past_search_bound_fails() {
        let grid = FluidGrid::parse_rows(&["##.##", "#####", "#####", "#####", "#####", "#####"]).unwrap();
        let err = plan_unstuck(&grid, index(&grid, 2, 2), &unit(), None).unwrap_err();
        assert_eq!(err, UnstuckError::NoClearNeighbor);
    }

    fn shaft() -> FluidGrid {
        // Open column from y=4 up, solid below
        FluidGrid::parse_rows(&[
            "##.##", "##.##", "##.##", "##.##", "#####", "#####", "#####", "#####",
        ])
        .unwrap()
    }

    #[test]
    fn test_tall_footprint_exit_at_search_bound() {
        // Three blocks up from (2,1) for a footprint two tiles tall. The exit
        // at (2,4) has a block below it, so the footprint shifts up by one.
        let grid = shaft();
        let fp = Footprint::centered(Vec2::new(1.0, 2.0));
        let plan = plan_unstuck(&grid, index(&grid, 2, 1), &fp, None).unwrap();
        assert_eq!(plan.target, index(&grid, 2, 5));
        assert_eq!(plan.offset, IVec2::new(0, 4));
        assert!(is_footprint_free(&grid, plan.target, TILE_CENTER, &fp));
    }

    #[test]
    fn test_tall_footprint_run_past_search_bound_fails() {
        let grid = shaft();
        let fp = Footprint::centered(Vec2::new(1.0, 2.0));
        let err = plan_unstuck(&grid, index(&grid, 2, 0), &fp, None).unwrap_err();
        assert_eq!(err, UnstuckError::NoClearNeighbor);
    }

    #[test]
    fn test_fully_enclosed_fails() {
        let grid = FluidGrid::parse_rows(&["#####", "#####", "#####", "#####", "#####"]).unwrap();
        let err = plan_unstuck(&grid, index(&grid, 2, 2), &unit(), None).unwrap_err();
        assert_eq!(err, UnstuckError::NoClearNeighbor);
    }

    #[test]
    fn test_tall_footprint_shifts_to_fit() {
        // A 1x2 footprint needs the cells above and below the reinsertion
        // cell. The exit on the left sits under a ceiling, so the plan moves
        // one further down.
        let grid = FluidGrid::parse_rows(&[
            "#####",
            "#####",
            ".####",
            ".####",
            ".####",
            "#####",
        ])
        .unwrap();
        let fp = Footprint::centered(Vec2::new(1.0, 2.0));
        let anchor = index(&grid, 1, 3);
        let plan = plan_unstuck(&grid, anchor, &fp, None).unwrap();
        assert_eq!(plan.target, index(&grid, 0, 2));
        assert_eq!(plan.offset, IVec2::new(-1, -1));
        assert!(is_footprint_free(&grid, plan.target, TILE_CENTER, &fp));
    }

    #[test]
    fn test_footprint_too_big_for_gap() {
        let grid = FluidGrid::parse_rows(&["#####", "#####", "#.###", "#####", "#####"]).unwrap();
        let fp = Footprint::centered(Vec2::new(1.0, 2.0));
        let err = plan_unstuck(&grid, index(&grid, 2, 2), &fp, None).unwrap_err();
        assert_eq!(err, UnstuckError::FootprintDoesNotFit { axis: 'y' });
    }
}
