//! Per-plane arena of fluid cells

use crate::cell::{CellIndex, CellKind, Direction, FluidCell};
use serde::{Deserialize, Serialize};

/// Rectangular grid of `FluidCell`s with precomputed neighbor links.
///
/// Cell `(x, y)` lives at index `y * width + x`, with `y = 0` the bottom row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidGrid {
    width: u32,
    height: u32,
    cells: Vec<FluidCell>,
}

impl FluidGrid {
    /// Create an all-air grid
    pub fn new(width: u32, height: u32) -> Self {
        let cells = vec![FluidCell::new(CellKind::Air); (width * height) as usize];
        let mut grid = Self {
            width,
            height,
            cells,
        };
        grid.relink();
        grid
    }

    /// Parse a text map, top row first.
    ///
    /// `#` block, `.` air, `_` empty surface, `,` half-filled surface,
    /// `~` full surface. Returns `None` for ragged rows or unknown symbols.
    pub fn parse_rows<S: AsRef<str>>(rows: &[S]) -> Option<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.as_ref().chars().count())? as u32;
        let mut grid = Self::new(width, height);

        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() as u32 != width {
                log::warn!("fluid grid row {} has a different width than row 0", row);
                return None;
            }
            let y = height - 1 - row as u32;
            for (x, c) in line.chars().enumerate() {
                let (kind, mass) = match c {
                    '#' => (CellKind::Block, 0.0),
                    '.' => (CellKind::Air, 0.0),
                    '_' => (CellKind::Surface, 0.0),
                    ',' => (CellKind::Surface, 0.5),
                    '~' => (CellKind::Surface, 1.0),
                    _ => return None,
                };
                let index = grid.index_of(x as i32, y as i32)?;
                let cell = grid.cell_mut(index)?;
                cell.kind = kind;
                cell.mass = mass;
            }
        }
        Some(grid)
    }

    fn relink(&mut self) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let i = (y * self.width as i32 + x) as usize;
                for dir in Direction::ALL {
                    let (dx, dy) = dir.offset();
                    let link = self.index_of(x + dx, y + dy);
                    self.cells[i].link(dir, link);
                }
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Arena index for a tile coordinate, `None` outside the grid
    pub fn index_of(&self, x: i32, y: i32) -> Option<CellIndex> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(CellIndex((y as u32) * self.width + x as u32))
    }

    /// Tile coordinate of an arena index
    pub fn coord_of(&self, index: CellIndex) -> (i32, i32) {
        let w = self.width.max(1);
        ((index.0 % w) as i32, (index.0 / w) as i32)
    }

    pub fn cell(&self, index: CellIndex) -> Option<&FluidCell> {
        self.cells.get(index.0 as usize)
    }

    pub fn cell_mut(&mut self, index: CellIndex) -> Option<&mut FluidCell> {
        self.cells.get_mut(index.0 as usize)
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Option<&FluidCell> {
        self.index_of(x, y).and_then(|i| self.cell(i))
    }

    pub fn neighbor(&self, index: CellIndex, dir: Direction) -> Option<CellIndex> {
        self.cell(index).and_then(|c| c.neighbor(dir))
    }

    /// `true` when the cell exists and is a block
    pub fn is_blocked(&self, index: CellIndex) -> bool {
        self.cell(index).is_some_and(FluidCell::is_blocked)
    }

    pub fn set_kind(&mut self, x: i32, y: i32, kind: CellKind) -> bool {
        match self.index_of(x, y).and_then(|i| self.cells.get_mut(i.0 as usize)) {
            Some(cell) => {
                cell.kind = kind;
                true
            }
            None => false,
        }
    }

    pub fn set_mass(&mut self, x: i32, y: i32, mass: f32) -> bool {
        match self.index_of(x, y).and_then(|i| self.cells.get_mut(i.0 as usize)) {
            Some(cell) => {
                cell.mass = mass;
                true
            }
            None => false,
        }
    }

    /// Count consecutive cells from `start` (inclusive) along `dir` that
    /// satisfy `pred`, counting at most `limit` of them.
    ///
    /// Returns the count and whether the walk ended on a cell that exists and
    /// fails `pred`. The cell right after a run of exactly `limit` is still
    /// looked at; a longer run or running off the grid returns `false`.
    pub fn run_length(
        &self,
        start: CellIndex,
        dir: Direction,
        limit: u32,
        pred: impl Fn(&FluidCell) -> bool,
    ) -> (u32, bool) {
        let mut count = 0;
        let mut current = Some(start);
        while let Some(index) = current {
            let Some(cell) = self.cell(index) else {
                return (count, false);
            };
            if !pred(cell) {
                return (count, true);
            }
            if count >= limit {
                return (count, false);
            }
            count += 1;
            current = cell.neighbor(dir);
        }
        (count, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_are_y_up() {
        let grid = FluidGrid::new(3, 3);
        let center = grid.index_of(1, 1).unwrap();
        assert_eq!(grid.neighbor(center, Direction::Top), grid.index_of(1, 2));
        assert_eq!(grid.neighbor(center, Direction::Bottom), grid.index_of(1, 0));
        assert_eq!(grid.neighbor(center, Direction::Left), grid.index_of(0, 1));
        assert_eq!(grid.neighbor(center, Direction::Right), grid.index_of(2, 1));

        let corner = grid.index_of(0, 0).unwrap();
        assert_eq!(grid.neighbor(corner, Direction::Bottom), None);
        assert_eq!(grid.neighbor(corner, Direction::Left), None);
    }

    #[test]
    fn test_parse_rows_top_first() {
        let grid = FluidGrid::parse_rows(&["#..", ".~.", "..,"]).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert!(grid.cell_at(0, 2).unwrap().is_blocked());
        assert_eq!(grid.cell_at(1, 1).unwrap().kind, CellKind::Surface);
        assert_eq!(grid.cell_at(2, 0).unwrap().mass, 0.5);
    }

    #[test]
    fn test_parse_rows_rejects_bad_input() {
        assert!(FluidGrid::parse_rows(&["...", ".."]).is_none());
        assert!(FluidGrid::parse_rows(&["..x"]).is_none());
        assert!(FluidGrid::parse_rows::<&str>(&[]).is_none());
    }

    #[test]
    fn test_run_length() {
        let grid = FluidGrid::parse_rows(&["....", "###.", "...."]).unwrap();
        let start = grid.index_of(0, 1).unwrap();
        let (run, ended_on_free) = grid.run_length(start, Direction::Right, 10, |c| c.is_blocked());
        assert_eq!(run, 3);
        assert!(ended_on_free);

        // Running off the grid
        let (run, ended_on_free) = grid.run_length(start, Direction::Left, 10, |c| c.is_blocked());
        assert_eq!(run, 1);
        assert!(!ended_on_free);

        // Longer than the limit
        let (run, ended_on_free) = grid.run_length(start, Direction::Right, 2, |c| c.is_blocked());
        assert_eq!(run, 2);
        assert!(!ended_on_free);

        // Exactly the limit: the cell after the run is still checked
        let (run, ended_on_free) = grid.run_length(start, Direction::Right, 3, |c| c.is_blocked());
        assert_eq!(run, 3);
        assert!(ended_on_free);
    }

    #[test]
    fn test_coord_round_trip() {
        let grid = FluidGrid::new(5, 4);
        for y in 0..4 {
            for x in 0..5 {
                let index = grid.index_of(x, y).unwrap();
                assert_eq!(grid.coord_of(index), (x, y));
            }
        }
        assert_eq!(grid.index_of(5, 0), None);
        assert_eq!(grid.index_of(0, -1), None);
    }
}
