//! Boolean occupancy mask for one screen.
//!
//! The mask is derived state: it is rebuilt from the layout model whenever the
//! item set changes structurally and never consulted as a source of truth.
//! Vacancy scans walk candidate origins row-major (top-to-bottom, then
//! left-to-right) so placement is deterministic.

/// `columns × rows` occupancy matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOccupancy {
    columns: u32,
    rows: u32,
    cells: Vec<bool>,
}

impl GridOccupancy {
    /// Empty mask of the given size.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            cells: vec![false; (columns as usize) * (rows as usize)],
        }
    }

    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.columns as usize) + (x as usize)
    }

    /// Whether a single cell is occupied. Out-of-bounds cells read as occupied.
    #[must_use]
    pub fn is_occupied(&self, x: u32, y: u32) -> bool {
        if x >= self.columns || y >= self.rows {
            return true;
        }
        self.cells[self.index(x, y)]
    }

    /// Set or clear every cell of a region. The region is clipped to the grid.
    pub fn mark_cells(&mut self, x: u32, y: u32, span_x: u32, span_y: u32, occupied: bool) {
        let x_end = x.saturating_add(span_x).min(self.columns);
        let y_end = y.saturating_add(span_y).min(self.rows);
        for cy in y..y_end {
            for cx in x..x_end {
                let idx = self.index(cx, cy);
                self.cells[idx] = occupied;
            }
        }
    }

    /// True when the whole region is in bounds and no cell is taken.
    #[must_use]
    pub fn is_region_vacant(&self, x: u32, y: u32, span_x: u32, span_y: u32) -> bool {
        if span_x == 0 || span_y == 0 {
            return false;
        }
        let (Some(x_end), Some(y_end)) = (x.checked_add(span_x), y.checked_add(span_y)) else {
            return false;
        };
        if x_end > self.columns || y_end > self.rows {
            return false;
        }
        (y..y_end).all(|cy| (x..x_end).all(|cx| !self.cells[self.index(cx, cy)]))
    }

    /// First vacant origin for a `span_x × span_y` region in row-major order.
    #[must_use]
    pub fn find_vacant_region(&self, span_x: u32, span_y: u32) -> Option<(u32, u32)> {
        if span_x == 0 || span_y == 0 || span_x > self.columns || span_y > self.rows {
            return None;
        }
        for y in 0..=(self.rows - span_y) {
            for x in 0..=(self.columns - span_x) {
                if self.is_region_vacant(x, y, span_x, span_y) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|c| *c)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| *c)
    }

    /// Reset every cell to vacant.
    pub fn clear(&mut self) {
        self.cells.fill(false);
    }
}
