//! Active grid dimensions for desktop screens and the hotseat.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cell dimensions of every desktop screen plus the hotseat slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    /// Cells per row.
    pub columns: u32,
    /// Rows per screen.
    pub rows: u32,
    /// Number of hotseat slots.
    pub hotseat_slots: u32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 5,
            hotseat_slots: 4,
        }
    }
}

impl GridGeometry {
    /// Construct a geometry.
    #[must_use]
    pub const fn new(columns: u32, rows: u32, hotseat_slots: u32) -> Self {
        Self {
            columns,
            rows,
            hotseat_slots,
        }
    }

    /// Whether `[x, x+span_x) × [y, y+span_y)` lies inside one screen.
    #[must_use]
    pub fn contains(&self, x: u32, y: u32, span_x: u32, span_y: u32) -> bool {
        span_x >= 1
            && span_y >= 1
            && x.checked_add(span_x).is_some_and(|end| end <= self.columns)
            && y.checked_add(span_y).is_some_and(|end| end <= self.rows)
    }

    /// Clamp a footprint so it fits inside one screen.
    /// True when a screen has no cells at all.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    #[must_use]
    pub fn clamp_span(&self, span_x: u32, span_y: u32) -> (u32, u32) {
        (
            span_x.clamp(1, self.columns.max(1)),
            span_y.clamp(1, self.rows.max(1)),
        )
    }
}

impl fmt::Display for GridGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} (hotseat {})",
            self.columns, self.rows, self.hotseat_slots
        )
    }
}
