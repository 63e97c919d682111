//! First-fit placement across an ordered list of screens.
//!
//! Existing screens are tried in the order given, then screens allocated
//! earlier in the same batch, and only then is a new screen id allocated. Every
//! placement is recorded in the finder's own occupancy so that later calls in
//! the same batch see it.

#![allow(missing_docs)]

use std::collections::HashMap;

use crate::grid::{GridGeometry, GridOccupancy};
use crate::model::ScreenId;

/// Where an item was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub screen: ScreenId,
    pub cell_x: u32,
    pub cell_y: u32,
    /// Effective span, clamped to the grid when the request was larger.
    pub span_x: u32,
    pub span_y: u32,
    /// True when `screen` did not exist before this batch.
    pub new_screen: bool,
}

/// Stateful first-fit finder over per-screen occupancy.
#[derive(Debug, Clone)]
pub struct SpaceFinder {
    geometry: GridGeometry,
    occupancy: HashMap<ScreenId, GridOccupancy>,
}

impl SpaceFinder {
    /// Finder with no occupied cells anywhere.
    #[must_use]
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            occupancy: HashMap::new(),
        }
    }

    /// Finder seeded with occupancy rebuilt from the layout model.
    #[must_use]
    pub fn with_occupancy(
        geometry: GridGeometry,
        occupancy: HashMap<ScreenId, GridOccupancy>,
    ) -> Self {
        Self {
            geometry,
            occupancy,
        }
    }

    #[must_use]
    pub const fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Occupancy for a screen, if anything was ever marked there.
    #[must_use]
    pub fn occupancy(&self, screen: ScreenId) -> Option<&GridOccupancy> {
        self.occupancy.get(&screen)
    }

    /// Consume the finder and return its occupancy map.
    #[must_use]
    pub fn into_occupancy(self) -> HashMap<ScreenId, GridOccupancy> {
        self.occupancy
    }

    /// Mark a region occupied without searching.
    pub fn occupy(&mut self, screen: ScreenId, x: u32, y: u32, span_x: u32, span_y: u32) {
        self.screen_mut(screen).mark_cells(x, y, span_x, span_y, true);
    }

    /// Whether a region on `screen` is free.
    #[must_use]
    pub fn is_vacant(&self, screen: ScreenId, x: u32, y: u32, span_x: u32, span_y: u32) -> bool {
        match self.occupancy.get(&screen) {
            Some(occ) => occ.is_region_vacant(x, y, span_x, span_y),
            None => self.geometry.contains(x, y, span_x, span_y),
        }
    }

    /// First vacant origin on one screen.
    #[must_use]
    pub fn find_on_screen(&self, screen: ScreenId, span_x: u32, span_y: u32) -> Option<(u32, u32)> {
        match self.occupancy.get(&screen) {
            Some(occ) => occ.find_vacant_region(span_x, span_y),
            None => self.geometry.contains(0, 0, span_x, span_y).then_some((0, 0)),
        }
    }

    /// Place a `span_x × span_y` item. Never fails.
    ///
    /// `allocated_new_screens` carries the screens this batch has already
    /// created; a freshly allocated screen is appended to it.
    pub fn find_space_for_item(
        &mut self,
        existing_screens: &[ScreenId],
        allocated_new_screens: &mut Vec<ScreenId>,
        span_x: u32,
        span_y: u32,
    ) -> Placement {
        let (span_x, span_y) = self.geometry.clamp_span(span_x, span_y);

        let candidates = existing_screens
            .iter()
            .map(|s| (*s, false))
            .chain(allocated_new_screens.iter().map(|s| (*s, true)));
        let mut hit = None;
        for (screen, new_screen) in candidates {
            if let Some((x, y)) = self.find_on_screen(screen, span_x, span_y) {
                hit = Some((screen, x, y, new_screen));
                break;
            }
        }

        let (screen, cell_x, cell_y, new_screen) = hit.unwrap_or_else(|| {
            let next = existing_screens
                .iter()
                .chain(allocated_new_screens.iter())
                .chain(self.occupancy.keys())
                .max()
                .map_or(ScreenId(0), |max| ScreenId(max.0 + 1));
            allocated_new_screens.push(next);
            (next, 0, 0, true)
        });

        self.occupy(screen, cell_x, cell_y, span_x, span_y);
        Placement {
            screen,
            cell_x,
            cell_y,
            span_x,
            span_y,
            new_screen,
        }
    }

    fn screen_mut(&mut self, screen: ScreenId) -> &mut GridOccupancy {
        let GridGeometry { columns, rows, .. } = self.geometry;
        self.occupancy
            .entry(screen)
            .or_insert_with(|| GridOccupancy::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(finder: &mut SpaceFinder, screen: u32) {
        let g = finder.geometry();
        finder.occupy(ScreenId(screen), 0, 0, g.columns, g.rows);
    }

    #[test]
    fn full_screens_allocate_next_sequential_id() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        fill(&mut finder, 0);
        fill(&mut finder, 1);
        let mut added = Vec::new();
        let p = finder.find_space_for_item(&[ScreenId(0), ScreenId(1)], &mut added, 1, 1);
        assert_eq!(p.screen, ScreenId(2));
        assert_eq!((p.cell_x, p.cell_y), (0, 0));
        assert!(p.new_screen);
        assert_eq!(added, vec![ScreenId(2)]);
    }

    #[test]
    fn first_fit_prefers_earlier_screen_with_one_free_cell() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        fill(&mut finder, 0);
        finder.screen_mut(ScreenId(0)).mark_cells(3, 3, 1, 1, false);
        let mut added = Vec::new();
        let p = finder.find_space_for_item(&[ScreenId(0), ScreenId(1)], &mut added, 1, 1);
        assert_eq!(p.screen, ScreenId(0));
        assert_eq!((p.cell_x, p.cell_y), (3, 3));
        assert!(added.is_empty());
    }

    #[test]
    fn empty_middle_screen_preferred_over_new_screen() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        fill(&mut finder, 0);
        fill(&mut finder, 2);
        let mut added = Vec::new();
        let p = finder.find_space_for_item(
            &[ScreenId(0), ScreenId(1), ScreenId(2)],
            &mut added,
            2,
            2,
        );
        assert_eq!(p.screen, ScreenId(1));
        assert!(!p.new_screen);
    }

    #[test]
    fn batch_reuses_screen_it_allocated() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        fill(&mut finder, 0);
        let mut added = Vec::new();
        let first = finder.find_space_for_item(&[ScreenId(0)], &mut added, 1, 1);
        let second = finder.find_space_for_item(&[ScreenId(0)], &mut added, 1, 1);
        assert_eq!(first.screen, ScreenId(1));
        assert_eq!(second.screen, ScreenId(1));
        assert_eq!((second.cell_x, second.cell_y), (1, 0));
        assert!(second.new_screen);
        assert_eq!(added, vec![ScreenId(1)]);
    }

    #[test]
    fn placement_is_deterministic_for_identical_state() {
        let mut base = SpaceFinder::new(GridGeometry::new(5, 5, 5));
        base.occupy(ScreenId(0), 0, 0, 3, 2);
        let mut a = base.clone();
        let mut b = base;
        let pa = a.find_space_for_item(&[ScreenId(0)], &mut Vec::new(), 2, 2);
        let pb = b.find_space_for_item(&[ScreenId(0)], &mut Vec::new(), 2, 2);
        assert_eq!(pa, pb);
    }

    #[test]
    fn no_screens_allocates_zero() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        let mut added = Vec::new();
        let p = finder.find_space_for_item(&[], &mut added, 1, 1);
        assert_eq!(p.screen, ScreenId(0));
    }

    #[test]
    fn oversized_request_is_clamped_to_grid() {
        let mut finder = SpaceFinder::new(GridGeometry::new(4, 4, 4));
        let p = finder.find_space_for_item(&[ScreenId(0)], &mut Vec::new(), 6, 2);
        assert_eq!((p.span_x, p.span_y), (4, 2));
        assert_eq!(p.screen, ScreenId(0));
    }

    #[test]
    fn placements_in_one_batch_never_collide() {
        let mut finder = SpaceFinder::new(GridGeometry::new(3, 3, 3));
        let mut added = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let p = finder.find_space_for_item(&[ScreenId(0)], &mut added, 1, 1);
            assert!(seen.insert((p.screen, p.cell_x, p.cell_y)));
        }
        assert_eq!(added, vec![ScreenId(1), ScreenId(2)]);
    }
}
