//! Rewrites a layout authored for one grid so it is valid on another.
//!
//! Small changes (every dimension moves by at most the configured delta)
//! keep items on their screens and only nudge what no longer fits. Larger
//! changes reflow everything from scratch onto fresh screens in the source
//! reading order. The hotseat is trimmed from its highest slots and the
//! trimmed items land on the desktop after everything else.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::config::MigrationConfig;
use crate::core::errors::{HslError, Result};
use crate::grid::{GridGeometry, SpaceFinder};
use crate::model::{Container, Item, ItemId, ScreenId, check_invariants};

/// Tuning for [`GridMigration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationPolicy {
    pub reflow_in_place_max_delta: u32,
    pub widget_min_span_x: u32,
    pub widget_min_span_y: u32,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

impl MigrationPolicy {
    #[must_use]
    pub const fn from_config(config: &MigrationConfig) -> Self {
        Self {
            reflow_in_place_max_delta: config.reflow_in_place_max_delta,
            widget_min_span_x: config.widget_min_span_x,
            widget_min_span_y: config.widget_min_span_y,
        }
    }
}

/// How the desktop was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflowMode {
    Unchanged,
    InPlace,
    Full,
}

impl ReflowMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::InPlace => "in_place",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Every item, ordered by id.
    pub items: Vec<Item>,
    pub mode: ReflowMode,
    /// Hotseat items that moved to the desktop.
    pub hotseat_overflow: Vec<ItemId>,
    /// Items whose container, cell, or span changed.
    pub moved: usize,
}

/// Whether a stored layout needs migrating before use.
#[must_use]
pub fn needs_migration(stored: Option<GridGeometry>, current: GridGeometry) -> bool {
    stored.is_some_and(|g| g != current)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridMigration {
    policy: MigrationPolicy,
}

impl GridMigration {
    #[must_use]
    pub const fn new(policy: MigrationPolicy) -> Self {
        Self { policy }
    }

    /// Migrate `items` from `source` to `dest`.
    ///
    /// No item is ever lost. Fails only if even a full reflow cannot produce
    /// a valid layout.
    pub fn migrate(
        &self,
        items: &[Item],
        source: GridGeometry,
        dest: GridGeometry,
    ) -> Result<MigrationOutcome> {
        if dest.is_degenerate() {
            return Err(HslError::InvalidConfig {
                details: format!("cannot migrate to a grid without cells: {dest}"),
            });
        }
        if source == dest {
            return Ok(MigrationOutcome {
                items: items.to_vec(),
                mode: ReflowMode::Unchanged,
                hotseat_overflow: Vec::new(),
                moved: 0,
            });
        }

        let mut hotseat: Vec<Item> = Vec::new();
        let mut desktop: Vec<Item> = Vec::new();
        let mut nested: Vec<Item> = Vec::new();
        for item in items {
            match item.container {
                Container::Hotseat(_) => hotseat.push(item.clone()),
                Container::Desktop(_) => desktop.push(item.clone()),
                Container::Folder(_) => nested.push(item.clone()),
            }
        }

        hotseat.sort_by_key(|i| (i.rank, i.hotseat_slot(), i.id));
        let keep = usize::try_from(dest.hotseat_slots).unwrap_or(usize::MAX);
        let overflow: Vec<Item> = if hotseat.len() > keep {
            hotseat.split_off(keep)
        } else {
            Vec::new()
        };
        for (slot, item) in (0u32..).zip(hotseat.iter_mut()) {
            item.container = Container::Hotseat(slot);
            item.rank = slot;
        }
        let hotseat_overflow: Vec<ItemId> = overflow.iter().map(|i| i.id).collect();

        let dx = source.columns.abs_diff(dest.columns);
        let dy = source.rows.abs_diff(dest.rows);
        let threshold = self.policy.reflow_in_place_max_delta;
        let mut mode = if dx <= threshold && dy <= threshold {
            ReflowMode::InPlace
        } else {
            ReflowMode::Full
        };

        desktop.sort_by_key(reading_order);
        let mut placed = match mode {
            ReflowMode::InPlace => self.reflow_in_place(&desktop, &overflow, dest),
            _ => self.reflow_full(&desktop, &overflow, dest),
        };
        let mut out = assemble(&hotseat, &placed, &nested);

        let check = check_invariants(&out, &dest);
        debug_assert!(check.is_ok(), "grid migration produced an invalid layout: {check:?}");
        if let Err(err) = check {
            if mode != ReflowMode::InPlace {
                return Err(err);
            }
            eprintln!("[HSL-MIGRATION] in-place reflow to {dest} failed ({err}), reflowing fully");
            mode = ReflowMode::Full;
            placed = self.reflow_full(&desktop, &overflow, dest);
            out = assemble(&hotseat, &placed, &nested);
            check_invariants(&out, &dest)?;
        }

        let moved = count_moved(items, &out);
        Ok(MigrationOutcome {
            items: out,
            mode,
            hotseat_overflow,
            moved,
        })
    }

    /// Span an item takes in `dest`. Widgets shrink to the minimum widget
    /// span before being clamped outright.
    fn fit_span(&self, item: &Item, dest: GridGeometry) -> (u32, u32) {
        if item.span_x <= dest.columns && item.span_y <= dest.rows {
            return (item.span_x, item.span_y);
        }
        if item.is_widget() {
            let min_x = self.policy.widget_min_span_x.min(item.span_x);
            let min_y = self.policy.widget_min_span_y.min(item.span_y);
            let x = if item.span_x > dest.columns { min_x } else { item.span_x };
            let y = if item.span_y > dest.rows { min_y } else { item.span_y };
            return dest.clamp_span(x, y);
        }
        dest.clamp_span(item.span_x, item.span_y)
    }

    fn reflow_in_place(
        &self,
        desktop: &[Item],
        overflow: &[Item],
        dest: GridGeometry,
    ) -> Vec<Item> {
        let mut finder = SpaceFinder::new(dest);
        let screens: Vec<ScreenId> = desktop
            .iter()
            .filter_map(Item::screen)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut placed = Vec::with_capacity(desktop.len() + overflow.len());
        let mut adjust = Vec::new();

        // Items that still fit untouched claim their cells first.
        for item in desktop {
            if let Some(screen) = item.screen()
                && item.fits(&dest)
                && finder.is_vacant(screen, item.cell_x, item.cell_y, item.span_x, item.span_y)
            {
                finder.occupy(screen, item.cell_x, item.cell_y, item.span_x, item.span_y);
                placed.push(item.clone());
            } else {
                adjust.push(item);
            }
        }

        let mut displaced = Vec::new();
        for item in adjust {
            let Some(screen) = item.screen() else {
                continue;
            };
            let (sx, sy) = self.fit_span(item, dest);
            let x = item.cell_x.min(dest.columns - sx);
            let y = item.cell_y.min(dest.rows - sy);
            let spot = if finder.is_vacant(screen, x, y, sx, sy) {
                Some((x, y))
            } else {
                finder.find_on_screen(screen, sx, sy)
            };
            match spot {
                Some((x, y)) => {
                    finder.occupy(screen, x, y, sx, sy);
                    placed.push(relocate(item, screen, x, y, sx, sy));
                }
                None => displaced.push(item),
            }
        }

        let mut new_screens = Vec::new();
        for item in displaced.into_iter().chain(overflow.iter()) {
            let (sx, sy) = self.fit_span(item, dest);
            let p = finder.find_space_for_item(&screens, &mut new_screens, sx, sy);
            placed.push(relocate(item, p.screen, p.cell_x, p.cell_y, p.span_x, p.span_y));
        }
        placed
    }

    fn reflow_full(&self, desktop: &[Item], overflow: &[Item], dest: GridGeometry) -> Vec<Item> {
        let mut finder = SpaceFinder::new(dest);
        let mut screens = Vec::new();
        desktop
            .iter()
            .chain(overflow.iter())
            .map(|item| {
                let (sx, sy) = self.fit_span(item, dest);
                let p = finder.find_space_for_item(&[], &mut screens, sx, sy);
                relocate(item, p.screen, p.cell_x, p.cell_y, p.span_x, p.span_y)
            })
            .collect()
    }
}

fn reading_order(item: &Item) -> (Option<ScreenId>, u32, u32, ItemId) {
    (item.screen(), item.cell_y, item.cell_x, item.id)
}

fn relocate(item: &Item, screen: ScreenId, x: u32, y: u32, span_x: u32, span_y: u32) -> Item {
    let mut out = item.clone();
    out.container = Container::Desktop(screen);
    out.cell_x = x;
    out.cell_y = y;
    out.span_x = span_x;
    out.span_y = span_y;
    out.rank = 0;
    out
}

fn assemble(hotseat: &[Item], desktop: &[Item], nested: &[Item]) -> Vec<Item> {
    let mut out: Vec<Item> = hotseat
        .iter()
        .chain(desktop.iter())
        .chain(nested.iter())
        .cloned()
        .collect();
    out.sort_by_key(|i| i.id);
    out
}

fn count_moved(before: &[Item], after: &[Item]) -> usize {
    after
        .iter()
        .filter(|a| {
            before.iter().find(|b| b.id == a.id).is_none_or(|b| {
                b.container != a.container
                    || b.cell_x != a.cell_x
                    || b.cell_y != a.cell_y
                    || b.span_x != a.span_x
                    || b.span_y != a.span_y
            })
        })
        .count()
}
