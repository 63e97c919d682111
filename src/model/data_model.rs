//! Authoritative in-memory workspace: items, folders, screens, id allocation.
//!
//! Occupancy is never stored here. Callers that need it ask for a fresh
//! [`LayoutModel::build_occupancy`] which is derived from the current items.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::errors::{HslError, Result};
use crate::grid::{GridGeometry, GridOccupancy};
use crate::model::item::{Container, Item, ItemId, ScreenId};

/// The workspace model. Only the loader worker mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutModel {
    geometry: GridGeometry,
    items: BTreeMap<ItemId, Item>,
    max_item_id: i64,
}

impl LayoutModel {
    /// Empty model for a geometry.
    #[must_use]
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            items: BTreeMap::new(),
            max_item_id: 0,
        }
    }

    /// Build a model from a complete item set, rejecting any set that breaks
    /// the layout invariants.
    pub fn from_items(geometry: GridGeometry, items: Vec<Item>) -> Result<Self> {
        check_invariants(&items, &geometry)?;
        let max_item_id = items.iter().map(|i| i.id.0).max().unwrap_or(0);
        Ok(Self {
            geometry,
            items: items.into_iter().map(|i| (i.id, i)).collect(),
            max_item_id,
        })
    }

    #[must_use]
    pub const fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// All items ordered by id.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Owned copy of every item, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    /// Raise the id high-water mark, e.g. to the largest id ever persisted.
    pub fn seed_max_item_id(&mut self, max_id: i64) {
        self.max_item_id = self.max_item_id.max(max_id);
    }

    #[must_use]
    pub const fn max_item_id(&self) -> i64 {
        self.max_item_id
    }

    /// Allocate a fresh id. Ids are never handed out twice.
    pub fn allocate_item_id(&mut self) -> ItemId {
        self.max_item_id += 1;
        ItemId(self.max_item_id)
    }

    /// Insert one item after checking it against the current contents.
    pub fn add_item(&mut self, item: Item) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(HslError::integrity(format!("duplicate item id {}", item.id)));
        }
        match item.container {
            Container::Desktop(_) => {
                if !item.fits(&self.geometry) {
                    return Err(HslError::integrity(format!(
                        "item {} at ({}, {}) span {}x{} exceeds grid {}",
                        item.id, item.cell_x, item.cell_y, item.span_x, item.span_y, self.geometry
                    )));
                }
                if let Some(other) = self.items.values().find(|o| o.overlaps(&item)) {
                    return Err(HslError::integrity(format!(
                        "item {} overlaps item {}",
                        item.id, other.id
                    )));
                }
            }
            Container::Hotseat(slot) => {
                if slot >= self.geometry.hotseat_slots {
                    return Err(HslError::integrity(format!(
                        "hotseat slot {slot} out of range for item {}",
                        item.id
                    )));
                }
                if self.items.values().any(|o| o.hotseat_slot() == Some(slot)) {
                    return Err(HslError::integrity(format!(
                        "hotseat slot {slot} already taken"
                    )));
                }
            }
            Container::Folder(folder_id) => {
                if item.is_folder() {
                    return Err(HslError::integrity(format!(
                        "folder {} cannot be nested",
                        item.id
                    )));
                }
                if !self.get(folder_id).is_some_and(Item::is_folder) {
                    return Err(HslError::integrity(format!(
                        "item {} references missing folder {folder_id}",
                        item.id
                    )));
                }
            }
        }
        self.max_item_id = self.max_item_id.max(item.id.0);
        self.items.insert(item.id, item);
        Ok(())
    }

    /// Remove an item. Removing a folder also removes its children.
    ///
    /// Returns every removed item, the requested one first.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Vec<Item>> {
        let item = self
            .items
            .remove(&id)
            .ok_or(HslError::UnknownItem { id: id.0 })?;
        let mut removed = vec![item];
        if removed[0].is_folder() {
            let children: Vec<ItemId> = self.folder_children(id).iter().map(|c| c.id).collect();
            for child in children {
                if let Some(c) = self.items.remove(&child) {
                    removed.push(c);
                }
            }
        }
        Ok(removed)
    }

    /// Replace the whole item set, e.g. after a grid migration.
    pub fn replace_all(&mut self, geometry: GridGeometry, items: Vec<Item>) -> Result<()> {
        let max_id = self.max_item_id;
        *self = Self::from_items(geometry, items)?;
        self.seed_max_item_id(max_id);
        Ok(())
    }

    /// Drop every item, keeping the id high-water mark.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items on one desktop screen, in reading order.
    #[must_use]
    pub fn desktop_items(&self, screen: ScreenId) -> Vec<&Item> {
        let mut out: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.screen() == Some(screen))
            .collect();
        out.sort_by_key(|i| (i.cell_y, i.cell_x, i.id));
        out
    }

    /// Hotseat items ordered by slot.
    #[must_use]
    pub fn hotseat_items(&self) -> Vec<&Item> {
        let mut out: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.hotseat_slot().is_some())
            .collect();
        out.sort_by_key(|i| (i.hotseat_slot(), i.id));
        out
    }

    /// Children of a folder ordered by rank.
    #[must_use]
    pub fn folder_children(&self, folder: ItemId) -> Vec<&Item> {
        let mut out: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.folder() == Some(folder))
            .collect();
        out.sort_by_key(|i| (i.rank, i.id));
        out
    }

    /// Ordered screen list. Screen 0 is always present.
    #[must_use]
    pub fn screens(&self) -> Vec<ScreenId> {
        let mut screens: BTreeSet<ScreenId> =
            self.items.values().filter_map(Item::screen).collect();
        screens.insert(ScreenId(0));
        screens.into_iter().collect()
    }

    /// Screens that hold at least one item.
    #[must_use]
    pub fn non_empty_screens(&self) -> BTreeSet<ScreenId> {
        self.items.values().filter_map(Item::screen).collect()
    }

    /// Fresh occupancy for every non-empty screen.
    #[must_use]
    pub fn build_occupancy(&self) -> HashMap<ScreenId, GridOccupancy> {
        build_occupancy(self.items.values(), &self.geometry)
    }

    /// Re-verify all layout invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let items: Vec<Item> = self.snapshot();
        check_invariants(&items, &self.geometry)
    }
}

/// Occupancy for the desktop items in `items`, keyed by screen.
pub fn build_occupancy<'a>(
    items: impl IntoIterator<Item = &'a Item>,
    geometry: &GridGeometry,
) -> HashMap<ScreenId, GridOccupancy> {
    let mut out: HashMap<ScreenId, GridOccupancy> = HashMap::new();
    for item in items {
        if let Some(screen) = item.screen() {
            out.entry(screen)
                .or_insert_with(|| GridOccupancy::new(geometry.columns, geometry.rows))
                .mark_cells(item.cell_x, item.cell_y, item.span_x, item.span_y, true);
        }
    }
    out
}

/// Validate an item set against `geometry`.
///
/// Checks unique ids, in-bounds non-overlapping desktop rectangles, unique
/// in-range hotseat slots, and folder children pointing at real, non-nested
/// folders.
pub fn check_invariants(items: &[Item], geometry: &GridGeometry) -> Result<()> {
    let mut ids = HashSet::with_capacity(items.len());
    let mut slots = HashSet::new();
    let folders: HashSet<ItemId> = items.iter().filter(|i| i.is_folder()).map(|i| i.id).collect();
    let mut occupancy: HashMap<ScreenId, GridOccupancy> = HashMap::new();

    for item in items {
        if !ids.insert(item.id) {
            return Err(HslError::integrity(format!("duplicate item id {}", item.id)));
        }
        match item.container {
            Container::Desktop(screen) => {
                if !item.fits(geometry) {
                    return Err(HslError::integrity(format!(
                        "item {} at ({}, {}) span {}x{} exceeds grid {geometry}",
                        item.id, item.cell_x, item.cell_y, item.span_x, item.span_y
                    )));
                }
                let occ = occupancy
                    .entry(screen)
                    .or_insert_with(|| GridOccupancy::new(geometry.columns, geometry.rows));
                if !occ.is_region_vacant(item.cell_x, item.cell_y, item.span_x, item.span_y) {
                    return Err(HslError::integrity(format!(
                        "item {} overlaps another item on screen {screen}",
                        item.id
                    )));
                }
                occ.mark_cells(item.cell_x, item.cell_y, item.span_x, item.span_y, true);
            }
            Container::Hotseat(slot) => {
                if slot >= geometry.hotseat_slots || !slots.insert(slot) {
                    return Err(HslError::integrity(format!(
                        "hotseat slot {slot} of item {} is out of range or duplicated",
                        item.id
                    )));
                }
            }
            Container::Folder(folder) => {
                if item.is_folder() || !folders.contains(&folder) {
                    return Err(HslError::integrity(format!(
                        "item {} has invalid folder container {folder}",
                        item.id
                    )));
                }
            }
        }
    }
    Ok(())
}
