//! Cross-item placement checks run after per-row validation.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};

use crate::grid::{GridGeometry, GridOccupancy};
use crate::model::{Container, Item, ItemId, ScreenId};

use super::validator::{DeleteReason, DeletedItem};

/// Items that survived placement and the ones that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub kept: Vec<Item>,
    pub deleted: Vec<DeletedItem>,
}

/// Resolve conflicts between accepted items.
///
/// Items are visited in id order, so when two desktop items overlap or two
/// items claim the same hotseat slot the older one wins. Folder children
/// whose folder did not survive are orphans, and folders left with no
/// children are removed.
#[must_use]
pub fn check_placement(mut items: Vec<Item>, geometry: &GridGeometry) -> PlacementReport {
    items.sort_by_key(|i| i.id);
    let mut report = PlacementReport::default();
    let mut occupancy: HashMap<ScreenId, GridOccupancy> = HashMap::new();
    let mut slots = HashSet::new();
    let mut children = Vec::new();

    for item in items {
        let ok = match item.container {
            Container::Desktop(screen) => {
                let occ = occupancy
                    .entry(screen)
                    .or_insert_with(|| GridOccupancy::new(geometry.columns, geometry.rows));
                let fits = item.fits(geometry)
                    && occ.is_region_vacant(item.cell_x, item.cell_y, item.span_x, item.span_y);
                if fits {
                    occ.mark_cells(item.cell_x, item.cell_y, item.span_x, item.span_y, true);
                }
                fits
            }
            Container::Hotseat(slot) => slot < geometry.hotseat_slots && slots.insert(slot),
            Container::Folder(_) => {
                children.push(item);
                continue;
            }
        };
        if ok {
            report.kept.push(item);
        } else {
            report.deleted.push(DeletedItem {
                id: item.id,
                reason: DeleteReason::InvalidLocation,
            });
        }
    }

    let folders: HashSet<ItemId> = report
        .kept
        .iter()
        .filter(|i| i.is_folder())
        .map(|i| i.id)
        .collect();
    let mut populated = HashSet::new();
    for child in children {
        match child.folder() {
            Some(folder) if folders.contains(&folder) => {
                populated.insert(folder);
                report.kept.push(child);
            }
            _ => report.deleted.push(DeletedItem {
                id: child.id,
                reason: DeleteReason::OrphanedChild,
            }),
        }
    }

    let mut kept = Vec::with_capacity(report.kept.len());
    for item in report.kept {
        if item.is_folder() && !populated.contains(&item.id) {
            report.deleted.push(DeletedItem {
                id: item.id,
                reason: DeleteReason::EmptyFolder,
            });
        } else {
            kept.push(item);
        }
    }
    kept.sort_by_key(|i| i.id);
    report.kept = kept;
    report
}
