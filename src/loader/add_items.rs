//! Placing newly requested items into the live workspace.
//!
//! Planning is pure: it reads the model, picks ids and cells, and reports
//! what would change. The worker persists the plan and only then commits it
//! to the model, so a failed write leaves the model untouched.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::grid::SpaceFinder;
use crate::model::{
    ComponentName, Container, Item, ItemId, ItemKind, LaunchIntent, LayoutModel, RestoreFlags,
    ScreenId, UserSerial,
};
use crate::store::{PersistedRow, WriteBatch};

/// One item to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequest {
    pub kind: ItemKind,
    pub user: UserSerial,
    pub title: Option<String>,
    pub span_x: u32,
    pub span_y: u32,
    pub restore: RestoreFlags,
}

impl ItemRequest {
    fn with_kind(kind: ItemKind) -> Self {
        Self {
            kind,
            user: UserSerial::PRIMARY,
            title: None,
            span_x: 1,
            span_y: 1,
            restore: RestoreFlags::empty(),
        }
    }

    #[must_use]
    pub fn app(component: ComponentName) -> Self {
        Self::with_kind(ItemKind::Application {
            intent: LaunchIntent::for_component(component),
        })
    }

    #[must_use]
    pub fn shortcut(package: &str, shortcut_id: &str) -> Self {
        Self::with_kind(ItemKind::DeepShortcut {
            intent: LaunchIntent::for_shortcut(package, shortcut_id),
        })
    }

    /// Icon for an app whose install has just started.
    #[must_use]
    pub fn pending(component: ComponentName) -> Self {
        let mut request = Self::with_kind(ItemKind::PendingRestore {
            intent: LaunchIntent::for_component(component),
        });
        request.restore = RestoreFlags::RESTORED_ICON | RestoreFlags::INSTALL_SESSION_ACTIVE;
        request
    }

    #[must_use]
    pub fn widget(widget_id: i64, provider: ComponentName, span_x: u32, span_y: u32) -> Self {
        let mut request = Self::with_kind(ItemKind::AppWidget {
            widget_id,
            provider,
        });
        request.span_x = span_x;
        request.span_y = span_y;
        request
    }

    #[must_use]
    pub const fn with_user(mut self, user: UserSerial) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Key identifying what the item launches. Widgets and folders have none
    /// and are never treated as duplicates.
    fn target_key(&self) -> Option<(UserSerial, String)> {
        target_key(&self.kind).map(|k| (self.user, k))
    }
}

fn target_key(kind: &ItemKind) -> Option<String> {
    match kind {
        ItemKind::Application { intent } | ItemKind::PendingRestore { intent } => intent
            .component
            .as_ref()
            .map(ComponentName::flatten)
            .or_else(|| intent.target_package().map(str::to_string)),
        ItemKind::DeepShortcut { intent } => {
            let package = intent.target_package()?;
            let id = intent.shortcut_id.as_deref()?;
            Some(format!("shortcut:{package}/{id}"))
        }
        ItemKind::Folder | ItemKind::AppWidget { .. } => None,
    }
}

/// Placement decided for a batch of requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedItems {
    /// Screens created for this batch, in allocation order.
    pub new_screens: Vec<ScreenId>,
    /// Items placed on new or previously empty screens.
    pub not_animated: Vec<Item>,
    /// Items placed on screens that already had content.
    pub animated: Vec<Item>,
    /// Requests dropped because the workspace already holds their target.
    pub skipped: usize,
}

impl AddedItems {
    #[must_use]
    pub fn len(&self) -> usize {
        self.not_animated.len() + self.animated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every placed item, ordered by id.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        let mut all: Vec<Item> = self
            .not_animated
            .iter()
            .chain(self.animated.iter())
            .cloned()
            .collect();
        all.sort_by_key(|i| i.id);
        all
    }

    /// Rows to persist before the model changes.
    #[must_use]
    pub fn write_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for item in self.items() {
            batch.upsert(PersistedRow::from_item(&item));
        }
        batch
    }
}

/// Adds a batch of items to the first free cells of the workspace.
#[derive(Debug, Clone, Default)]
pub struct AddWorkspaceItemsTask {
    requests: Vec<ItemRequest>,
}

impl AddWorkspaceItemsTask {
    #[must_use]
    pub const fn new(requests: Vec<ItemRequest>) -> Self {
        Self { requests }
    }

    /// Decide ids and cells without touching the model.
    #[must_use]
    pub fn plan(&self, model: &LayoutModel) -> AddedItems {
        let geometry = model.geometry();
        let screens = model.screens();
        let had_content = model.non_empty_screens();
        let mut finder = SpaceFinder::with_occupancy(geometry, model.build_occupancy());
        let mut seen: Vec<(UserSerial, String)> = model
            .items()
            .filter_map(|i| target_key(&i.kind).map(|k| (i.user, k)))
            .collect();
        let mut next_id = model.max_item_id();
        let mut out = AddedItems::default();

        for request in &self.requests {
            if let Some(key) = request.target_key() {
                if seen.contains(&key) {
                    out.skipped += 1;
                    continue;
                }
                seen.push(key);
            }

            let p = finder.find_space_for_item(
                &screens,
                &mut out.new_screens,
                request.span_x,
                request.span_y,
            );
            next_id += 1;
            let mut item = Item::new(ItemId(next_id), Container::Desktop(p.screen), request.kind.clone())
                .with_cell(p.cell_x, p.cell_y)
                .with_span(p.span_x, p.span_y);
            item.user = request.user;
            item.title.clone_from(&request.title);
            item.restore = request.restore;

            if !p.new_screen && had_content.contains(&p.screen) {
                out.animated.push(item);
            } else {
                out.not_animated.push(item);
            }
        }
        out
    }

    /// Insert a persisted plan into the model.
    pub fn commit(model: &mut LayoutModel, added: &AddedItems) -> Result<()> {
        for item in added.items() {
            model.add_item(item)?;
        }
        Ok(())
    }
}
