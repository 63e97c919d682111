//! Per-installer summary of what landed on the first screen after a load.
//!
//! Each installer that has pending installs, installed first-screen items, or
//! widgets anywhere in the workspace gets one payload naming the packages in
//! each category.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::{Container, Item, ItemId, ScreenId, UserSerial};

use super::services::SystemServices;

/// Packages an installer cares about, grouped by where they ended up.
///
/// Every category keeps insertion order and holds each package once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirstScreenBroadcast {
    pub installer: String,
    pub pending_collection: Vec<String>,
    pub pending_workspace: Vec<String>,
    pub pending_hotseat: Vec<String>,
    pub pending_widget: Vec<String>,
    pub installed_workspace: Vec<String>,
    pub installed_hotseat: Vec<String>,
    pub first_screen_widgets: Vec<String>,
    pub secondary_widgets: Vec<String>,
}

fn push_unique(set: &mut Vec<String>, package: &str) {
    if !set.iter().any(|p| p == package) {
        set.push(package.to_string());
    }
}

impl FirstScreenBroadcast {
    fn new(installer: &str) -> Self {
        Self {
            installer: installer.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.pending_collection.len()
            + self.pending_workspace.len()
            + self.pending_hotseat.len()
            + self.pending_widget.len()
            + self.installed_workspace.len()
            + self.installed_hotseat.len()
            + self.first_screen_widgets.len()
            + self.secondary_widgets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    /// Drop entries until at most `max_items` remain.
    ///
    /// Categories give way in a fixed priority, least important first, and
    /// each loses its most recently added package first.
    pub fn truncate(&mut self, max_items: usize) {
        let mut excess = self.total_items().saturating_sub(max_items);
        let order: [&mut Vec<String>; 8] = [
            &mut self.pending_collection,
            &mut self.pending_hotseat,
            &mut self.installed_hotseat,
            &mut self.secondary_widgets,
            &mut self.pending_widget,
            &mut self.first_screen_widgets,
            &mut self.pending_workspace,
            &mut self.installed_workspace,
        ];
        for category in order {
            while excess > 0 && category.pop().is_some() {
                excess -= 1;
            }
        }
    }
}

/// Build one payload per installer.
///
/// `items` is the whole workspace. Only primary-profile install sessions are
/// considered. Payloads are ordered by installer package.
#[must_use]
pub fn build_payloads(
    items: &[Item],
    first_screen: ScreenId,
    services: &dyn SystemServices,
    max_items: usize,
) -> Vec<FirstScreenBroadcast> {
    let mut pending: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    for session in services.install_sessions() {
        if session.user != UserSerial::PRIMARY
            || session.package.is_empty()
            || session.installer.is_empty()
        {
            continue;
        }
        pending
            .entry(session.installer)
            .or_default()
            .insert(session.package);
    }
    let installing: HashSet<&str> = pending
        .values()
        .flat_map(|set| set.iter().map(String::as_str))
        .collect();

    let on_first_screen = |item: &Item| match item.container {
        Container::Desktop(screen) => screen == first_screen,
        Container::Hotseat(_) => true,
        Container::Folder(_) => false,
    };
    let first_screen_items: Vec<&Item> = items.iter().filter(|&i| on_first_screen(i)).collect();

    let mut payloads: BTreeMap<String, FirstScreenBroadcast> = BTreeMap::new();

    // Pending installs on the first screen, including inside first-screen folders.
    for (installer, packages) in &pending {
        let entry = payload_for(&mut payloads, installer);
        for item in &first_screen_items {
            if item.is_folder() {
                for child in folder_children(items, item.id) {
                    if let Some(package) = child.kind.package()
                        && packages.contains(package)
                    {
                        push_unique(&mut entry.pending_collection, package);
                    }
                }
                continue;
            }
            let Some(package) = item.kind.package() else {
                continue;
            };
            if !packages.contains(package) {
                continue;
            }
            if item.is_widget() {
                push_unique(&mut entry.pending_widget, package);
            } else if item.hotseat_slot().is_some() {
                push_unique(&mut entry.pending_hotseat, package);
            } else {
                push_unique(&mut entry.pending_workspace, package);
            }
        }
    }

    // Installed icons on the first screen.
    for item in &first_screen_items {
        if item.is_widget() {
            continue;
        }
        let Some(package) = item.kind.package() else {
            continue;
        };
        if installing.contains(package) {
            continue;
        }
        let Some(installer) = services.installer_package(package).filter(|i| !i.is_empty())
        else {
            continue;
        };
        let entry = payload_for(&mut payloads, &installer);
        if item.hotseat_slot().is_some() {
            push_unique(&mut entry.installed_hotseat, package);
        } else {
            push_unique(&mut entry.installed_workspace, package);
        }
    }

    // Installed widgets anywhere, first screen first.
    let mut widgets: Vec<&Item> = items
        .iter()
        .filter(|i| i.is_widget() && i.screen().is_some())
        .collect();
    widgets.sort_by_key(|i| (i.screen(), i.id));
    for widget in widgets {
        let Some(package) = widget.kind.package() else {
            continue;
        };
        if installing.contains(package) {
            continue;
        }
        let Some(installer) = services.installer_package(package).filter(|i| !i.is_empty())
        else {
            continue;
        };
        let entry = payload_for(&mut payloads, &installer);
        if widget.screen() == Some(first_screen) {
            push_unique(&mut entry.first_screen_widgets, package);
        } else {
            push_unique(&mut entry.secondary_widgets, package);
        }
    }

    payloads
        .into_values()
        .filter(|p| !p.is_empty())
        .map(|mut p| {
            p.truncate(max_items);
            p
        })
        .collect()
}

fn payload_for<'m>(
    payloads: &'m mut BTreeMap<String, FirstScreenBroadcast>,
    installer: &str,
) -> &'m mut FirstScreenBroadcast {
    payloads
        .entry(installer.to_string())
        .or_insert_with(|| FirstScreenBroadcast::new(installer))
}

fn folder_children(items: &[Item], folder: ItemId) -> impl Iterator<Item = &Item> {
    let mut children: Vec<&Item> = items.iter().filter(|i| i.folder() == Some(folder)).collect();
    children.sort_by_key(|i| (i.rank, i.id));
    children.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::services::StaticServices;
    use crate::model::{ComponentName, ItemKind, LaunchIntent};

    fn app(id: i64, container: Container, package: &str) -> Item {
        Item::new(
            ItemId(id),
            container,
            ItemKind::Application {
                intent: LaunchIntent::for_component(ComponentName::new(package, "Main")),
            },
        )
    }

    fn widget(id: i64, screen: u32, package: &str) -> Item {
        Item::new(
            ItemId(id),
            Container::Desktop(ScreenId(screen)),
            ItemKind::AppWidget {
                widget_id: id,
                provider: ComponentName::new(package, "Widget"),
            },
        )
        .with_span(2, 2)
    }

    #[test]
    fn categorizes_pending_and_installed_items() {
        let items = vec![
            app(1, Container::Desktop(ScreenId(0)), "com.new"),
            app(2, Container::Hotseat(0), "com.dial"),
            app(3, Container::Desktop(ScreenId(0)), "com.mail"),
            Item::new(ItemId(4), Container::Desktop(ScreenId(0)), ItemKind::Folder),
            app(5, Container::Folder(ItemId(4)), "com.game"),
            widget(6, 0, "com.clock"),
            widget(7, 1, "com.weather"),
            app(8, Container::Desktop(ScreenId(1)), "com.far"),
        ];
        let services = StaticServices::new()
            .with_session("com.new", "com.store", UserSerial::PRIMARY)
            .with_session("com.game", "com.store", UserSerial::PRIMARY)
            .with_installer("com.dial", "com.store")
            .with_installer("com.mail", "com.store")
            .with_installer("com.clock", "com.store")
            .with_installer("com.weather", "com.store")
            .with_installer("com.far", "com.store");

        let payloads = build_payloads(&items, ScreenId(0), &services, 70);
        assert_eq!(payloads.len(), 1);
        let p = &payloads[0];
        assert_eq!(p.installer, "com.store");
        assert_eq!(p.pending_workspace, vec!["com.new"]);
        assert_eq!(p.pending_collection, vec!["com.game"]);
        assert_eq!(p.installed_hotseat, vec!["com.dial"]);
        assert_eq!(p.installed_workspace, vec!["com.mail"]);
        assert_eq!(p.first_screen_widgets, vec!["com.clock"]);
        assert_eq!(p.secondary_widgets, vec!["com.weather"]);
        assert!(p.pending_hotseat.is_empty());
    }

    #[test]
    fn work_profile_sessions_are_ignored() {
        let items = vec![app(1, Container::Desktop(ScreenId(0)), "com.new")];
        let services = StaticServices::new().with_session("com.new", "com.store", UserSerial(10));
        assert!(build_payloads(&items, ScreenId(0), &services, 70).is_empty());
    }

    #[test]
    fn truncate_drops_low_priority_categories_first() {
        let mut p = FirstScreenBroadcast {
            installer: "com.store".to_string(),
            pending_collection: vec!["a".into(), "b".into()],
            pending_hotseat: vec!["c".into()],
            installed_workspace: vec!["d".into(), "e".into()],
            ..FirstScreenBroadcast::default()
        };
        p.truncate(3);
        assert!(p.pending_collection.is_empty());
        assert_eq!(p.pending_hotseat, vec!["c"]);
        assert_eq!(p.total_items(), 3);

        p.truncate(1);
        assert!(p.pending_hotseat.is_empty());
        assert_eq!(p.installed_workspace, vec!["d"]);
    }

    #[test]
    fn packages_are_listed_once() {
        let items = vec![
            app(1, Container::Desktop(ScreenId(0)), "com.mail"),
            app(2, Container::Desktop(ScreenId(0)), "com.mail").with_cell(1, 0),
        ];
        let services = StaticServices::new().with_installer("com.mail", "com.store");
        let payloads = build_payloads(&items, ScreenId(0), &services, 70);
        assert_eq!(payloads[0].installed_workspace, vec!["com.mail"]);
    }
}
