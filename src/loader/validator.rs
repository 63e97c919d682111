//! Per-row validation of persisted items against live system state.
//!
//! Rules run in a fixed order and the first one that decides wins:
//!
//! 1. profile gone → delete
//! 2. container or span undecodable → delete
//! 3. icon-like row with no usable intent → delete
//! 4. app installed with the exact activity → accept, clearing restore flags
//! 5. app installed, activity gone → fall back to the package launch intent
//! 6. app not installed but an install session exists → pending restore
//! 7. otherwise → delete
//!
//! Widgets, shortcuts, and folders have their own variants of 4-7.

#![allow(missing_docs)]

use serde::Serialize;

use crate::model::{
    ComponentName, Container, Item, ItemId, ItemKind, LaunchIntent, RestoreFlags, ScreenId,
    UserSerial,
};
use crate::store::{
    CONTAINER_DESKTOP, CONTAINER_HOTSEAT, ITEM_TYPE_APPLICATION, ITEM_TYPE_APPWIDGET,
    ITEM_TYPE_DEEP_SHORTCUT, ITEM_TYPE_FOLDER, PersistedRow,
};

use super::services::SystemServices;

/// Why a row was dropped from the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    ProfileDeleted,
    MissingInfo,
    AppNotInstalled,
    ShortcutNotFound,
    InvalidLocation,
    InvalidType,
    EmptyFolder,
    OrphanedChild,
}

impl DeleteReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProfileDeleted => "profile_deleted",
            Self::MissingInfo => "missing_info",
            Self::AppNotInstalled => "app_not_installed",
            Self::ShortcutNotFound => "shortcut_not_found",
            Self::InvalidLocation => "invalid_location",
            Self::InvalidType => "invalid_type",
            Self::EmptyFolder => "empty_folder",
            Self::OrphanedChild => "orphaned_child",
        }
    }
}

/// An item removed during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedItem {
    pub id: ItemId,
    pub reason: DeleteReason,
}

/// What changed in a repaired row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// Backing package arrived; restore flags cleared.
    RestoreCompleted,
    /// Activity disappeared; intent rewritten to the package default.
    FallbackIntent,
    /// Widget provider readiness changed.
    WidgetRestoreState,
}

impl Repair {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RestoreCompleted => "restore_completed",
            Self::FallbackIntent => "fallback_intent",
            Self::WidgetRestoreState => "widget_restore_state",
        }
    }
}

/// Result of validating one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accept(Item),
    /// Keep the item and persist the changed row immediately.
    Repair { item: Item, repair: Repair },
    Delete(DeletedItem),
}

impl RowOutcome {
    #[must_use]
    pub const fn item(&self) -> Option<&Item> {
        match self {
            Self::Accept(item) | Self::Repair { item, .. } => Some(item),
            Self::Delete(_) => None,
        }
    }
}

/// Row fields that do not depend on the item type.
struct Decoded {
    id: ItemId,
    container: Container,
    cell_x: u32,
    cell_y: u32,
    span_x: u32,
    span_y: u32,
    rank: u32,
    user: UserSerial,
    restore: RestoreFlags,
    title: Option<String>,
}

impl Decoded {
    fn into_item(self, kind: ItemKind) -> Item {
        Item {
            id: self.id,
            container: self.container,
            cell_x: self.cell_x,
            cell_y: self.cell_y,
            span_x: self.span_x,
            span_y: self.span_y,
            rank: self.rank,
            user: self.user,
            restore: self.restore,
            title: self.title,
            kind,
        }
    }
}

/// Applies the validation rules to persisted rows.
pub struct RowValidator<'a> {
    services: &'a dyn SystemServices,
}

impl<'a> RowValidator<'a> {
    #[must_use]
    pub fn new(services: &'a dyn SystemServices) -> Self {
        Self { services }
    }

    /// Decide the fate of one row.
    #[must_use]
    pub fn process(&self, row: &PersistedRow) -> RowOutcome {
        let id = ItemId(row.id);
        let delete = |reason| RowOutcome::Delete(DeletedItem { id, reason });

        let user = UserSerial(row.profile_id);
        if !self.services.profile_exists(user) {
            return delete(DeleteReason::ProfileDeleted);
        }
        let Some(decoded) = decode(row) else {
            return delete(DeleteReason::InvalidLocation);
        };

        match row.item_type {
            ITEM_TYPE_APPLICATION => self.process_app(decoded, row),
            ITEM_TYPE_DEEP_SHORTCUT => self.process_shortcut(decoded, row),
            ITEM_TYPE_FOLDER => {
                if matches!(decoded.container, Container::Folder(_)) {
                    return delete(DeleteReason::InvalidLocation);
                }
                RowOutcome::Accept(decoded.into_item(ItemKind::Folder))
            }
            ITEM_TYPE_APPWIDGET => self.process_widget(decoded, row),
            _ => delete(DeleteReason::InvalidType),
        }
    }

    fn process_app(&self, decoded: Decoded, row: &PersistedRow) -> RowOutcome {
        let id = decoded.id;
        let user = decoded.user;
        let delete = |reason| RowOutcome::Delete(DeletedItem { id, reason });

        let Some(intent) = row.intent.as_deref().and_then(LaunchIntent::parse) else {
            return delete(DeleteReason::MissingInfo);
        };
        let Some(package) = intent.target_package().map(str::to_string) else {
            return delete(DeleteReason::MissingInfo);
        };

        if self.services.is_package_installed(&package, user) {
            let exact = intent
                .component
                .as_ref()
                .is_some_and(|c| self.services.is_activity_enabled(c, user));
            if exact {
                return restored_or_accepted(decoded, ItemKind::Application { intent });
            }
            return match self.services.launch_intent_for_package(&package, user) {
                Some(fallback) => {
                    let mut item = decoded.into_item(ItemKind::Application { intent: fallback });
                    item.restore.remove(RestoreFlags::PENDING);
                    RowOutcome::Repair {
                        item,
                        repair: Repair::FallbackIntent,
                    }
                }
                None => delete(DeleteReason::MissingInfo),
            };
        }

        if self.services.has_install_session(&package, user) {
            return RowOutcome::Accept(decoded.into_item(ItemKind::PendingRestore { intent }));
        }
        delete(DeleteReason::AppNotInstalled)
    }

    fn process_shortcut(&self, decoded: Decoded, row: &PersistedRow) -> RowOutcome {
        let id = decoded.id;
        let user = decoded.user;
        let delete = |reason| RowOutcome::Delete(DeletedItem { id, reason });

        let Some(intent) = row.intent.as_deref().and_then(LaunchIntent::parse) else {
            return delete(DeleteReason::MissingInfo);
        };
        let (Some(package), Some(shortcut_id)) = (
            intent.target_package().map(str::to_string),
            intent.shortcut_id.clone().filter(|s| !s.is_empty()),
        ) else {
            return delete(DeleteReason::MissingInfo);
        };

        if self.services.is_package_installed(&package, user) {
            if self.services.is_shortcut_pinned(&package, &shortcut_id, user) {
                return restored_or_accepted(decoded, ItemKind::DeepShortcut { intent });
            }
            return delete(DeleteReason::ShortcutNotFound);
        }
        if self.services.has_install_session(&package, user) {
            return RowOutcome::Accept(decoded.into_item(ItemKind::DeepShortcut { intent }));
        }
        delete(DeleteReason::AppNotInstalled)
    }

    fn process_widget(&self, decoded: Decoded, row: &PersistedRow) -> RowOutcome {
        let id = decoded.id;
        let user = decoded.user;
        let delete = |reason| RowOutcome::Delete(DeletedItem { id, reason });

        if matches!(decoded.container, Container::Folder(_)) {
            return delete(DeleteReason::InvalidLocation);
        }
        let Some(provider) = row
            .app_widget_provider
            .as_deref()
            .and_then(ComponentName::unflatten)
        else {
            return delete(DeleteReason::MissingInfo);
        };
        let kind = ItemKind::AppWidget {
            widget_id: row.app_widget_id,
            provider: provider.clone(),
        };
        let restoring = RestoreFlags::PROVIDER_NOT_READY | RestoreFlags::RESTORE_STARTED;

        if self.services.is_widget_provider_ready(&provider, user) {
            let was_restoring = decoded.restore.intersects(restoring);
            let mut item = decoded.into_item(kind);
            if was_restoring {
                item.restore.remove(restoring);
                return RowOutcome::Repair {
                    item,
                    repair: Repair::WidgetRestoreState,
                };
            }
            return RowOutcome::Accept(item);
        }

        if self.services.has_install_session(&provider.package, user) {
            let already = decoded.restore.contains(restoring);
            let mut item = decoded.into_item(kind);
            if already {
                return RowOutcome::Accept(item);
            }
            item.restore.insert(restoring);
            return RowOutcome::Repair {
                item,
                repair: Repair::WidgetRestoreState,
            };
        }
        delete(DeleteReason::AppNotInstalled)
    }
}

/// Accept an item whose target is present, clearing any pending flags.
fn restored_or_accepted(decoded: Decoded, kind: ItemKind) -> RowOutcome {
    let pending = decoded.restore.is_pending();
    let mut item = decoded.into_item(kind);
    if pending {
        item.restore.remove(RestoreFlags::PENDING);
        return RowOutcome::Repair {
            item,
            repair: Repair::RestoreCompleted,
        };
    }
    RowOutcome::Accept(item)
}

fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

/// Decode container, cell, and span. `None` means the location is invalid.
fn decode(row: &PersistedRow) -> Option<Decoded> {
    let span_x = positive(row.span_x)?;
    let span_y = positive(row.span_y)?;
    let (container, cell_x, cell_y, rank) = match row.container {
        CONTAINER_DESKTOP => {
            let screen = u32::try_from(row.screen).ok()?;
            (
                Container::Desktop(ScreenId(screen)),
                u32::try_from(row.cell_x).ok()?,
                u32::try_from(row.cell_y).ok()?,
                0,
            )
        }
        CONTAINER_HOTSEAT => {
            let slot = u32::try_from(row.screen).ok()?;
            (Container::Hotseat(slot), 0, 0, slot)
        }
        folder if folder > 0 => (
            Container::Folder(ItemId(folder)),
            0,
            0,
            u32::try_from(row.rank).unwrap_or(0),
        ),
        _ => return None,
    };
    Some(Decoded {
        id: ItemId(row.id),
        container,
        cell_x,
        cell_y,
        span_x,
        span_y,
        rank,
        user: UserSerial(row.profile_id),
        restore: RestoreFlags::from_bits_truncate(u32::try_from(row.restored).unwrap_or(0)),
        title: row.title.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::services::StaticServices;

    fn mail() -> ComponentName {
        ComponentName::new("com.mail", "com.mail.Inbox")
    }

    fn app_row(id: i64, intent: Option<&str>) -> PersistedRow {
        PersistedRow {
            id,
            intent: intent.map(str::to_string),
            ..PersistedRow::default()
        }
    }

    fn mail_row(id: i64) -> PersistedRow {
        app_row(id, Some("#Intent;component=com.mail/.Inbox;end"))
    }

    fn reason(outcome: &RowOutcome) -> Option<DeleteReason> {
        match outcome {
            RowOutcome::Delete(d) => Some(d.reason),
            _ => None,
        }
    }

    #[test]
    fn installed_app_is_accepted() {
        let services = StaticServices::new().with_app(mail(), UserSerial::PRIMARY);
        let outcome = RowValidator::new(&services).process(&mail_row(1));
        let RowOutcome::Accept(item) = outcome else {
            panic!("expected accept, got {outcome:?}");
        };
        assert_eq!(item.kind.package(), Some("com.mail"));
        assert_eq!(item.container, Container::Desktop(ScreenId(0)));
    }

    #[test]
    fn profile_check_runs_before_everything_else() {
        let services = StaticServices::new();
        let mut row = app_row(1, None);
        row.profile_id = 10;
        row.item_type = 99;
        let outcome = RowValidator::new(&services).process(&row);
        assert_eq!(reason(&outcome), Some(DeleteReason::ProfileDeleted));
    }

    #[test]
    fn missing_or_empty_intent_is_missing_info() {
        let services = StaticServices::permissive();
        let validator = RowValidator::new(&services);
        assert_eq!(
            reason(&validator.process(&app_row(1, None))),
            Some(DeleteReason::MissingInfo)
        );
        assert_eq!(
            reason(&validator.process(&app_row(2, Some("#Intent;package=;end")))),
            Some(DeleteReason::MissingInfo)
        );
        assert_eq!(
            reason(&validator.process(&app_row(3, Some("not an intent")))),
            Some(DeleteReason::MissingInfo)
        );
    }

    #[test]
    fn missing_activity_falls_back_to_launch_intent() {
        let main = ComponentName::new("com.mail", "com.mail.Main");
        let services = StaticServices::new().with_app(main.clone(), UserSerial::PRIMARY);
        let outcome = RowValidator::new(&services).process(&mail_row(4));
        let RowOutcome::Repair { item, repair } = outcome else {
            panic!("expected repair, got {outcome:?}");
        };
        assert_eq!(repair, Repair::FallbackIntent);
        assert_eq!(
            item.kind.intent().and_then(|i| i.component.clone()),
            Some(main)
        );
    }

    #[test]
    fn installed_package_without_launcher_activity_is_deleted() {
        let services = StaticServices::new().with_package("com.mail", UserSerial::PRIMARY);
        let outcome = RowValidator::new(&services).process(&mail_row(4));
        assert_eq!(reason(&outcome), Some(DeleteReason::MissingInfo));
    }

    #[test]
    fn uninstalled_app_with_session_is_pending() {
        let services =
            StaticServices::new().with_session("com.mail", "com.store", UserSerial::PRIMARY);
        let outcome = RowValidator::new(&services).process(&mail_row(5));
        let RowOutcome::Accept(item) = outcome else {
            panic!("expected accept, got {outcome:?}");
        };
        assert!(matches!(item.kind, ItemKind::PendingRestore { .. }));
    }

    #[test]
    fn uninstalled_app_without_session_is_deleted() {
        let services = StaticServices::new();
        let outcome = RowValidator::new(&services).process(&mail_row(6));
        assert_eq!(reason(&outcome), Some(DeleteReason::AppNotInstalled));
    }

    #[test]
    fn restored_app_clears_pending_flags() {
        let services = StaticServices::new().with_app(mail(), UserSerial::PRIMARY);
        let mut row = mail_row(7);
        row.restored = i64::from(RestoreFlags::RESTORED_ICON.bits());
        let outcome = RowValidator::new(&services).process(&row);
        let RowOutcome::Repair { item, repair } = outcome else {
            panic!("expected repair, got {outcome:?}");
        };
        assert_eq!(repair, Repair::RestoreCompleted);
        assert!(item.restore.is_empty());
    }

    #[test]
    fn bad_container_and_span_are_invalid_location() {
        let services = StaticServices::permissive();
        let validator = RowValidator::new(&services);
        let mut row = mail_row(8);
        row.container = -5;
        assert_eq!(
            reason(&validator.process(&row)),
            Some(DeleteReason::InvalidLocation)
        );
        let mut row = mail_row(9);
        row.span_x = 0;
        assert_eq!(
            reason(&validator.process(&row)),
            Some(DeleteReason::InvalidLocation)
        );
        let mut row = mail_row(10);
        row.cell_x = -1;
        assert_eq!(
            reason(&validator.process(&row)),
            Some(DeleteReason::InvalidLocation)
        );
    }

    #[test]
    fn unknown_type_is_invalid_type() {
        let services = StaticServices::permissive();
        let mut row = mail_row(11);
        row.item_type = 42;
        assert_eq!(
            reason(&RowValidator::new(&services).process(&row)),
            Some(DeleteReason::InvalidType)
        );
    }

    #[test]
    fn unpinned_shortcut_is_not_found() {
        let services = StaticServices::new()
            .with_package("com.chat", UserSerial::PRIMARY)
            .with_pinned_shortcut("com.chat", "s1", UserSerial::PRIMARY);
        let validator = RowValidator::new(&services);
        let mut pinned = app_row(12, Some("#Intent;package=com.chat;shortcutId=s1;end"));
        pinned.item_type = ITEM_TYPE_DEEP_SHORTCUT;
        assert!(matches!(validator.process(&pinned), RowOutcome::Accept(_)));

        let mut gone = app_row(13, Some("#Intent;package=com.chat;shortcutId=s2;end"));
        gone.item_type = ITEM_TYPE_DEEP_SHORTCUT;
        assert_eq!(
            reason(&validator.process(&gone)),
            Some(DeleteReason::ShortcutNotFound)
        );
    }

    #[test]
    fn widget_provider_states() {
        let clock = ComponentName::new("com.clock", "com.clock.Widget");
        let mut row = PersistedRow {
            id: 14,
            item_type: ITEM_TYPE_APPWIDGET,
            span_x: 2,
            span_y: 2,
            app_widget_id: 3,
            app_widget_provider: Some(clock.flatten()),
            ..PersistedRow::default()
        };

        let ready = StaticServices::new().with_widget_provider(clock.clone(), UserSerial::PRIMARY);
        assert!(matches!(
            RowValidator::new(&ready).process(&row),
            RowOutcome::Accept(_)
        ));

        let installing =
            StaticServices::new().with_session("com.clock", "com.store", UserSerial::PRIMARY);
        let outcome = RowValidator::new(&installing).process(&row);
        let RowOutcome::Repair { item, .. } = outcome else {
            panic!("expected repair, got {outcome:?}");
        };
        assert!(item.restore.contains(RestoreFlags::PROVIDER_NOT_READY));

        row.restored = i64::from(item.restore.bits());
        let outcome = RowValidator::new(&ready).process(&row);
        let RowOutcome::Repair { item, .. } = outcome else {
            panic!("expected repair, got {outcome:?}");
        };
        assert!(item.restore.is_empty());

        assert_eq!(
            reason(&RowValidator::new(&StaticServices::new()).process(&row)),
            Some(DeleteReason::AppNotInstalled)
        );
    }

    #[test]
    fn folders_cannot_nest() {
        let services = StaticServices::permissive();
        let row = PersistedRow {
            id: 15,
            container: 3,
            item_type: ITEM_TYPE_FOLDER,
            ..PersistedRow::default()
        };
        assert_eq!(
            reason(&RowValidator::new(&services).process(&row)),
            Some(DeleteReason::InvalidLocation)
        );
    }
}
