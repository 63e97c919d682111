//! Placed workspace items and their identifiers.

#![allow(missing_docs)]

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::grid::GridGeometry;

/// Model-wide unique item id, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

/// Stable desktop screen id. Screens are ordered by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(pub u32);

/// Serial number of the user profile an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSerial(pub i64);

impl UserSerial {
    /// The primary profile.
    pub const PRIMARY: Self = Self(0);
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an item lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Desktop(ScreenId),
    Hotseat(u32),
    Folder(ItemId),
}

bitflags! {
    /// Restore state carried by an item row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RestoreFlags: u32 {
        /// Backing app is expected from an install session.
        const RESTORED_ICON = 1;
        const AUTOINSTALL_ICON = 2;
        const INSTALL_SESSION_ACTIVE = 4;
        /// Widget provider is not installed yet.
        const PROVIDER_NOT_READY = 8;
        const RESTORE_STARTED = 16;
        const NOT_AVAILABLE = 32;
        const SAFE_MODE = 64;
    }
}

impl RestoreFlags {
    /// Flags that mark an app item as waiting for its package.
    pub const PENDING: Self = Self::RESTORED_ICON
        .union(Self::AUTOINSTALL_ICON)
        .union(Self::INSTALL_SESSION_ACTIVE);

    /// Whether any pending-install flag is set.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.intersects(Self::PENDING)
    }
}

/// `package/class` pair identifying one activity or widget provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    #[must_use]
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// Parse `pkg/cls`; a class starting with `.` is relative to the package.
    #[must_use]
    pub fn unflatten(raw: &str) -> Option<Self> {
        let (package, class) = raw.split_once('/')?;
        if package.is_empty() || class.is_empty() {
            return None;
        }
        let class = if class.starts_with('.') {
            format!("{package}{class}")
        } else {
            class.to_string()
        };
        Some(Self::new(package, class))
    }

    #[must_use]
    pub fn flatten(&self) -> String {
        format!("{}/{}", self.package, self.class)
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flatten())
    }
}

/// Launch reference stored in the intent column.
///
/// Persisted as `#Intent;component=pkg/cls;package=pkg;shortcutId=id;end`.
/// Keys this type does not model are preserved verbatim, repeats and order
/// included.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchIntent {
    pub component: Option<ComponentName>,
    pub package: Option<String>,
    pub shortcut_id: Option<String>,
    pub extras: Vec<(String, String)>,
}

impl LaunchIntent {
    /// Intent that launches a specific activity.
    #[must_use]
    pub fn for_component(component: ComponentName) -> Self {
        Self {
            component: Some(component),
            ..Self::default()
        }
    }

    /// Intent for a pinned deep shortcut.
    #[must_use]
    pub fn for_shortcut(package: impl Into<String>, shortcut_id: impl Into<String>) -> Self {
        Self {
            package: Some(package.into()),
            shortcut_id: Some(shortcut_id.into()),
            ..Self::default()
        }
    }

    /// Parse the persisted form. Returns `None` for anything that is not an
    /// intent URI.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw.trim().strip_prefix("#Intent;")?;
        let body = body.strip_suffix("end")?;
        let mut intent = Self::default();
        for part in body.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=')?;
            match key {
                "component" => intent.component = Some(ComponentName::unflatten(value)?),
                "package" => intent.package = Some(value.to_string()),
                "shortcutId" => intent.shortcut_id = Some(value.to_string()),
                other => {
                    intent.extras.push((other.to_string(), value.to_string()));
                }
            }
        }
        Some(intent)
    }

    /// Serialize back to the persisted form.
    #[must_use]
    pub fn to_uri(&self) -> String {
        let mut out = String::from("#Intent;");
        if let Some(component) = &self.component {
            out.push_str(&format!("component={};", component.flatten()));
        }
        if let Some(package) = &self.package {
            out.push_str(&format!("package={package};"));
        }
        if let Some(id) = &self.shortcut_id {
            out.push_str(&format!("shortcutId={id};"));
        }
        for (key, value) in &self.extras {
            out.push_str(&format!("{key}={value};"));
        }
        out.push_str("end");
        out
    }

    /// First value stored under an unmodelled key.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Package the intent resolves to: component package first, then the
    /// explicit package. Empty strings count as missing.
    #[must_use]
    pub fn target_package(&self) -> Option<&str> {
        self.component
            .as_ref()
            .map(|c| c.package.as_str())
            .or(self.package.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// Kind-specific payload of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Application { intent: LaunchIntent },
    DeepShortcut { intent: LaunchIntent },
    Folder,
    AppWidget { widget_id: i64, provider: ComponentName },
    /// App whose package is still being installed.
    PendingRestore { intent: LaunchIntent },
}

impl ItemKind {
    /// Launch intent for icon-like kinds.
    #[must_use]
    pub const fn intent(&self) -> Option<&LaunchIntent> {
        match self {
            Self::Application { intent }
            | Self::DeepShortcut { intent }
            | Self::PendingRestore { intent } => Some(intent),
            Self::Folder | Self::AppWidget { .. } => None,
        }
    }

    /// Package this item depends on.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::Application { intent }
            | Self::DeepShortcut { intent }
            | Self::PendingRestore { intent } => intent.target_package(),
            Self::AppWidget { provider, .. } => Some(provider.package.as_str()),
            Self::Folder => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Application { .. } => "application",
            Self::DeepShortcut { .. } => "deep_shortcut",
            Self::Folder => "folder",
            Self::AppWidget { .. } => "app_widget",
            Self::PendingRestore { .. } => "pending_restore",
        }
    }
}

/// A placed entity in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub container: Container,
    /// Desktop only.
    pub cell_x: u32,
    pub cell_y: u32,
    pub span_x: u32,
    pub span_y: u32,
    /// Order inside the hotseat or a folder.
    pub rank: u32,
    pub user: UserSerial,
    pub restore: RestoreFlags,
    pub title: Option<String>,
    pub kind: ItemKind,
}

impl Item {
    /// A 1×1 item at the origin of a container.
    #[must_use]
    pub fn new(id: ItemId, container: Container, kind: ItemKind) -> Self {
        let rank = match container {
            Container::Hotseat(slot) => slot,
            Container::Desktop(_) | Container::Folder(_) => 0,
        };
        Self {
            id,
            container,
            cell_x: 0,
            cell_y: 0,
            span_x: 1,
            span_y: 1,
            rank,
            user: UserSerial::PRIMARY,
            restore: RestoreFlags::empty(),
            title: None,
            kind,
        }
    }

    #[must_use]
    pub const fn with_cell(mut self, cell_x: u32, cell_y: u32) -> Self {
        self.cell_x = cell_x;
        self.cell_y = cell_y;
        self
    }

    #[must_use]
    pub const fn with_span(mut self, span_x: u32, span_y: u32) -> Self {
        self.span_x = span_x;
        self.span_y = span_y;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn screen(&self) -> Option<ScreenId> {
        match self.container {
            Container::Desktop(screen) => Some(screen),
            Container::Hotseat(_) | Container::Folder(_) => None,
        }
    }

    #[must_use]
    pub const fn hotseat_slot(&self) -> Option<u32> {
        match self.container {
            Container::Hotseat(slot) => Some(slot),
            Container::Desktop(_) | Container::Folder(_) => None,
        }
    }

    #[must_use]
    pub const fn folder(&self) -> Option<ItemId> {
        match self.container {
            Container::Folder(id) => Some(id),
            Container::Desktop(_) | Container::Hotseat(_) => None,
        }
    }

    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    #[must_use]
    pub const fn is_widget(&self) -> bool {
        matches!(self.kind, ItemKind::AppWidget { .. })
    }

    /// Whether this item sits directly on a desktop screen or the hotseat.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        !matches!(self.container, Container::Folder(_))
    }

    /// Whether the item's rectangle lies inside one screen of `geometry`.
    #[must_use]
    pub fn fits(&self, geometry: &GridGeometry) -> bool {
        geometry.contains(self.cell_x, self.cell_y, self.span_x, self.span_y)
    }

    /// Rectangle intersection with another desktop item on the same screen.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self.screen(), other.screen()) {
            (Some(a), Some(b)) if a == b => {
                self.cell_x < other.cell_x + other.span_x
                    && other.cell_x < self.cell_x + self.span_x
                    && self.cell_y < other.cell_y + other.span_y
                    && other.cell_y < self.cell_y + self.span_y
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: i64, screen: u32, x: u32, y: u32) -> Item {
        Item::new(
            ItemId(id),
            Container::Desktop(ScreenId(screen)),
            ItemKind::Application {
                intent: LaunchIntent::for_component(ComponentName::new("a.b", "a.b.Main")),
            },
        )
        .with_cell(x, y)
    }

    #[test]
    fn intent_uri_parses_known_and_unknown_keys() {
        let raw = "#Intent;action=android.intent.action.MAIN;component=com.mail/.Inbox;launchFlags=0x10;end";
        let intent = LaunchIntent::parse(raw).expect("parse");
        assert_eq!(
            intent.component,
            Some(ComponentName::new("com.mail", "com.mail.Inbox"))
        );
        assert_eq!(intent.target_package(), Some("com.mail"));
        assert_eq!(intent.extra("launchFlags"), Some("0x10"));
        let again = LaunchIntent::parse(&intent.to_uri()).expect("reparse");
        assert_eq!(again, intent);
    }

    #[test]
    fn repeated_intent_keys_survive_a_rewrite() {
        let raw = "#Intent;category=LAUNCHER;component=com.mail/.Inbox;category=HOME;end";
        let intent = LaunchIntent::parse(raw).expect("parse");
        assert_eq!(
            intent.extras,
            vec![
                ("category".to_string(), "LAUNCHER".to_string()),
                ("category".to_string(), "HOME".to_string()),
            ]
        );
        let uri = intent.to_uri();
        assert!(uri.ends_with("category=LAUNCHER;category=HOME;end"), "{uri}");
        assert_eq!(LaunchIntent::parse(&uri).expect("reparse"), intent);
    }

    #[test]
    fn intent_parse_rejects_garbage() {
        assert!(LaunchIntent::parse("").is_none());
        assert!(LaunchIntent::parse("com.mail/.Inbox").is_none());
        assert!(LaunchIntent::parse("#Intent;component=nopackage;end").is_none());
    }

    #[test]
    fn empty_package_is_not_a_target() {
        let intent = LaunchIntent {
            package: Some(String::new()),
            ..LaunchIntent::default()
        };
        assert_eq!(intent.target_package(), None);
        assert_eq!(
            LaunchIntent::for_shortcut("com.chat", "s1").target_package(),
            Some("com.chat")
        );
    }

    #[test]
    fn overlap_requires_same_screen() {
        let a = app(1, 0, 0, 0).with_span(2, 2);
        let b = app(2, 0, 1, 1);
        let c = app(3, 1, 1, 1);
        let d = app(4, 0, 2, 0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d), "edges touch but do not intersect");
    }

    #[test]
    fn hotseat_item_rank_follows_slot() {
        let item = Item::new(ItemId(1), Container::Hotseat(3), ItemKind::Folder);
        assert_eq!(item.rank, 3);
        assert_eq!(item.hotseat_slot(), Some(3));
        assert_eq!(item.screen(), None);
    }

    #[test]
    fn pending_flags() {
        assert!(RestoreFlags::RESTORED_ICON.is_pending());
        assert!(!RestoreFlags::PROVIDER_NOT_READY.is_pending());
        assert!(!RestoreFlags::empty().is_pending());
    }
}
