//! Live system lookups the loader consults, behind an injectable trait.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};

use crate::model::{ComponentName, LaunchIntent, UserSerial};

/// An in-progress package install.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallSession {
    pub package: String,
    /// Package of the store or installer driving the session.
    pub installer: String,
    pub user: UserSerial,
}

/// Everything the validator, add task, and broadcast builder need to know
/// about the running system.
pub trait SystemServices: Send + Sync {
    fn profile_exists(&self, user: UserSerial) -> bool;

    fn is_package_installed(&self, package: &str, user: UserSerial) -> bool;

    /// Whether this exact activity exists and is enabled.
    fn is_activity_enabled(&self, component: &ComponentName, user: UserSerial) -> bool;

    /// Default launch intent of a package, if it has one.
    fn launch_intent_for_package(&self, package: &str, user: UserSerial) -> Option<LaunchIntent>;

    fn install_sessions(&self) -> Vec<InstallSession>;

    fn has_install_session(&self, package: &str, user: UserSerial) -> bool {
        self.install_sessions()
            .iter()
            .any(|s| s.package == package && s.user == user)
    }

    fn is_shortcut_pinned(&self, package: &str, shortcut_id: &str, user: UserSerial) -> bool;

    fn is_widget_provider_ready(&self, provider: &ComponentName, user: UserSerial) -> bool;

    /// Package that installed `package`.
    fn installer_package(&self, package: &str) -> Option<String>;
}

/// Table-driven [`SystemServices`] for tests and offline tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticServices {
    permissive: bool,
    profiles: HashSet<UserSerial>,
    packages: HashSet<(String, UserSerial)>,
    activities: HashSet<(ComponentName, UserSerial)>,
    launch_intents: HashMap<String, LaunchIntent>,
    sessions: Vec<InstallSession>,
    shortcuts: HashSet<(String, String, UserSerial)>,
    providers: HashSet<(ComponentName, UserSerial)>,
    installers: HashMap<String, String>,
}

impl StaticServices {
    /// Only the primary profile exists; nothing is installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: HashSet::from([UserSerial::PRIMARY]),
            ..Self::default()
        }
    }

    /// Every lookup succeeds. Used when inspecting a database away from the
    /// device it came from.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_profile(mut self, user: UserSerial) -> Self {
        self.profiles.insert(user);
        self
    }

    #[must_use]
    pub fn without_profile(mut self, user: UserSerial) -> Self {
        self.profiles.remove(&user);
        self
    }

    /// Install a package with an enabled launcher activity.
    #[must_use]
    pub fn with_app(mut self, component: ComponentName, user: UserSerial) -> Self {
        self.packages.insert((component.package.clone(), user));
        self.launch_intents
            .entry(component.package.clone())
            .or_insert_with(|| LaunchIntent::for_component(component.clone()));
        self.activities.insert((component, user));
        self
    }

    /// Install a package without registering any activity.
    #[must_use]
    pub fn with_package(mut self, package: &str, user: UserSerial) -> Self {
        self.packages.insert((package.to_string(), user));
        self
    }

    #[must_use]
    pub fn with_launch_intent(mut self, package: &str, intent: LaunchIntent) -> Self {
        self.launch_intents.insert(package.to_string(), intent);
        self
    }

    #[must_use]
    pub fn with_session(mut self, package: &str, installer: &str, user: UserSerial) -> Self {
        self.sessions.push(InstallSession {
            package: package.to_string(),
            installer: installer.to_string(),
            user,
        });
        self
    }

    #[must_use]
    pub fn with_pinned_shortcut(mut self, package: &str, id: &str, user: UserSerial) -> Self {
        self.shortcuts
            .insert((package.to_string(), id.to_string(), user));
        self
    }

    #[must_use]
    pub fn with_widget_provider(mut self, provider: ComponentName, user: UserSerial) -> Self {
        self.providers.insert((provider, user));
        self
    }

    #[must_use]
    pub fn with_installer(mut self, package: &str, installer: &str) -> Self {
        self.installers
            .insert(package.to_string(), installer.to_string());
        self
    }
}

impl SystemServices for StaticServices {
    fn profile_exists(&self, user: UserSerial) -> bool {
        self.permissive || self.profiles.contains(&user)
    }

    fn is_package_installed(&self, package: &str, user: UserSerial) -> bool {
        self.permissive || self.packages.contains(&(package.to_string(), user))
    }

    fn is_activity_enabled(&self, component: &ComponentName, user: UserSerial) -> bool {
        self.permissive || self.activities.contains(&(component.clone(), user))
    }

    fn launch_intent_for_package(&self, package: &str, user: UserSerial) -> Option<LaunchIntent> {
        if !self.is_package_installed(package, user) {
            return None;
        }
        self.launch_intents.get(package).cloned()
    }

    fn install_sessions(&self) -> Vec<InstallSession> {
        self.sessions.clone()
    }

    fn is_shortcut_pinned(&self, package: &str, shortcut_id: &str, user: UserSerial) -> bool {
        self.permissive
            || self
                .shortcuts
                .contains(&(package.to_string(), shortcut_id.to_string(), user))
    }

    fn is_widget_provider_ready(&self, provider: &ComponentName, user: UserSerial) -> bool {
        self.permissive || self.providers.contains(&(provider.clone(), user))
    }

    fn installer_package(&self, package: &str) -> Option<String> {
        self.installers.get(package).cloned()
    }
}
