// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the managed configuration bridge.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event name delivered to JS when the managed configuration changes.
pub const APP_CONFIG_CHANGED_EVENT: &str = "onManagedAppConfigChange";

/// Event name delivered to JS when the app-lock (kiosk) state changes.
pub const APP_LOCK_STATUS_CHANGED_EVENT: &str = "onAppLockStatusChange";

/// `NSUserDefaults` key under which iOS MDM pushes the managed configuration.
pub const IOS_MANAGED_CONFIG_KEY: &str = "com.apple.managed.configuration";

/// A single managed configuration value.
///
/// MDM consoles only push scalars; nested bundles are flattened to their
/// string form by the platform bridges before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            // Integral numbers print without a trailing ".0" so they survive
            // a trip through XML attributes and plist integers.
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// Snapshot of the OS-managed configuration store.
///
/// Produced fresh on every read; nothing in mdmkit caches one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedConfig(BTreeMap<String, ConfigValue>);

impl ManagedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ManagedConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for ManagedConfig {
    type Item = (String, ConfigValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The two observable event streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ConfigurationChanged,
    LockStatusChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [Self::ConfigurationChanged, Self::LockStatusChanged];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigurationChanged => f.write_str("configuration-changed"),
            Self::LockStatusChanged => f.write_str("lock-status-changed"),
        }
    }
}

/// Payload of [`APP_CONFIG_CHANGED_EVENT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedConfigChangeEvent {
    pub config: ManagedConfig,
}

/// Payload of [`APP_LOCK_STATUS_CHANGED_EVENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLockStatusChangeEvent {
    pub is_locked: bool,
}

/// A typed event ready to be forwarded to JS listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum MdmEvent {
    ConfigurationChanged(ManagedConfigChangeEvent),
    LockStatusChanged(AppLockStatusChangeEvent),
}

impl MdmEvent {
    pub fn configuration(config: ManagedConfig) -> Self {
        Self::ConfigurationChanged(ManagedConfigChangeEvent { config })
    }

    pub fn lock_status(is_locked: bool) -> Self {
        Self::LockStatusChanged(AppLockStatusChangeEvent { is_locked })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConfigurationChanged(_) => EventKind::ConfigurationChanged,
            Self::LockStatusChanged(_) => EventKind::LockStatusChanged,
        }
    }

    /// JSON body as the JS listener sees it (`{config}` / `{isLocked}`).
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::ConfigurationChanged(e) => serde_json::to_value(e),
            Self::LockStatusChanged(e) => serde_json::to_value(e),
        }
    }
}

/// Identifies one attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How much control a platform gives over app pinning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockCapability {
    /// Lock task can be started and stopped from code (Android).
    Programmatic,
    /// Only the user can toggle it (iOS Guided Access); lock/unlock are no-ops.
    ManualOnly,
    /// No concept of app pinning (web, desktop).
    Unavailable,
}

impl LockCapability {
    pub fn can_toggle(&self) -> bool {
        matches!(self, Self::Programmatic)
    }
}

/// Observable lifecycle of one event kind inside an observation bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationState {
    /// No listeners, no OS observer.
    Idle,
    /// At least one listener and exactly one OS observer.
    Active { listeners: usize },
    /// The last OS register/unregister call failed. Counts as idle; the next
    /// attach retries registration.
    Degraded { reason: String, since: DateTime<Utc> },
}

impl ObservationState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_deserialize_by_shape() {
        let config: ManagedConfig =
            serde_json::from_str(r#"{"url":"https://x","kiosk":true,"retries":3}"#)
                .expect("parse");
        assert_eq!(config.get("url"), Some(&ConfigValue::String("https://x".into())));
        assert_eq!(config.get("kiosk"), Some(&ConfigValue::Bool(true)));
        assert_eq!(config.get("retries"), Some(&ConfigValue::Number(3.0)));
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(ConfigValue::Number(3.0).to_string(), "3");
        assert_eq!(ConfigValue::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn event_payloads_use_camel_case() {
        let event = MdmEvent::lock_status(true);
        assert_eq!(event.kind(), EventKind::LockStatusChanged);
        assert_eq!(
            event.payload().expect("json"),
            serde_json::json!({ "isLocked": true })
        );

        let config: ManagedConfig = [("serverUrl", "https://x")].into_iter().collect();
        let event = MdmEvent::configuration(config);
        assert_eq!(
            event.payload().expect("json"),
            serde_json::json!({ "config": { "serverUrl": "https://x" } })
        );
    }

    #[test]
    fn only_programmatic_locking_can_toggle() {
        assert!(LockCapability::Programmatic.can_toggle());
        assert!(!LockCapability::ManualOnly.can_toggle());
        assert!(!LockCapability::Unavailable.can_toggle());
    }
}
