// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime module configuration and build-time plugin settings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    APP_CONFIG_CHANGED_EVENT, APP_LOCK_STATUS_CHANGED_EVENT, ConfigValue, EventKind,
    IOS_MANAGED_CONFIG_KEY,
};

/// Settings for the JS-facing module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Name the host registers the module under.
    pub module_name: String,
    /// Event emitted when the managed configuration changes.
    pub config_changed_event: String,
    /// Event emitted when the app-lock state changes.
    pub lock_status_changed_event: String,
    /// `NSUserDefaults` key holding the iOS managed configuration dictionary.
    pub ios_managed_config_key: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module_name: "MdmKit".into(),
            config_changed_event: APP_CONFIG_CHANGED_EVENT.into(),
            lock_status_changed_event: APP_LOCK_STATUS_CHANGED_EVENT.into(),
            ios_managed_config_key: IOS_MANAGED_CONFIG_KEY.into(),
        }
    }
}

impl ModuleConfig {
    pub fn event_name(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::ConfigurationChanged => &self.config_changed_event,
            EventKind::LockStatusChanged => &self.lock_status_changed_event,
        }
    }

    /// Constants exposed on the JS module object.
    pub fn constants(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("APP_CONFIG_CHANGED", self.config_changed_event.clone()),
            ("APP_LOCK_STATUS_CHANGED", self.lock_status_changed_event.clone()),
        ])
    }
}

/// Declared type of a managed restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionType {
    String,
    Bool,
    Number,
}

/// One entry of the restriction schema an app publishes to MDM consoles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: RestrictionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ConfigValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Restriction key → spec. Keys become Android resource names.
pub type RestrictionMap = BTreeMap<String, RestrictionSpec>;

/// Android half of the plugin settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AndroidSettings {
    #[serde(alias = "AppRestrictionsMap")]
    pub app_restrictions_map: Option<RestrictionMap>,
    /// Packages added to the manifest `<queries>` block.
    #[serde(alias = "QueryPackages")]
    pub query_packages: Vec<String>,
}

/// iOS half of the plugin settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IosSettings {
    #[serde(alias = "AppRestrictionsMap")]
    pub app_restrictions_map: Option<RestrictionMap>,
}

/// Input of the build-time config plugin.
///
/// Keys are camelCase; the PascalCase spelling (`AppRestrictionsMap`,
/// `QueryPackages`) used by existing Expo app configs is accepted too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub android: AndroidSettings,
    pub ios: IosSettings,
}

impl PluginSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Restrictions to publish on iOS. Falls back to the Android map so a
    /// single declaration covers both platforms.
    pub fn ios_restrictions(&self) -> Option<&RestrictionMap> {
        self.ios
            .app_restrictions_map
            .as_ref()
            .or(self.android.app_restrictions_map.as_ref())
    }
}
