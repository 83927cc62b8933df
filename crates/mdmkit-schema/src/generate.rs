// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plugin driver: validate the settings, then write every artifact into an
// app project tree.

use std::path::{Path, PathBuf};

use mdmkit_core::error::Result;
use mdmkit_core::{IOS_MANAGED_CONFIG_KEY, PluginSettings};

use crate::{android, ios, validate::validate_restrictions};

/// Android resource directory, relative to the project root.
const ANDROID_RES_DIR: [&str; 5] = ["android", "app", "src", "main", "res"];

/// Android manifest, relative to the project root.
const ANDROID_MANIFEST: [&str; 5] = ["android", "app", "src", "main", "AndroidManifest.xml"];

/// Restriction schema file name under `res/xml`.
pub const RESTRICTIONS_FILE: &str = "app_restrictions.xml";

/// String resources file name under `res/values`. Kept apart from
/// `strings.xml` so the app's own strings are never overwritten.
pub const STRINGS_FILE: &str = "mdm_restrictions.xml";

/// What a plugin run touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    /// Files created or overwritten.
    pub written: Vec<PathBuf>,
    /// Whether `AndroidManifest.xml` was modified.
    pub manifest_patched: bool,
    /// Whether `Info.plist` received the managed configuration key.
    pub info_plist_patched: bool,
}

fn join_all(root: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Run the config plugin against `project_root`.
///
/// Both restriction maps are validated before anything is written. The
/// manifest is patched only if it already exists (it belongs to the native
/// project template); `info_plist` is patched only when given.
pub fn run_plugin(
    settings: &PluginSettings,
    project_root: &Path,
    info_plist: Option<&Path>,
) -> Result<GeneratedArtifacts> {
    let android_map = settings.android.app_restrictions_map.as_ref();
    let ios_map = settings.ios_restrictions();
    if let Some(map) = android_map {
        validate_restrictions(map)?;
    }
    if let Some(map) = ios_map {
        validate_restrictions(map)?;
    }

    let mut artifacts = GeneratedArtifacts::default();

    // -- Android resources --------------------------------------------------
    if let Some(map) = android_map {
        let res_dir = join_all(project_root, &ANDROID_RES_DIR);
        let xml_dir = res_dir.join("xml");
        let values_dir = res_dir.join("values");
        std::fs::create_dir_all(&xml_dir)?;
        std::fs::create_dir_all(&values_dir)?;

        let restrictions_path = xml_dir.join(RESTRICTIONS_FILE);
        std::fs::write(&restrictions_path, android::build_restrictions_xml(map))?;
        let strings_path = values_dir.join(STRINGS_FILE);
        std::fs::write(&strings_path, android::build_strings_xml(map))?;

        tracing::info!(
            restrictions = map.len(),
            dir = %res_dir.display(),
            "Android restriction resources generated"
        );
        artifacts.written.push(restrictions_path);
        artifacts.written.push(strings_path);
    }

    // -- Android manifest ---------------------------------------------------
    let query_packages = &settings.android.query_packages;
    if android_map.is_some() || !query_packages.is_empty() {
        let manifest_path = join_all(project_root, &ANDROID_MANIFEST);
        if manifest_path.is_file() {
            let original = std::fs::read_to_string(&manifest_path)?;
            let patched = android::patch_manifest(&original, android_map.is_some(), query_packages)?;
            if patched != original {
                std::fs::write(&manifest_path, patched)?;
                artifacts.manifest_patched = true;
                tracing::info!(path = %manifest_path.display(), "AndroidManifest.xml patched");
            } else {
                tracing::debug!("AndroidManifest.xml already up to date");
            }
        } else {
            tracing::warn!(
                path = %manifest_path.display(),
                "AndroidManifest.xml not found; skipping manifest entries"
            );
        }
    }

    // -- iOS Info.plist -----------------------------------------------------
    match (ios_map, info_plist) {
        (Some(map), Some(path)) => {
            ios::apply_to_info_plist(path, IOS_MANAGED_CONFIG_KEY, map)?;
            artifacts.info_plist_patched = true;
        }
        (Some(_), None) => {
            tracing::debug!("no Info.plist given; iOS managed configuration not written");
        }
        _ => {}
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
    <application android:name=".MainApplication">
    </application>
</manifest>
"#;

    fn settings(json: &str) -> PluginSettings {
        serde_json::from_str(json).expect("settings")
    }

    fn seed_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = join_all(dir.path(), &ANDROID_MANIFEST);
        std::fs::create_dir_all(manifest.parent().expect("parent")).expect("mkdir");
        std::fs::write(&manifest, MANIFEST).expect("manifest");
        dir
    }

    #[test]
    fn writes_android_and_ios_artifacts() {
        let project = seed_project();
        let info_plist = project.path().join("Info.plist");
        plist::Value::Dictionary(plist::Dictionary::new())
            .to_file_xml(&info_plist)
            .expect("seed plist");

        let settings = settings(
            r#"{"android":{
                "appRestrictionsMap":{"serverUrl":{"title":"Server","type":"string","defaultValue":"https://x"}},
                "queryPackages":["com.example.launcher"]
            }}"#,
        );
        let artifacts = run_plugin(&settings, project.path(), Some(&info_plist)).expect("run");

        assert_eq!(artifacts.written.len(), 2);
        assert!(artifacts.manifest_patched);
        assert!(artifacts.info_plist_patched);

        let res = join_all(project.path(), &ANDROID_RES_DIR);
        let restrictions =
            std::fs::read_to_string(res.join("xml").join(RESTRICTIONS_FILE)).expect("xml");
        let strings =
            std::fs::read_to_string(res.join("values").join(STRINGS_FILE)).expect("strings");
        let parsed = android::parse_restrictions_xml(
            &restrictions,
            &android::parse_strings_xml(&strings).expect("parse strings"),
        )
        .expect("parse restrictions");
        assert_eq!(Some(&parsed), settings.android.app_restrictions_map.as_ref());

        let manifest =
            std::fs::read_to_string(join_all(project.path(), &ANDROID_MANIFEST)).expect("read");
        assert!(manifest.contains(android::APP_RESTRICTIONS_META));
        assert!(manifest.contains("com.example.launcher"));

        // The iOS map falls back to the Android declaration.
        let info = plist::Value::from_file(&info_plist).expect("plist");
        let managed = info
            .as_dictionary()
            .and_then(|d| d.get(IOS_MANAGED_CONFIG_KEY))
            .expect("managed key");
        assert_eq!(ios::parse_managed_config(managed).expect("parse"), parsed);
    }

    #[test]
    fn second_run_leaves_manifest_untouched() {
        let project = seed_project();
        let settings = settings(
            r#"{"android":{"appRestrictionsMap":{"kiosk":{"title":"Kiosk","type":"bool"}}}}"#,
        );
        assert!(run_plugin(&settings, project.path(), None).expect("first").manifest_patched);
        assert!(!run_plugin(&settings, project.path(), None).expect("second").manifest_patched);
    }

    #[test]
    fn invalid_map_writes_nothing() {
        let project = seed_project();
        let settings = settings(
            r#"{"android":{"appRestrictionsMap":{"bad-key":{"title":"Bad","type":"string"}}}}"#,
        );
        let err = run_plugin(&settings, project.path(), None).unwrap_err();
        assert_eq!(err.error_code(), "ERR_SCHEMA");
        assert!(!join_all(project.path(), &ANDROID_RES_DIR).exists());
        let manifest =
            std::fs::read_to_string(join_all(project.path(), &ANDROID_MANIFEST)).expect("read");
        assert_eq!(manifest, MANIFEST);
    }

    #[test]
    fn pascal_case_settings_are_honoured() {
        let project = seed_project();
        let settings = settings(
            r#"{"android":{
                "AppRestrictionsMap":{"serverUrl":{"title":"Server","type":"string","defaultValue":"https://x"}},
                "QueryPackages":["com.example.a"]
            }}"#,
        );
        let artifacts = run_plugin(&settings, project.path(), None).expect("run");

        assert_eq!(artifacts.written.len(), 2);
        assert!(artifacts.manifest_patched);
        let manifest =
            std::fs::read_to_string(join_all(project.path(), &ANDROID_MANIFEST)).expect("read");
        assert!(manifest.contains(android::APP_RESTRICTIONS_META));
        assert!(manifest.contains(r#"<package android:name="com.example.a"/>"#));
    }

    #[test]
    fn missing_manifest_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings(r#"{"android":{"queryPackages":["com.example.a"]}}"#);
        let artifacts = run_plugin(&settings, dir.path(), None).expect("run");
        assert_eq!(artifacts, GeneratedArtifacts::default());
    }
}
