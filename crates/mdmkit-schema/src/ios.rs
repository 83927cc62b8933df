// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS artifact: the managed configuration dictionary stored in `Info.plist`
// under `com.apple.managed.configuration`.
//
// Each restriction becomes a dictionary entry:
//
//   serverUrl = { Type = String; DefaultValue = "https://x"; Title = "Server URL"; }

use std::io::Cursor;
use std::path::Path;

use plist::{Dictionary, Value};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, RestrictionMap, RestrictionSpec, RestrictionType};

const TYPE_KEY: &str = "Type";
const DEFAULT_VALUE_KEY: &str = "DefaultValue";
const TITLE_KEY: &str = "Title";
const DESCRIPTION_KEY: &str = "Description";

/// `Type` value for a declared restriction type.
pub fn plist_type_name(kind: RestrictionType) -> &'static str {
    match kind {
        RestrictionType::String => "String",
        RestrictionType::Bool => "Boolean",
        RestrictionType::Number => "Integer",
    }
}

fn restriction_type_from_plist(name: &str) -> Option<RestrictionType> {
    match name {
        "String" => Some(RestrictionType::String),
        "Boolean" => Some(RestrictionType::Bool),
        "Integer" => Some(RestrictionType::Number),
        _ => None,
    }
}

/// Build the managed configuration dictionary for a restriction map.
pub fn build_managed_config(map: &RestrictionMap) -> Value {
    let mut root = Dictionary::new();
    for (key, spec) in map {
        let mut entry = Dictionary::new();
        entry.insert(TYPE_KEY.into(), Value::String(plist_type_name(spec.kind).into()));
        if let Some(default) = &spec.default_value {
            entry.insert(DEFAULT_VALUE_KEY.into(), config_value_to_plist(default));
        }
        entry.insert(TITLE_KEY.into(), Value::String(spec.title.clone()));
        if let Some(description) = &spec.description {
            entry.insert(DESCRIPTION_KEY.into(), Value::String(description.clone()));
        }
        root.insert(key.clone(), Value::Dictionary(entry));
    }
    Value::Dictionary(root)
}

fn config_value_to_plist(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Bool(b) => Value::Boolean(*b),
        // Validation guarantees integral values for Number restrictions.
        ConfigValue::Number(n) if n.fract() == 0.0 => Value::Integer((*n as i64).into()),
        ConfigValue::Number(n) => Value::Real(*n),
        ConfigValue::String(s) => Value::String(s.clone()),
    }
}

/// Serialise the managed configuration dictionary as an XML plist fragment.
pub fn to_plist_xml(map: &RestrictionMap) -> Result<String> {
    let mut buf = Vec::new();
    build_managed_config(map).to_writer_xml(&mut buf)?;
    String::from_utf8(buf).map_err(|e| MdmError::Schema(format!("plist is not UTF-8: {e}")))
}

/// Parse an XML plist fragment produced by [`to_plist_xml`].
pub fn from_plist_xml(xml: &str) -> Result<RestrictionMap> {
    let value = Value::from_reader_xml(Cursor::new(xml.as_bytes()))?;
    parse_managed_config(&value)
}

/// Rebuild a restriction map from a managed configuration dictionary.
/// Entries without a `Title` take their key as title.
pub fn parse_managed_config(value: &Value) -> Result<RestrictionMap> {
    let root = value
        .as_dictionary()
        .ok_or_else(|| malformed("managed configuration is not a dictionary"))?;

    let mut map = RestrictionMap::new();
    for (key, entry) in root {
        let entry = entry
            .as_dictionary()
            .ok_or_else(|| malformed(&format!("entry '{key}' is not a dictionary")))?;

        let type_name = entry
            .get(TYPE_KEY)
            .and_then(Value::as_string)
            .ok_or_else(|| malformed(&format!("entry '{key}' has no Type")))?;
        let kind = restriction_type_from_plist(type_name)
            .ok_or_else(|| malformed(&format!("entry '{key}' has unsupported Type {type_name}")))?;

        let default_value = entry
            .get(DEFAULT_VALUE_KEY)
            .map(|v| plist_to_config_value(key, kind, v))
            .transpose()?;
        let title = entry
            .get(TITLE_KEY)
            .and_then(Value::as_string)
            .unwrap_or(key.as_str())
            .to_owned();
        let description = entry
            .get(DESCRIPTION_KEY)
            .and_then(Value::as_string)
            .map(str::to_owned);

        map.insert(
            key.clone(),
            RestrictionSpec {
                title,
                kind,
                default_value,
                description,
            },
        );
    }
    Ok(map)
}

fn plist_to_config_value(key: &str, kind: RestrictionType, value: &Value) -> Result<ConfigValue> {
    let converted = match (kind, value) {
        (RestrictionType::String, Value::String(s)) => Some(ConfigValue::String(s.clone())),
        (RestrictionType::Bool, Value::Boolean(b)) => Some(ConfigValue::Bool(*b)),
        (RestrictionType::Number, Value::Integer(i)) => i.as_signed().map(ConfigValue::from),
        _ => None,
    };
    converted.ok_or_else(|| malformed(&format!("DefaultValue of '{key}' does not match its Type")))
}

/// Write the managed configuration into an existing `Info.plist`, replacing
/// whatever was stored under `config_key` before. Other keys are preserved.
pub fn apply_to_info_plist(path: &Path, config_key: &str, map: &RestrictionMap) -> Result<()> {
    let mut info = Value::from_file(path)?;
    let dict = info
        .as_dictionary_mut()
        .ok_or_else(|| malformed(&format!("{} is not a dictionary plist", path.display())))?;
    dict.insert(config_key.to_owned(), build_managed_config(map));
    info.to_file_xml(path)?;
    tracing::info!(
        path = %path.display(),
        key = config_key,
        restrictions = map.len(),
        "iOS managed configuration written"
    );
    Ok(())
}

fn malformed(detail: &str) -> MdmError {
    MdmError::Schema(format!("malformed managed configuration plist: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdmkit_core::IOS_MANAGED_CONFIG_KEY;

    fn server_url_map() -> RestrictionMap {
        let settings: mdmkit_core::PluginSettings = serde_json::from_str(
            r#"{"ios":{"appRestrictionsMap":{
                "serverUrl":{"title":"Server URL","type":"string","defaultValue":"https://x"}
            }}}"#,
        )
        .expect("settings");
        settings.ios_restrictions().cloned().expect("map")
    }

    #[test]
    fn entries_carry_type_and_default() {
        let value = build_managed_config(&server_url_map());
        let entry = value
            .as_dictionary()
            .and_then(|d| d.get("serverUrl"))
            .and_then(Value::as_dictionary)
            .expect("entry");
        assert_eq!(entry.get("Type").and_then(Value::as_string), Some("String"));
        assert_eq!(
            entry.get("DefaultValue").and_then(Value::as_string),
            Some("https://x")
        );
    }

    #[test]
    fn server_url_survives_round_trip() {
        let map = server_url_map();
        let xml = to_plist_xml(&map).expect("xml");
        assert!(xml.contains("<key>serverUrl</key>"));
        assert_eq!(from_plist_xml(&xml).expect("parse"), map);
    }

    #[test]
    fn typed_defaults_round_trip() {
        let map = RestrictionMap::from([
            (
                "kiosk".to_owned(),
                RestrictionSpec {
                    title: "Kiosk".into(),
                    kind: RestrictionType::Bool,
                    default_value: Some(true.into()),
                    description: Some("Pin the app".into()),
                },
            ),
            (
                "retries".to_owned(),
                RestrictionSpec {
                    title: "Retries".into(),
                    kind: RestrictionType::Number,
                    default_value: Some(5i64.into()),
                    description: None,
                },
            ),
        ]);
        let xml = to_plist_xml(&map).expect("xml");
        assert!(xml.contains("<string>Integer</string>"));
        assert!(xml.contains("<integer>5</integer>"));
        assert_eq!(from_plist_xml(&xml).expect("parse"), map);
    }

    #[test]
    fn mismatched_default_is_rejected() {
        let mut entry = Dictionary::new();
        entry.insert("Type".into(), Value::String("Boolean".into()));
        entry.insert("DefaultValue".into(), Value::String("yes".into()));
        let mut root = Dictionary::new();
        root.insert("kiosk".into(), Value::Dictionary(entry));
        let err = parse_managed_config(&Value::Dictionary(root)).unwrap_err();
        assert_eq!(err.error_code(), "ERR_SCHEMA");
    }

    #[test]
    fn info_plist_keeps_existing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Info.plist");
        let mut info = Dictionary::new();
        info.insert("CFBundleName".into(), Value::String("Demo".into()));
        Value::Dictionary(info).to_file_xml(&path).expect("seed");

        let map = server_url_map();
        apply_to_info_plist(&path, IOS_MANAGED_CONFIG_KEY, &map).expect("apply");

        let written = Value::from_file(&path).expect("read");
        let dict = written.as_dictionary().expect("dict");
        assert_eq!(dict.get("CFBundleName").and_then(Value::as_string), Some("Demo"));
        let managed = dict.get(IOS_MANAGED_CONFIG_KEY).expect("managed key");
        assert_eq!(parse_managed_config(managed).expect("parse"), map);
    }
}
