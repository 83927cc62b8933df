// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Restriction map validation, run before any artifact is written.

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, RestrictionMap, RestrictionSpec, RestrictionType};

/// Suffix appended to a key to name its description string resource.
pub const DESCRIPTION_SUFFIX: &str = "Description";

/// Check that every entry can be emitted on both platforms.
///
/// Keys double as Android resource names, so they must match
/// `[A-Za-z_][A-Za-z0-9_]*`. Defaults must agree with the declared type and
/// numbers must be integral 32-bit values (`integer` on Android, `Integer` on
/// iOS).
pub fn validate_restrictions(map: &RestrictionMap) -> Result<()> {
    for (key, spec) in map {
        validate_key(key)?;

        if spec.title.trim().is_empty() {
            return Err(MdmError::Schema(format!("restriction '{key}' has an empty title")));
        }

        if let Some(default) = &spec.default_value {
            validate_default(key, spec, default)?;
        }

        if spec.description.is_some() {
            let description_name = format!("{key}{DESCRIPTION_SUFFIX}");
            if map.contains_key(&description_name) {
                return Err(MdmError::Schema(format!(
                    "description string for '{key}' collides with restriction '{description_name}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(MdmError::Schema(format!(
            "restriction key '{key}' is not a valid resource name"
        )))
    }
}

fn validate_default(key: &str, spec: &RestrictionSpec, default: &ConfigValue) -> Result<()> {
    match (spec.kind, default) {
        (RestrictionType::String, ConfigValue::String(_)) => Ok(()),
        (RestrictionType::Bool, ConfigValue::Bool(_)) => Ok(()),
        (RestrictionType::Number, ConfigValue::Number(n)) => {
            if n.fract() != 0.0 || !n.is_finite() {
                Err(MdmError::Schema(format!(
                    "default for '{key}' must be a whole number, got {n}"
                )))
            } else if *n < f64::from(i32::MIN) || *n > f64::from(i32::MAX) {
                Err(MdmError::Schema(format!(
                    "default for '{key}' does not fit in 32 bits"
                )))
            } else {
                Ok(())
            }
        }
        (kind, value) => Err(MdmError::Schema(format!(
            "default for '{key}' is {value:?}, which does not match type {kind:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: RestrictionType, default_value: Option<ConfigValue>) -> RestrictionSpec {
        RestrictionSpec {
            title: "Title".into(),
            kind,
            default_value,
            description: None,
        }
    }

    #[test]
    fn accepts_well_formed_map() {
        let map = RestrictionMap::from([
            ("serverUrl".into(), spec(RestrictionType::String, Some("https://x".into()))),
            ("kiosk".into(), spec(RestrictionType::Bool, Some(true.into()))),
            ("retries".into(), spec(RestrictionType::Number, Some(3i64.into()))),
            ("_private".into(), spec(RestrictionType::String, None)),
        ]);
        validate_restrictions(&map).expect("valid");
    }

    #[test]
    fn rejects_bad_keys() {
        for key in ["", "1st", "server-url", "a b"] {
            let map = RestrictionMap::from([(key.into(), spec(RestrictionType::String, None))]);
            assert!(validate_restrictions(&map).is_err(), "key {key:?} accepted");
        }
    }

    #[test]
    fn rejects_mismatched_defaults() {
        let map = RestrictionMap::from([(
            "kiosk".into(),
            spec(RestrictionType::Bool, Some("yes".into())),
        )]);
        let err = validate_restrictions(&map).unwrap_err();
        assert_eq!(err.error_code(), "ERR_SCHEMA");
    }

    #[test]
    fn rejects_fractional_and_oversized_numbers() {
        for n in [2.5, 1e12] {
            let map = RestrictionMap::from([(
                "retries".into(),
                spec(RestrictionType::Number, Some(n.into())),
            )]);
            assert!(validate_restrictions(&map).is_err(), "{n} accepted");
        }
    }

    #[test]
    fn rejects_description_name_collision() {
        let mut with_description = spec(RestrictionType::String, None);
        with_description.description = Some("Where to connect".into());
        let map = RestrictionMap::from([
            ("server".into(), with_description),
            ("serverDescription".into(), spec(RestrictionType::String, None)),
        ]);
        assert!(validate_restrictions(&map).is_err());
    }

    #[test]
    fn rejects_blank_title() {
        let mut blank = spec(RestrictionType::String, None);
        blank.title = "  ".into();
        let map = RestrictionMap::from([("serverUrl".into(), blank)]);
        assert!(validate_restrictions(&map).is_err());
    }
}
