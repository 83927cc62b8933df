// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mdmkit-schema: Build-time restriction schema emitter.
//
// Turns the declarative restriction map from the plugin settings into the
// artifacts MDM consoles read: Android `app_restrictions.xml` plus its string
// resources and manifest entries, and the iOS managed configuration
// dictionary in `Info.plist`. Pure data transformation; nothing here runs on
// device.

pub mod android;
pub mod generate;
pub mod ios;
pub mod validate;

pub use generate::{GeneratedArtifacts, run_plugin};
pub use validate::validate_restrictions;
