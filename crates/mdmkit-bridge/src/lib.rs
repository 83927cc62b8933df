// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mdmkit: Native platform bridge for managed device configuration.
//
// This crate defines the platform capability traits, the observer lifecycle
// shared by every platform, and the JS-facing module facade. Android (JNI)
// and iOS (objc2) implementations are compiled for their targets; every
// other target gets the zero-valued stub.

pub mod module;
pub mod observation;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

#[cfg(test)]
mod fake;

use std::sync::Arc;

use mdmkit_core::ModuleConfig;

pub use module::MdmModule;
pub use observation::{Listener, ObservationBridge};

/// Retrieves the bridge implementation for the target operating system.
///
/// RETURNS: A shared trait object (`dyn PlatformBridge`) that abstracts away
/// the underlying native SDK details.
#[cfg_attr(not(target_os = "ios"), allow(unused_variables))]
pub fn platform_bridge(config: &ModuleConfig) -> Arc<dyn traits::PlatformBridge> {
    #[cfg(target_os = "ios")]
    {
        // iOS: `objc2` message sends into Foundation and UIKit.
        Arc::new(ios::IosBridge::new(config.ios_managed_config_key.clone()))
    }
    #[cfg(target_os = "android")]
    {
        // Android: `jni-rs` calls into RestrictionsManager and friends.
        Arc::new(android::AndroidBridge::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        // WEB/DESKTOP/CI: zero values everywhere.
        Arc::new(stub::StubBridge)
    }
}
