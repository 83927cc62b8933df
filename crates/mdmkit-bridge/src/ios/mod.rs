// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2.
//
// Requires compilation with the iOS SDK (Xcode). Managed configuration is
// the dictionary MDM servers push into `NSUserDefaults` under
// `com.apple.managed.configuration`; changes are announced with
// `NSUserDefaultsDidChangeNotification`, which fires for any defaults write,
// so the bridge always re-reads the dictionary.
//
// iOS offers no public API to pin an app. The closest thing is Guided Access,
// which only the user (or a supervised-device profile) can switch on, so
// locking is reported read-only: `lock_capability` is `ManualOnly` and the
// lock/unlock entry points are never reached through the module facade.
//
// ## Unsafe code
//
// 1. **ObjC message sends** (`msg_send!`, `define_class!`): selectors are
//    the documented Foundation ones. `NSUserDefaults` and
//    `NSNotificationCenter` are thread-safe, so no main-thread marker is
//    required.
//
// 2. **C globals and functions** from Foundation/UIKit (notification names,
//    `UIAccessibilityIsGuidedAccessEnabled`): linked from the SDK frameworks.

#![cfg(target_os = "ios")]

use std::ffi::{CStr, c_char};

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, Bool, NSObject};
use objc2::{AllocAnyThread, DefinedClass, class, define_class, msg_send, sel};
use objc2_foundation::{NSDictionary, NSNotification, NSNumber, NSString};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, EventKind, LockCapability, ManagedConfig};

use crate::traits::*;

// ---------------------------------------------------------------------------
// Framework globals
// ---------------------------------------------------------------------------

unsafe extern "C" {
    /// Posted whenever any user default changes, including MDM pushes.
    static NSUserDefaultsDidChangeNotification: &'static NSString;
}

#[link(name = "UIKit", kind = "framework")]
unsafe extern "C" {
    /// Posted when Guided Access is switched on or off.
    static UIAccessibilityGuidedAccessStatusDidChangeNotification: &'static NSString;

    /// ```c
    /// BOOL UIAccessibilityIsGuidedAccessEnabled(void);
    /// ```
    fn UIAccessibilityIsGuidedAccessEnabled() -> Bool;
}

fn guided_access_enabled() -> bool {
    // SAFETY: plain C query with no arguments; callable from any thread.
    unsafe { UIAccessibilityIsGuidedAccessEnabled() }.as_bool()
}

// ---------------------------------------------------------------------------
// Value translation
// ---------------------------------------------------------------------------

/// Convert one managed configuration value. `NSNumber`s created from `BOOL`
/// report the `c` type encoding and become booleans.
fn object_to_config_value(value: &AnyObject) -> ConfigValue {
    if let Some(s) = value.downcast_ref::<NSString>() {
        return ConfigValue::String(s.to_string());
    }
    if let Some(n) = value.downcast_ref::<NSNumber>() {
        // SAFETY: `objCType` returns a NUL-terminated encoding string owned by
        // the number; copied before the number goes away.
        let encoding = unsafe {
            let ty: *const c_char = msg_send![n, objCType];
            CStr::from_ptr(ty).to_bytes().to_vec()
        };
        if encoding == b"c" || encoding == b"B" {
            // SAFETY: `boolValue` is defined on every NSNumber.
            let b: Bool = unsafe { msg_send![n, boolValue] };
            return ConfigValue::Bool(b.as_bool());
        }
        // SAFETY: `doubleValue` is defined on every NSNumber.
        let v: f64 = unsafe { msg_send![n, doubleValue] };
        return ConfigValue::Number(v);
    }
    // Arrays, dates and nested dictionaries fall back to their description.
    // SAFETY: `description` is defined on NSObject and never returns nil.
    let description: Retained<NSString> = unsafe { msg_send![value, description] };
    ConfigValue::String(description.to_string())
}

// ---------------------------------------------------------------------------
// Notification observer (NSNotificationCenter target)
// ---------------------------------------------------------------------------

struct ObserverIvars {
    sink: NotificationSink,
}

// SAFETY: define_class! #[unsafe(super(NSObject))] declares the observer as
// an ObjC class inheriting from NSObject. Notifications are delivered on the
// posting thread; the sink is `Send + Sync`.
define_class! {
    #[unsafe(super(NSObject))]
    #[name = "MdmKitNotificationObserver"]
    #[ivars = ObserverIvars]
    struct NotificationObserver;

    impl NotificationObserver {
        #[unsafe(method(handleNotification:))]
        fn handle_notification(&self, _notification: &NSNotification) {
            (self.ivars().sink)();
        }
    }
}

impl NotificationObserver {
    fn new(sink: NotificationSink) -> Retained<Self> {
        let this = Self::alloc().set_ivars(ObserverIvars { sink });
        // SAFETY: NSObject's designated initialiser.
        unsafe { msg_send![super(this), init] }
    }
}

fn notification_center() -> Retained<AnyObject> {
    // SAFETY: `defaultCenter` is a class method returning the shared center.
    unsafe { msg_send![class!(NSNotificationCenter), defaultCenter] }
}

/// Live `NSNotificationCenter` registration.
struct IosObserverHandle {
    observer: Retained<NotificationObserver>,
}

// SAFETY: the observer's only state is a `Send + Sync` sink, and
// NSNotificationCenter add/remove may be called from any thread.
unsafe impl Send for IosObserverHandle {}

impl ObserverHandle for IosObserverHandle {
    fn unregister(self: Box<Self>) -> Result<()> {
        let center = notification_center();
        // SAFETY: removeObserver: with the exact object that was added.
        unsafe {
            let _: () = msg_send![&center, removeObserver: &*self.observer];
        }
        tracing::info!("iOS: notification observer removed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// iOS implementation of the MDM platform bridge.
pub struct IosBridge {
    /// `NSUserDefaults` key holding the managed configuration.
    managed_config_key: String,
}

impl IosBridge {
    pub fn new(managed_config_key: impl Into<String>) -> Self {
        Self {
            managed_config_key: managed_config_key.into(),
        }
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }
}

// ---------------------------------------------------------------------------
// ManagedConfigStore: NSUserDefaults
// ---------------------------------------------------------------------------

impl ManagedConfigStore for IosBridge {
    fn read_configuration(&self) -> Result<Option<ManagedConfig>> {
        let key = NSString::from_str(&self.managed_config_key);

        // SAFETY: standard NSUserDefaults selectors; dictionaryForKey:
        // returns nil when the key is absent or not a dictionary.
        let dict: Option<Retained<NSDictionary<NSString, AnyObject>>> = unsafe {
            let defaults: Retained<AnyObject> =
                msg_send![class!(NSUserDefaults), standardUserDefaults];
            msg_send![&defaults, dictionaryForKey: &*key]
        };
        let Some(dict) = dict else {
            tracing::debug!(key = %self.managed_config_key, "iOS: no managed configuration");
            return Ok(None);
        };

        let mut config = ManagedConfig::new();
        for key in dict.allKeys().iter() {
            // SAFETY: the key was just read from this dictionary.
            if let Some(value) = unsafe { dict.objectForKey(&key) } {
                config.insert(key.to_string(), object_to_config_value(&value));
            }
        }
        tracing::debug!(keys = config.len(), "iOS: read managed configuration");
        Ok(Some(config))
    }
}

// ---------------------------------------------------------------------------
// LockTaskApi: Guided Access (read-only)
// ---------------------------------------------------------------------------

impl LockTaskApi for IosBridge {
    fn lock_capability(&self) -> LockCapability {
        LockCapability::ManualOnly
    }

    fn is_lock_permitted(&self) -> Result<bool> {
        Ok(guided_access_enabled())
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(guided_access_enabled())
    }

    fn start_lock_task(&self) -> Result<()> {
        tracing::warn!("LockTaskApi::start_lock_task has no iOS implementation");
        Err(MdmError::UnsupportedPlatform)
    }

    fn stop_lock_task(&self) -> Result<()> {
        tracing::warn!("LockTaskApi::stop_lock_task has no iOS implementation");
        Err(MdmError::UnsupportedPlatform)
    }
}

// ---------------------------------------------------------------------------
// ObserverRegistrar: NSNotificationCenter
// ---------------------------------------------------------------------------

impl ObserverRegistrar for IosBridge {
    fn register_observer(
        &self,
        kind: EventKind,
        sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>> {
        // SAFETY: reading immutable framework globals.
        let name: &NSString = unsafe {
            match kind {
                EventKind::ConfigurationChanged => NSUserDefaultsDidChangeNotification,
                EventKind::LockStatusChanged => UIAccessibilityGuidedAccessStatusDidChangeNotification,
            }
        };

        let observer = NotificationObserver::new(sink);
        let center = notification_center();
        // SAFETY: addObserver:selector:name:object: with a selector the
        // observer class implements; nil object observes every sender.
        unsafe {
            let _: () = msg_send![
                &center,
                addObserver: &*observer,
                selector: sel!(handleNotification:),
                name: name,
                object: None::<&AnyObject>
            ];
        }
        tracing::info!(kind = %kind, "iOS: notification observer added");
        Ok(Box::new(IosObserverHandle { observer }))
    }
}
