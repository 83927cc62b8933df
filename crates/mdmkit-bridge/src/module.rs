// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JS-facing module facade.
//
// Every query and command runs on the blocking pool (native calls may attach
// a JNI thread or message UIKit) and resolves to the uniform cross-platform
// contract: "not supported here" becomes `false` / `{}`, and only missing
// host context or a genuine native failure comes back as an error.

use std::sync::Arc;

use tracing::{debug, warn};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{
    EventKind, ListenerId, LockCapability, ManagedConfig, MdmEvent, ModuleConfig,
    ObservationState,
};

use crate::observation::{EventSource, Listener, ObservationBridge};
use crate::traits::{NotificationSink, ObserverHandle, ObserverRegistrar, PlatformBridge};

/// Lets an observation bridge register through the platform object.
struct PlatformRegistrar(Arc<dyn PlatformBridge>);

impl ObserverRegistrar for PlatformRegistrar {
    fn register_observer(
        &self,
        kind: EventKind,
        sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>> {
        self.0.register_observer(kind, sink)
    }
}

/// Read the store, treating a missing store as an empty one.
fn current_configuration(platform: &dyn PlatformBridge) -> Result<ManagedConfig> {
    match platform.read_configuration() {
        Ok(Some(config)) => Ok(config),
        Ok(None) | Err(MdmError::UnsupportedPlatform) => Ok(ManagedConfig::new()),
        Err(e) => Err(e),
    }
}

fn current_lock_state(platform: &dyn PlatformBridge) -> Result<bool> {
    if platform.lock_capability() == LockCapability::Unavailable {
        return Ok(false);
    }
    match platform.is_locked() {
        Err(MdmError::UnsupportedPlatform) => Ok(false),
        other => other,
    }
}

/// The module object the host registers with its JS runtime.
pub struct MdmModule {
    platform: Arc<dyn PlatformBridge>,
    config: ModuleConfig,
    config_changes: ObservationBridge,
    lock_changes: ObservationBridge,
}

impl MdmModule {
    pub fn new(platform: Arc<dyn PlatformBridge>, config: ModuleConfig) -> Self {
        let registrar: Arc<dyn ObserverRegistrar> =
            Arc::new(PlatformRegistrar(Arc::clone(&platform)));

        let reader = Arc::clone(&platform);
        let config_source: EventSource = Arc::new(move || {
            current_configuration(reader.as_ref()).map(MdmEvent::configuration)
        });

        let reader = Arc::clone(&platform);
        let lock_source: EventSource =
            Arc::new(move || current_lock_state(reader.as_ref()).map(MdmEvent::lock_status));

        tracing::info!(
            module = %config.module_name,
            platform = platform.platform_name(),
            "MDM module initialised"
        );

        Self {
            config_changes: ObservationBridge::new(
                EventKind::ConfigurationChanged,
                Arc::clone(&registrar),
                config_source,
            ),
            lock_changes: ObservationBridge::new(EventKind::LockStatusChanged, registrar, lock_source),
            platform,
            config,
        }
    }

    /// Module backed by the bridge for the compilation target.
    pub fn for_current_platform(config: ModuleConfig) -> Self {
        Self::new(crate::platform_bridge(&config), config)
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn platform_name(&self) -> &str {
        self.platform.platform_name()
    }

    /// Whether a non-empty managed configuration is present.
    pub async fn is_supported(&self) -> Result<bool> {
        self.on_platform("isSupported", |p| {
            let supported = match p.read_configuration() {
                Ok(Some(config)) => !config.is_empty(),
                Ok(None) | Err(MdmError::UnsupportedPlatform) => false,
                Err(e) => return Err(e),
            };
            debug!(supported, "isSupported");
            Ok(supported)
        })
        .await
    }

    /// Current managed configuration; `{}` where there is none.
    pub async fn get_configuration(&self) -> Result<ManagedConfig> {
        self.on_platform("getConfiguration", |p| {
            let config = current_configuration(p)?;
            debug!(keys = config.len(), "getConfiguration");
            Ok(config)
        })
        .await
    }

    pub async fn is_app_locking_allowed(&self) -> Result<bool> {
        self.on_platform("isAppLockingAllowed", |p| {
            if p.lock_capability() == LockCapability::Unavailable {
                return Ok(false);
            }
            match p.is_lock_permitted() {
                Err(MdmError::UnsupportedPlatform) => Ok(false),
                other => other,
            }
        })
        .await
    }

    pub async fn is_app_locked(&self) -> Result<bool> {
        self.on_platform("isAppLocked", current_lock_state).await
    }

    /// Pin the app. Resolves `false` when already locked or when the platform
    /// offers no programmatic control; neither case touches the OS pin API.
    pub async fn lock_app(&self) -> Result<bool> {
        self.on_platform("lockApp", |p| {
            if !p.lock_capability().can_toggle() {
                debug!("lockApp: platform has no programmatic lock");
                return Ok(false);
            }
            if p.is_locked()? {
                debug!("lockApp: already locked");
                return Ok(false);
            }
            p.start_lock_task().inspect_err(|e| warn!(error = %e, "lockApp failed"))?;
            Ok(true)
        })
        .await
    }

    /// Unpin the app. Mirror image of [`MdmModule::lock_app`].
    pub async fn unlock_app(&self) -> Result<bool> {
        self.on_platform("unlockApp", |p| {
            if !p.lock_capability().can_toggle() {
                debug!("unlockApp: platform has no programmatic unlock");
                return Ok(false);
            }
            if !p.is_locked()? {
                debug!("unlockApp: not locked");
                return Ok(false);
            }
            p.stop_lock_task().inspect_err(|e| warn!(error = %e, "unlockApp failed"))?;
            Ok(true)
        })
        .await
    }

    /// Subscribe a JS listener. The first listener of a kind starts OS
    /// observation for it.
    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> Result<ListenerId> {
        self.bridge(kind).attach(listener)
    }

    /// Unsubscribe a JS listener. The last listener of a kind stops OS
    /// observation for it. Unknown ids are ignored.
    pub fn remove_listener(&self, kind: EventKind, id: ListenerId) -> Result<()> {
        self.bridge(kind).detach(id)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.bridge(kind).listener_count()
    }

    pub fn observation_state(&self, kind: EventKind) -> ObservationState {
        self.bridge(kind).state()
    }

    /// Forward a change signal received through host plumbing.
    pub fn notify(&self, kind: EventKind) {
        self.bridge(kind).on_os_notification();
    }

    /// Release every OS observer. Both kinds are attempted; the first
    /// failure is returned.
    pub fn shutdown(&self) -> Result<()> {
        EventKind::ALL
            .into_iter()
            .map(|kind| self.bridge(kind).shutdown())
            .fold(Ok(()), |first, next| first.and(next))
    }

    fn bridge(&self, kind: EventKind) -> &ObservationBridge {
        match kind {
            EventKind::ConfigurationChanged => &self.config_changes,
            EventKind::LockStatusChanged => &self.lock_changes,
        }
    }

    async fn on_platform<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PlatformBridge) -> Result<T> + Send + 'static,
    {
        debug!(op, "module call");
        let platform = Arc::clone(&self.platform);
        tokio::task::spawn_blocking(move || f(platform.as_ref()))
            .await
            .map_err(|e| MdmError::Bridge(format!("{op} did not complete: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::fake::FakePlatform;
    use mdmkit_core::ConfigValue;

    fn module(platform: &Arc<FakePlatform>) -> MdmModule {
        MdmModule::new(platform.clone(), ModuleConfig::default())
    }

    #[tokio::test]
    async fn unsupported_store_resolves_empty() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        assert!(!module.is_supported().await.unwrap());
        assert!(module.get_configuration().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_is_not_supported() {
        let platform = FakePlatform::android();
        platform.set_config(Vec::<(String, ConfigValue)>::new());
        let module = module(&platform);
        assert!(!module.is_supported().await.unwrap());
    }

    #[tokio::test]
    async fn configuration_is_read_fresh_each_call() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        platform.set_config([("serverUrl", "https://a")]);
        assert!(module.is_supported().await.unwrap());
        let first = module.get_configuration().await.unwrap();
        platform.set_config([("serverUrl", "https://b")]);
        let second = module.get_configuration().await.unwrap();
        assert_eq!(first.get("serverUrl"), Some(&ConfigValue::from("https://a")));
        assert_eq!(second.get("serverUrl"), Some(&ConfigValue::from("https://b")));
        assert_eq!(platform.config_reads(), 3);
    }

    #[tokio::test]
    async fn lock_when_locked_does_not_call_os() {
        let platform = FakePlatform::android();
        platform.set_locked(true);
        let module = module(&platform);
        assert!(!module.lock_app().await.unwrap());
        assert_eq!(platform.start_calls(), 0);
    }

    #[tokio::test]
    async fn unlock_when_unlocked_does_not_call_os() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        assert!(!module.unlock_app().await.unwrap());
        assert_eq!(platform.stop_calls(), 0);
    }

    #[tokio::test]
    async fn lock_then_unlock_round() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        assert!(module.lock_app().await.unwrap());
        assert!(module.is_app_locked().await.unwrap());
        assert!(module.unlock_app().await.unwrap());
        assert!(!module.is_app_locked().await.unwrap());
        assert_eq!((platform.start_calls(), platform.stop_calls()), (1, 1));
    }

    #[tokio::test]
    async fn lock_without_foreground_is_precondition_error() {
        let platform = FakePlatform::android();
        platform.set_foreground(false);
        let module = module(&platform);
        let err = module.lock_app().await.expect_err("no activity");
        assert!(matches!(err, MdmError::Precondition(_)));

        platform.set_locked(true);
        let err = module.unlock_app().await.expect_err("no activity");
        assert_eq!(err.error_code(), "ERR_PRECONDITION");
    }

    #[tokio::test]
    async fn manual_only_platform_never_pins() {
        let platform = FakePlatform::ios();
        let module = module(&platform);
        for locked in [false, true, false] {
            platform.set_locked(locked);
            assert!(!module.lock_app().await.unwrap());
            assert!(!module.unlock_app().await.unwrap());
        }
        assert_eq!(platform.start_calls(), 0);
        assert_eq!(platform.stop_calls(), 0);
    }

    #[tokio::test]
    async fn manual_only_platform_reports_guided_access() {
        let platform = FakePlatform::ios();
        platform.set_permitted(true);
        platform.set_locked(true);
        let module = module(&platform);
        assert!(module.is_app_locking_allowed().await.unwrap());
        assert!(module.is_app_locked().await.unwrap());
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    #[tokio::test]
    async fn stub_platform_resolves_zero_values() {
        let module = MdmModule::new(Arc::new(crate::stub::StubBridge), ModuleConfig::default());
        assert!(!module.is_supported().await.unwrap());
        assert!(module.get_configuration().await.unwrap().is_empty());
        assert!(!module.is_app_locking_allowed().await.unwrap());
        assert!(!module.is_app_locked().await.unwrap());
        assert!(!module.lock_app().await.unwrap());
        assert!(!module.unlock_app().await.unwrap());
    }

    #[test]
    fn lock_events_carry_fresh_state() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = module
            .add_listener(
                EventKind::LockStatusChanged,
                Arc::new(move |e: &MdmEvent| sink.lock().unwrap().push(e.clone())),
            )
            .expect("attach");

        platform.set_locked(true);
        platform.fire(EventKind::LockStatusChanged);
        assert_eq!(*seen.lock().unwrap(), vec![MdmEvent::lock_status(true)]);

        module.remove_listener(EventKind::LockStatusChanged, id).expect("detach");
        platform.fire(EventKind::LockStatusChanged);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn event_kinds_are_observed_independently() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        let id = module
            .add_listener(EventKind::ConfigurationChanged, Arc::new(|_: &MdmEvent| {}))
            .expect("attach");
        assert!(module.observation_state(EventKind::ConfigurationChanged).is_active());
        assert_eq!(
            module.observation_state(EventKind::LockStatusChanged),
            ObservationState::Idle
        );
        module
            .remove_listener(EventKind::LockStatusChanged, id)
            .expect("wrong kind is a no-op");
        assert_eq!(module.listener_count(EventKind::ConfigurationChanged), 1);

        module.shutdown().expect("shutdown");
        assert_eq!(platform.live_observers(), 0);
    }

    #[test]
    fn shutdown_releases_every_kind() {
        let platform = FakePlatform::android();
        let module = module(&platform);
        for kind in EventKind::ALL {
            module.add_listener(kind, Arc::new(|_: &MdmEvent| {})).expect("attach");
        }
        assert_eq!(platform.live_observers(), 2);

        module.shutdown().expect("shutdown");
        assert_eq!(platform.live_observers(), 0);
        assert_eq!(platform.unregister_calls(), 2);
        for kind in EventKind::ALL {
            assert_eq!(module.listener_count(kind), 0);
        }
    }
}
