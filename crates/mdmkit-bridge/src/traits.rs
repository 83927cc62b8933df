// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native MDM capabilities.
//
// Each platform supplies one type implementing all three capabilities. The
// module facade and the observation bridge are written once against these
// traits.

use std::sync::Arc;

use mdmkit_core::error::Result;
use mdmkit_core::{EventKind, LockCapability, ManagedConfig};

/// Unified bridge that groups all native MDM capabilities.
pub trait PlatformBridge: ManagedConfigStore + LockTaskApi + ObserverRegistrar {
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;
}

/// Read access to the OS-managed configuration store.
pub trait ManagedConfigStore: Send + Sync {
    /// Read the current snapshot.
    ///
    /// Returns `Ok(None)` when the store does not exist on this device or OS
    /// version. An empty store is `Ok(Some(empty))`.
    fn read_configuration(&self) -> Result<Option<ManagedConfig>>;
}

/// App pinning (lock task / kiosk) primitives.
pub trait LockTaskApi: Send + Sync {
    /// What this platform lets code do about app pinning.
    fn lock_capability(&self) -> LockCapability;

    /// Whether policy permits pinning this app. For manual-only platforms,
    /// whether the OS toggle is currently enabled.
    fn is_lock_permitted(&self) -> Result<bool>;

    /// Current pinned state, read fresh from the OS.
    fn is_locked(&self) -> Result<bool>;

    /// Pin the app. Fails with `MdmError::Precondition` when the platform
    /// needs a foreground activity and none is available.
    fn start_lock_task(&self) -> Result<()>;

    /// Unpin the app. Same precondition as [`LockTaskApi::start_lock_task`].
    fn stop_lock_task(&self) -> Result<()>;
}

/// Callback the OS side invokes when something changed.
///
/// It carries no data: notifications are treated as a prompt to re-read the
/// current value, never as the value itself.
pub type NotificationSink = Arc<dyn Fn() + Send + Sync>;

/// Registration with the OS notification / broadcast mechanism.
pub trait ObserverRegistrar: Send + Sync {
    /// Register one OS-level observer for `kind` that calls `sink` on every
    /// notification. The registration stays live until the returned handle
    /// is passed to [`ObserverHandle::unregister`].
    fn register_observer(
        &self,
        kind: EventKind,
        sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>>;
}

/// Ownership token for one live OS observer registration.
pub trait ObserverHandle: Send {
    /// Remove the registration from the OS.
    fn unregister(self: Box<Self>) -> Result<()>;
}
