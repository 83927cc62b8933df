// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for web, desktop and CI builds where MDM does not exist.
//
// Queries answer with zero values instead of failing, so the module facade
// resolves `false` / `{}` exactly as it does on a phone with no MDM profile.

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{EventKind, LockCapability, ManagedConfig};

use crate::traits::*;

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl ManagedConfigStore for StubBridge {
    fn read_configuration(&self) -> Result<Option<ManagedConfig>> {
        Ok(None)
    }
}

impl LockTaskApi for StubBridge {
    fn lock_capability(&self) -> LockCapability {
        LockCapability::Unavailable
    }

    fn is_lock_permitted(&self) -> Result<bool> {
        Ok(false)
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(false)
    }

    fn start_lock_task(&self) -> Result<()> {
        tracing::warn!("LockTaskApi::start_lock_task called on stub bridge");
        Err(MdmError::UnsupportedPlatform)
    }

    fn stop_lock_task(&self) -> Result<()> {
        tracing::warn!("LockTaskApi::stop_lock_task called on stub bridge");
        Err(MdmError::UnsupportedPlatform)
    }
}

impl ObserverRegistrar for StubBridge {
    /// Nothing ever changes here, so the observer never fires.
    fn register_observer(
        &self,
        kind: EventKind,
        _sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>> {
        tracing::debug!(kind = %kind, "stub observer registered");
        Ok(Box::new(StubHandle))
    }
}

struct StubHandle;

impl ObserverHandle for StubHandle {
    fn unregister(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
