// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory platform used by the unit tests. Records every call into the
// "OS" so tests can assert what was and was not invoked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, EventKind, LockCapability, ManagedConfig};

use crate::traits::*;

#[derive(Default)]
struct FakeState {
    config: Option<ManagedConfig>,
    locked: bool,
    permitted: bool,
    has_foreground: bool,
    config_reads: usize,
    start_calls: usize,
    stop_calls: usize,
    register_calls: usize,
    unregister_calls: usize,
    fail_registration: Option<String>,
    sinks: HashMap<EventKind, NotificationSink>,
}

pub(crate) struct FakePlatform {
    name: &'static str,
    capability: LockCapability,
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    fn with(name: &'static str, capability: LockCapability) -> Arc<Self> {
        Arc::new(Self {
            name,
            capability,
            state: Arc::new(Mutex::new(FakeState {
                has_foreground: true,
                ..FakeState::default()
            })),
        })
    }

    pub fn android() -> Arc<Self> {
        Self::with("Android (fake)", LockCapability::Programmatic)
    }

    pub fn ios() -> Arc<Self> {
        Self::with("iOS (fake)", LockCapability::ManualOnly)
    }

    pub fn set_config<K: Into<String>, V: Into<ConfigValue>>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) {
        self.state.lock().unwrap().config = Some(entries.into_iter().collect());
    }

    pub fn set_locked(&self, locked: bool) {
        self.state.lock().unwrap().locked = locked;
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.state.lock().unwrap().permitted = permitted;
    }

    pub fn set_foreground(&self, present: bool) {
        self.state.lock().unwrap().has_foreground = present;
    }

    pub fn fail_next_registration(&self, reason: &str) {
        self.state.lock().unwrap().fail_registration = Some(reason.into());
    }

    /// Simulate the OS posting a change notification.
    pub fn fire(&self, kind: EventKind) {
        let sink = self.sink(kind);
        if let Some(sink) = sink {
            sink();
        }
    }

    pub fn sink(&self, kind: EventKind) -> Option<NotificationSink> {
        self.state.lock().unwrap().sinks.get(&kind).cloned()
    }

    pub fn live_observers(&self) -> usize {
        self.state.lock().unwrap().sinks.len()
    }

    pub fn config_reads(&self) -> usize {
        self.state.lock().unwrap().config_reads
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn register_calls(&self) -> usize {
        self.state.lock().unwrap().register_calls
    }

    pub fn unregister_calls(&self) -> usize {
        self.state.lock().unwrap().unregister_calls
    }
}

impl PlatformBridge for FakePlatform {
    fn platform_name(&self) -> &str {
        self.name
    }
}

impl ManagedConfigStore for FakePlatform {
    fn read_configuration(&self) -> Result<Option<ManagedConfig>> {
        let mut state = self.state.lock().unwrap();
        state.config_reads += 1;
        Ok(state.config.clone())
    }
}

impl LockTaskApi for FakePlatform {
    fn lock_capability(&self) -> LockCapability {
        self.capability
    }

    fn is_lock_permitted(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().permitted)
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().locked)
    }

    fn start_lock_task(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.start_calls += 1;
        if !state.has_foreground {
            return Err(MdmError::Precondition("Activity is null".into()));
        }
        state.locked = true;
        Ok(())
    }

    fn stop_lock_task(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        if !state.has_foreground {
            return Err(MdmError::Precondition("Activity is null".into()));
        }
        state.locked = false;
        Ok(())
    }
}

impl ObserverRegistrar for FakePlatform {
    fn register_observer(
        &self,
        kind: EventKind,
        sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>> {
        let mut state = self.state.lock().unwrap();
        state.register_calls += 1;
        if let Some(reason) = state.fail_registration.take() {
            return Err(MdmError::Bridge(reason));
        }
        assert!(
            state.sinks.insert(kind, sink).is_none(),
            "second OS observer registered for {kind}"
        );
        Ok(Box::new(FakeHandle {
            kind,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeHandle {
    kind: EventKind,
    state: Arc<Mutex<FakeState>>,
}

impl ObserverHandle for FakeHandle {
    fn unregister(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.unregister_calls += 1;
        state.sinks.remove(&self.kind);
        Ok(())
    }
}
