// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Refcounted multiplexing of JS listeners onto a single OS observer.
//
// One `ObservationBridge` exists per event kind. The first attached listener
// registers exactly one observer with the OS; the last detached listener
// releases it. OS notifications are treated as "something changed" prompts:
// the bridge re-reads the current value through its event source and fans
// the typed event out to every listener in attach order.
//
// The listener list, the observer handle and the registration generation
// live behind one mutex, so attach, detach and notification delivery never
// interleave. Listener callbacks run after that lock is released, under a
// second dispatch lock that keeps concurrent notifications from overtaking
// each other between the re-read and the fan-out.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{EventKind, ListenerId, MdmEvent, ObservationState};

use crate::traits::{NotificationSink, ObserverHandle, ObserverRegistrar};

/// A JS-side listener.
pub type Listener = Arc<dyn Fn(&MdmEvent) + Send + Sync>;

/// Re-derives the current value whenever the OS signals a change.
pub type EventSource = Arc<dyn Fn() -> Result<MdmEvent> + Send + Sync>;

struct Shared {
    listeners: Vec<(ListenerId, Listener)>,
    /// Live OS registration. `Some` exactly when `listeners` is non-empty.
    handle: Option<Box<dyn ObserverHandle>>,
    /// Bumped on every registration so notifications from a released
    /// observer can be told apart from the current one.
    generation: u64,
    degraded: Option<(String, DateTime<Utc>)>,
}

impl Shared {
    fn state(&self) -> ObservationState {
        if !self.listeners.is_empty() {
            ObservationState::Active {
                listeners: self.listeners.len(),
            }
        } else if let Some((reason, since)) = &self.degraded {
            ObservationState::Degraded {
                reason: reason.clone(),
                since: *since,
            }
        } else {
            ObservationState::Idle
        }
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn registration_error(e: MdmError) -> MdmError {
    match e {
        MdmError::ObserverRegistration(_) => e,
        other => MdmError::ObserverRegistration(other.to_string()),
    }
}

/// Observer lifecycle for one event kind.
///
/// Registrars must not call the notification sink synchronously from inside
/// `register_observer`; the bridge holds its lock for the duration of that
/// call. Likewise a listener must not trigger another notification of the
/// same kind from inside its callback.
pub struct ObservationBridge {
    kind: EventKind,
    registrar: Arc<dyn ObserverRegistrar>,
    source: EventSource,
    shared: Arc<Mutex<Shared>>,
    /// Held from the generation check through the last listener call.
    dispatch: Arc<Mutex<()>>,
}

impl ObservationBridge {
    pub fn new(kind: EventKind, registrar: Arc<dyn ObserverRegistrar>, source: EventSource) -> Self {
        Self {
            kind,
            registrar,
            source,
            shared: Arc::new(Mutex::new(Shared {
                listeners: Vec::new(),
                handle: None,
                generation: 0,
                degraded: None,
            })),
            dispatch: Arc::new(Mutex::new(())),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Attach a listener, registering the OS observer if it is the first.
    ///
    /// A failed registration leaves the bridge degraded with no listeners;
    /// calling `attach` again retries.
    pub fn attach(&self, listener: Listener) -> Result<ListenerId> {
        let mut shared = lock_shared(&self.shared);

        if shared.listeners.is_empty() {
            shared.generation += 1;
            let sink = self.sink(shared.generation);
            match self.registrar.register_observer(self.kind, sink) {
                Ok(handle) => {
                    info!(kind = %self.kind, "registered OS observer");
                    shared.handle = Some(handle);
                    shared.degraded = None;
                }
                Err(e) => {
                    error!(kind = %self.kind, error = %e, "OS observer registration failed");
                    shared.degraded = Some((e.to_string(), Utc::now()));
                    return Err(registration_error(e));
                }
            }
        }

        let id = ListenerId::new();
        shared.listeners.push((id, listener));
        debug!(kind = %self.kind, listener = %id, listeners = shared.listeners.len(), "listener attached");
        Ok(id)
    }

    /// Detach a listener, releasing the OS observer if it was the last.
    ///
    /// Unknown ids (already detached, or never attached) are ignored.
    pub fn detach(&self, id: ListenerId) -> Result<()> {
        let mut shared = lock_shared(&self.shared);

        let Some(pos) = shared.listeners.iter().position(|(lid, _)| *lid == id) else {
            debug!(kind = %self.kind, listener = %id, "detach of unknown listener ignored");
            return Ok(());
        };
        shared.listeners.remove(pos);
        debug!(kind = %self.kind, listener = %id, listeners = shared.listeners.len(), "listener detached");

        if shared.listeners.is_empty() {
            Self::release(self.kind, &mut shared)?;
        }
        Ok(())
    }

    /// Drop every listener and release the OS observer.
    pub fn shutdown(&self) -> Result<()> {
        let mut shared = lock_shared(&self.shared);
        if !shared.listeners.is_empty() {
            debug!(kind = %self.kind, listeners = shared.listeners.len(), "shutting down observation");
        }
        shared.listeners.clear();
        Self::release(self.kind, &mut shared)
    }

    /// Deliver an OS change signal as if it came from the live observer.
    ///
    /// Hosts that receive notifications through their own plumbing call this
    /// directly. With no listeners attached the signal is discarded.
    pub fn on_os_notification(&self) {
        let generation = lock_shared(&self.shared).generation;
        deliver(&self.dispatch, &self.shared, generation, self.kind, &self.source);
    }

    pub fn listener_count(&self) -> usize {
        lock_shared(&self.shared).listeners.len()
    }

    pub fn is_observing(&self) -> bool {
        lock_shared(&self.shared).handle.is_some()
    }

    pub fn state(&self) -> ObservationState {
        lock_shared(&self.shared).state()
    }

    fn sink(&self, generation: u64) -> NotificationSink {
        let shared: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        let dispatch = Arc::clone(&self.dispatch);
        let source = Arc::clone(&self.source);
        let kind = self.kind;
        Arc::new(move || {
            if let Some(shared) = shared.upgrade() {
                deliver(&dispatch, &shared, generation, kind, &source);
            }
        })
    }

    fn release(kind: EventKind, shared: &mut Shared) -> Result<()> {
        let Some(handle) = shared.handle.take() else {
            return Ok(());
        };
        match handle.unregister() {
            Ok(()) => {
                info!(kind = %kind, "released OS observer");
                shared.degraded = None;
                Ok(())
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "OS observer unregistration failed");
                shared.degraded = Some((e.to_string(), Utc::now()));
                Err(registration_error(e))
            }
        }
    }
}

impl Drop for ObservationBridge {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(kind = %self.kind, error = %e, "observer teardown failed");
        }
    }
}

fn deliver(
    dispatch: &Mutex<()>,
    shared: &Mutex<Shared>,
    generation: u64,
    kind: EventKind,
    source: &EventSource,
) {
    let _dispatching = dispatch.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let listeners: Vec<Listener> = {
        let shared = lock_shared(shared);
        if shared.generation != generation || shared.handle.is_none() {
            debug!(kind = %kind, "notification from released observer discarded");
            return;
        }
        if shared.listeners.is_empty() {
            debug!(kind = %kind, "notification with no listeners discarded");
            return;
        }
        shared.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    };

    let event = match source() {
        Ok(event) => event,
        Err(e) => {
            warn!(kind = %kind, error = %e, "failed to re-read value after OS notification");
            return;
        }
    };

    debug!(kind = %kind, listeners = listeners.len(), "dispatching event");
    for listener in listeners {
        listener(&event);
    }
}
