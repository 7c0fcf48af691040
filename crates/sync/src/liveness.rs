use std::sync::{Arc, Mutex, Weak};

use crate::host::{Capabilities, HostSimulation, NetId};
use crate::transport::{Role, Transport};

/// Tracks whether the network layer is alive enough to emit through.
/// The transport is held weakly so a torn-down session reads as
/// inactive instead of keeping dead sockets alive.
#[derive(Default)]
pub struct LivenessMonitor {
    transport: Mutex<Option<Weak<dyn Transport>>>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Weak<dyn Transport>>> {
        self.transport.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attach(&self, transport: Weak<dyn Transport>) {
        *self.slot() = Some(transport);
    }

    pub fn detach(&self) {
        *self.slot() = None;
    }

    /// Strong handle to the transport, if it is still around.
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.slot().as_ref().and_then(Weak::upgrade)
    }

    /// Every uncertainty answers "no": an unattached slot, a dropped
    /// transport, and a stopped one all read as inactive.
    pub fn is_transport_active(&self) -> bool {
        match self.transport() {
            Some(transport) => {
                if !transport.is_running() {
                    return false;
                }
                match transport.role() {
                    Role::Authoritative => true,
                    Role::Participant => transport.sender_alive(),
                }
            }
            None => false,
        }
    }

    /// Gate for emitting an event about `subject`. Checks the link, the
    /// world, and that the subject is present and alive.
    pub fn can_emit(&self, host: &dyn HostSimulation, subject: NetId) -> bool {
        if !self.is_transport_active() {
            return false;
        }
        if !host.world_ready() {
            return false;
        }
        if !host.subject_exists(subject) || !host.subject_alive(subject) {
            return false;
        }
        // A subject claiming our net id but not flagged local is a
        // stale handle from a previous session.
        if host.local_net_id() == Some(subject) && !host.subject_is_local(subject) {
            return false;
        }
        true
    }

    /// Whether periodic observation work should run this tick. A downed
    /// but revivable local subject still ticks so revival state keeps
    /// flowing.
    pub fn should_tick(&self, host: &dyn HostSimulation, caps: Capabilities) -> bool {
        if !self.is_transport_active() || !host.world_ready() {
            return false;
        }
        let Some(local) = host.local_net_id() else {
            return false;
        };
        if !host.subject_exists(local) {
            return false;
        }
        if host.subject_alive(local) {
            return true;
        }
        caps.revival && host.subject_in_revival(local)
    }
}
