//! Session lifecycle, outbound emission, and inbound dispatch. One
//! [`SyncRouter`] lives for the whole process; transports come and go
//! with each session.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use log::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::dedupe::{AppliedKey, AppliedSet};
use crate::host::{Capabilities, CapabilityProbe, ConditionClass, HostSimulation, NetId, ScalarField};
use crate::liveness::LivenessMonitor;
use crate::pipeline::{ApplyResult, apply_event};
use crate::protocol::{SyncCategory, SyncEvent, SyncMessage};
use crate::transport::{Delivery, PeerId, Role, Transport};
use crate::validate::{fix_forward_resource, fix_forward_weight};
use crate::wire::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// No role, no transport. Nothing flows.
    Uninitialized,
    /// Role and capabilities are known; waiting for a session.
    Registered,
    /// A session is live and events flow both ways.
    Active,
}

pub struct SyncRouter {
    state: Mutex<RouterState>,
    role: Mutex<Option<Role>>,
    caps: Mutex<Capabilities>,
    config: SyncConfig,
    liveness: LivenessMonitor,
    applied: AppliedSet,
    // Condition classes are stable for a session, so answers are cached
    // per (quest, condition) pair. Cleared with the applied set.
    class_cache: Mutex<HashMap<(String, String), ConditionClass>>,
}

impl SyncRouter {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            state: Mutex::new(RouterState::Uninitialized),
            role: Mutex::new(None),
            caps: Mutex::new(Capabilities::default()),
            config,
            liveness: LivenessMonitor::new(),
            applied: AppliedSet::new(),
            class_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> RouterState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn role(&self) -> Option<Role> {
        *self.role.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capabilities(&self) -> Capabilities {
        *self.caps.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn applied(&self) -> &AppliedSet {
        &self.applied
    }

    fn set_state(&self, next: RouterState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// One-time setup: fixes the role and probes capabilities. Repeat
    /// calls are ignored so a reconnect cannot flip the role mid-run.
    pub fn register(&self, role: Role, transport: Weak<dyn Transport>, probe: &dyn CapabilityProbe) {
        if self.state() != RouterState::Uninitialized {
            warn!("register called twice, keeping existing role {:?}", self.role());
            return;
        }
        let caps = probe.detect();
        *self.role.lock().unwrap_or_else(|e| e.into_inner()) = Some(role);
        *self.caps.lock().unwrap_or_else(|e| e.into_inner()) = caps;
        self.liveness.attach(transport);
        self.set_state(RouterState::Registered);
        info!(
            "registered as {:?} (extended_quests={}, revival={})",
            role, caps.extended_quests, caps.revival
        );
    }

    /// Swaps in the transport for a new session without re-probing.
    pub fn attach_transport(&self, transport: Weak<dyn Transport>) {
        self.liveness.attach(transport);
    }

    pub fn session_ready(&self) {
        if self.state() == RouterState::Registered {
            self.set_state(RouterState::Active);
            info!("session ready, sync active");
        }
    }

    /// Tears down session state: the applied set and classification
    /// cache are cleared and the transport detached. The role survives
    /// for the next session.
    pub fn session_ended(&self) {
        self.applied.reset();
        self.class_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.liveness.detach();
        if self.state() == RouterState::Active {
            self.set_state(RouterState::Registered);
        }
        info!("session ended, sync state cleared");
    }

    /// Decodes and applies one inbound frame. On the authoritative side
    /// the identical frame is relayed to every other peer, whatever the
    /// local apply outcome, so a locally missing subject does not stall
    /// propagation.
    pub fn handle_frame(
        &self,
        host: &mut dyn HostSimulation,
        frame: &[u8],
        from: PeerId,
    ) -> Result<ApplyResult, WireError> {
        let msg = match SyncMessage::decode(frame) {
            Ok(msg) => msg,
            Err(err) => {
                error!("dropping frame from peer {from}: {err}");
                return Err(err);
            }
        };

        let result = apply_event(host, &self.applied, &self.config, self.capabilities(), &msg);

        if self.role() == Some(Role::Authoritative) {
            if let Some(transport) = self.liveness.transport() {
                if let Err(err) = transport.broadcast(frame, Delivery::ReliableOrdered, Some(from))
                {
                    warn!("relay of {:?} failed: {err}", msg.event.kind());
                }
            }
        }

        Ok(result)
    }

    fn allowed_by_config(&self, category: SyncCategory) -> bool {
        match category {
            SyncCategory::Health => self.config.health_sync,
            SyncCategory::Quest => self.config.quest_sync && self.capabilities().extended_quests,
        }
    }

    /// Emits a message toward the rest of the session. Returns whether
    /// a frame actually left. Suppression is silent apart from a debug
    /// line; callers never treat it as an error.
    pub fn emit(&self, host: &dyn HostSimulation, msg: &SyncMessage) -> bool {
        if self.state() != RouterState::Active {
            debug!("suppressed {:?}: no active session", msg.event.kind());
            return false;
        }
        if !self.allowed_by_config(msg.event.category()) {
            debug!("suppressed {:?}: category disabled", msg.event.kind());
            return false;
        }
        if !self.liveness.can_emit(host, msg.net_id) {
            debug!("suppressed {:?}: emission gate closed", msg.event.kind());
            return false;
        }
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!("could not encode {:?}: {err}", msg.event.kind());
                return false;
            }
        };
        let Some(transport) = self.liveness.transport() else {
            return false;
        };
        let sent = match transport.role() {
            Role::Authoritative => transport.broadcast(&frame, Delivery::ReliableOrdered, None),
            Role::Participant => transport.send(&frame, Delivery::ReliableOrdered),
        };
        match sent {
            Ok(()) => true,
            Err(err) => {
                warn!("send of {:?} failed: {err}", msg.event.kind());
                false
            }
        }
    }

    /// Local observation hook: a quest condition advanced. Resolves the
    /// owning quest, filters vanilla conditions when configured to, and
    /// goes quiet once the condition has completed. Plain progress never
    /// marks the applied set, so successive increments keep flowing.
    pub fn observe_condition_progress(
        &self,
        host: &dyn HostSimulation,
        condition_id: &str,
        current_value: i32,
    ) -> bool {
        if !self.capabilities().extended_quests || !self.config.quest_sync {
            return false;
        }
        let Some(local) = host.local_net_id() else {
            return false;
        };
        let Some(quest_id) = host.quest_for_condition(condition_id) else {
            warn!("no quest owns condition {condition_id}, not sharing progress");
            return false;
        };
        if self.config.extended_conditions_only
            && self.classify(host, &quest_id, condition_id) == ConditionClass::Vanilla
        {
            debug!("condition {condition_id} is vanilla, not sharing progress");
            return false;
        }
        // Only completion (or an inbound receipt) marks the key.
        let key = AppliedKey::condition(local, &quest_id, condition_id);
        if self.applied.already_applied(&key) {
            debug!("condition {condition_id} already synchronized");
            return false;
        }
        self.emit(
            host,
            &SyncMessage::new(
                local,
                SyncEvent::QuestConditionProgress {
                    quest_id,
                    condition_id: condition_id.to_owned(),
                    current_value,
                    completed: false,
                },
            ),
        )
    }

    /// A condition completed locally. Completion always goes out, even
    /// for classes the progress filter would drop.
    pub fn observe_condition_completed(
        &self,
        host: &dyn HostSimulation,
        quest_id: &str,
        condition_id: &str,
        current_value: i32,
    ) -> bool {
        if !self.capabilities().extended_quests || !self.config.quest_sync {
            return false;
        }
        let Some(local) = host.local_net_id() else {
            return false;
        };
        self.applied
            .mark_applied(AppliedKey::condition(local, quest_id, condition_id));
        self.emit(
            host,
            &SyncMessage::new(
                local,
                SyncEvent::QuestConditionProgress {
                    quest_id: quest_id.to_owned(),
                    condition_id: condition_id.to_owned(),
                    current_value,
                    completed: true,
                },
            ),
        )
    }

    /// A med item was consumed locally. Reads the post-use resource off
    /// the item, repairing a corrupt reading in place before it goes
    /// out.
    pub fn observe_med_item_used(
        &self,
        host: &mut dyn HostSimulation,
        item_id: &str,
        body_part: u8,
    ) -> bool {
        if !self.config.health_sync {
            return false;
        }
        let Some(local) = host.local_net_id() else {
            return false;
        };
        let Some(resource_value) = self.repaired_resource(host, local, item_id) else {
            return false;
        };
        self.emit(
            host,
            &SyncMessage::new(
                local,
                SyncEvent::UseMedItem {
                    item_id: item_id.to_owned(),
                    body_part,
                    resource_value,
                    amount: 1.0,
                },
            ),
        )
    }

    /// An item's charge pool changed locally.
    pub fn observe_med_charges(&self, host: &mut dyn HostSimulation, item_id: &str) -> bool {
        if !self.config.health_sync {
            return false;
        }
        let Some(local) = host.local_net_id() else {
            return false;
        };
        let Some(new_charge_value) = self.repaired_resource(host, local, item_id) else {
            return false;
        };
        self.emit(
            host,
            &SyncMessage::new(
                local,
                SyncEvent::UpdateCharges {
                    item_id: item_id.to_owned(),
                    new_charge_value,
                },
            ),
        )
    }

    /// Repairs a corrupt weight reading in host state. Purely local,
    /// nothing is emitted.
    pub fn sanitize_item_weight(
        &self,
        host: &mut dyn HostSimulation,
        subject: NetId,
        item_id: &str,
    ) {
        let Some(weight) = host.item_scalar(subject, item_id, ScalarField::Weight) else {
            return;
        };
        let (fixed, changed) = fix_forward_weight(weight);
        if changed {
            warn!("item {item_id} weight {weight} repaired to {fixed}");
            host.set_item_scalar(subject, item_id, ScalarField::Weight, fixed);
        }
    }

    fn repaired_resource(
        &self,
        host: &mut dyn HostSimulation,
        subject: NetId,
        item_id: &str,
    ) -> Option<f32> {
        let value = host.item_scalar(subject, item_id, ScalarField::HpResource)?;
        let (fixed, changed) = fix_forward_resource(value);
        if changed {
            warn!("item {item_id} resource {value} repaired to {fixed}");
            host.set_item_scalar(subject, item_id, ScalarField::HpResource, fixed);
        }
        Some(fixed)
    }

    fn classify(
        &self,
        host: &dyn HostSimulation,
        quest_id: &str,
        condition_id: &str,
    ) -> ConditionClass {
        let key = (quest_id.to_owned(), condition_id.to_owned());
        let mut cache = self.class_cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(class) = cache.get(&key) {
            return *class;
        }
        let class = host
            .condition_class(quest_id, condition_id)
            .or_else(|| {
                host.condition_type_name(quest_id, condition_id)
                    .map(|name| ConditionClass::guess_from_type_name(&name))
            })
            .unwrap_or(ConditionClass::Vanilla);
        cache.insert(key, class);
        class
    }

    /// Whether periodic observers should run this tick.
    pub fn should_tick(&self, host: &dyn HostSimulation) -> bool {
        self.state() == RouterState::Active && self.liveness.should_tick(host, self.capabilities())
    }
}
