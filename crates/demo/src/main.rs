//! In-process walkthrough of a sync session: one authoritative peer,
//! a few participants, and an in-memory hub standing in for the
//! network. Run with RUST_LOG=debug to watch the apply pipeline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use log::info;

use raidsync::{
    ApplyResult, Capabilities, CapabilityProbe, ConditionClass, Delivery, EffectSpec,
    HostSimulation, NetId, PeerId, Role, ScalarField, SyncConfig, SyncRouter, Transport,
    TransportError,
};

#[derive(Parser)]
#[command(name = "raidsync-demo")]
#[command(about = "In-process raidsync session walkthrough")]
struct Args {
    #[arg(short, long, default_value_t = 2)]
    participants: usize,

    #[arg(long, help = "Disable quest condition sharing")]
    no_quest_sync: bool,
}

const HOST_PEER: PeerId = 0;

/// Frame switchboard shared by every peer. Each inbox holds
/// (origin, frame) pairs waiting to be pumped.
struct Hub {
    running: AtomicBool,
    inboxes: Mutex<HashMap<PeerId, VecDeque<(PeerId, Vec<u8>)>>>,
}

impl Hub {
    fn new(peers: &[PeerId]) -> Arc<Self> {
        let inboxes = peers.iter().map(|p| (*p, VecDeque::new())).collect();
        Arc::new(Self {
            running: AtomicBool::new(true),
            inboxes: Mutex::new(inboxes),
        })
    }

    fn deliver(&self, to: PeerId, from: PeerId, frame: &[u8]) {
        let mut inboxes = self.inboxes.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(queue) = inboxes.get_mut(&to) {
            queue.push_back((from, frame.to_vec()));
        }
    }

    fn drain(&self, peer: PeerId) -> Vec<(PeerId, Vec<u8>)> {
        let mut inboxes = self.inboxes.lock().unwrap_or_else(|e| e.into_inner());
        inboxes
            .get_mut(&peer)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

struct HubTransport {
    hub: Arc<Hub>,
    peer: PeerId,
    role: Role,
}

impl Transport for HubTransport {
    fn role(&self) -> Role {
        self.role
    }

    fn is_running(&self) -> bool {
        self.hub.running.load(Ordering::SeqCst)
    }

    fn send(&self, frame: &[u8], _delivery: Delivery) -> Result<(), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        self.hub.deliver(HOST_PEER, self.peer, frame);
        Ok(())
    }

    fn broadcast(
        &self,
        frame: &[u8],
        _delivery: Delivery,
        exclude: Option<PeerId>,
    ) -> Result<(), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        let peers: Vec<PeerId> = {
            let inboxes = self.hub.inboxes.lock().unwrap_or_else(|e| e.into_inner());
            inboxes.keys().copied().collect()
        };
        for to in peers {
            if to == self.peer || Some(to) == exclude {
                continue;
            }
            self.hub.deliver(to, self.peer, frame);
        }
        Ok(())
    }
}

/// Toy world state: every peer knows every subject and their items.
struct DemoWorld {
    local: NetId,
    subjects: HashSet<NetId>,
    items: HashMap<(NetId, String), f32>,
    conditions: HashMap<(String, String), (i32, bool)>,
}

impl DemoWorld {
    fn new(local: NetId, all_subjects: &[NetId]) -> Self {
        let mut items = HashMap::new();
        for &subject in all_subjects {
            items.insert((subject, "salewa".to_owned()), 400.0);
            items.insert((subject, "ifak".to_owned()), 300.0);
        }
        let mut conditions = HashMap::new();
        conditions.insert(("quest_shoreline".to_owned(), "cond_keys".to_owned()), (0, false));
        Self {
            local,
            subjects: all_subjects.iter().copied().collect(),
            items,
            conditions,
        }
    }
}

impl HostSimulation for DemoWorld {
    fn world_ready(&self) -> bool {
        true
    }
    fn local_net_id(&self) -> Option<NetId> {
        Some(self.local)
    }
    fn subject_exists(&self, net_id: NetId) -> bool {
        self.subjects.contains(&net_id)
    }
    fn subject_alive(&self, net_id: NetId) -> bool {
        self.subjects.contains(&net_id)
    }
    fn subject_is_local(&self, net_id: NetId) -> bool {
        net_id == self.local
    }
    fn has_item(&self, net_id: NetId, item_id: &str) -> bool {
        self.items.contains_key(&(net_id, item_id.to_owned()))
    }
    fn item_scalar(&self, net_id: NetId, item_id: &str, field: ScalarField) -> Option<f32> {
        match field {
            ScalarField::HpResource => self.items.get(&(net_id, item_id.to_owned())).copied(),
            ScalarField::Weight => None,
        }
    }
    fn set_item_scalar(
        &mut self,
        net_id: NetId,
        item_id: &str,
        field: ScalarField,
        value: f32,
    ) -> bool {
        if field != ScalarField::HpResource {
            return false;
        }
        match self.items.get_mut(&(net_id, item_id.to_owned())) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
    fn apply_effect(&mut self, net_id: NetId, spec: &EffectSpec) -> bool {
        info!(
            "world {}: effect {} on subject {} part {}",
            self.local, spec.effect_type, net_id, spec.body_part
        );
        true
    }
    fn remove_effect(&mut self, _net_id: NetId, _effect_type: &str, _body_part: u8) -> bool {
        true
    }
    fn apply_tourniquet(
        &mut self,
        net_id: NetId,
        body_part: u8,
        _damage_rate: f32,
        _delay_ticks: i32,
    ) -> bool {
        info!(
            "world {}: tourniquet on subject {} part {}",
            self.local, net_id, body_part
        );
        true
    }
    fn apply_surgery(
        &mut self,
        net_id: NetId,
        body_part: u8,
        _tick_rate: f32,
        _regen_limit_factor: f32,
        _delay_ticks: i32,
    ) -> bool {
        info!(
            "world {}: surgery on subject {} part {}",
            self.local, net_id, body_part
        );
        true
    }
    fn has_condition(&self, quest_id: &str, condition_id: &str) -> bool {
        self.conditions
            .contains_key(&(quest_id.to_owned(), condition_id.to_owned()))
    }
    fn set_condition_progress(
        &mut self,
        quest_id: &str,
        condition_id: &str,
        current_value: i32,
        completed: bool,
    ) -> bool {
        match self
            .conditions
            .get_mut(&(quest_id.to_owned(), condition_id.to_owned()))
        {
            Some(slot) => {
                *slot = (current_value, completed);
                true
            }
            None => false,
        }
    }
    fn quest_for_condition(&self, condition_id: &str) -> Option<String> {
        self.conditions
            .keys()
            .find(|(_, c)| c == condition_id)
            .map(|(q, _)| q.clone())
    }
    fn condition_class(&self, _quest_id: &str, _condition_id: &str) -> Option<ConditionClass> {
        Some(ConditionClass::Extended)
    }
}

struct DemoProbe;

impl CapabilityProbe for DemoProbe {
    fn detect(&self) -> Capabilities {
        Capabilities {
            extended_quests: true,
            revival: false,
        }
    }
}

struct Peer {
    id: PeerId,
    router: SyncRouter,
    world: DemoWorld,
    // Owned strongly here; the router only holds it weakly.
    _transport: Arc<HubTransport>,
}

impl Peer {
    fn new(id: PeerId, hub: &Arc<Hub>, config: SyncConfig, all_subjects: &[NetId]) -> Self {
        let role = if id == HOST_PEER {
            Role::Authoritative
        } else {
            Role::Participant
        };
        let transport = Arc::new(HubTransport {
            hub: Arc::clone(hub),
            peer: id,
            role,
        });
        let router = SyncRouter::new(config);
        router.register(
            role,
            Arc::downgrade(&transport) as std::sync::Weak<dyn Transport>,
            &DemoProbe,
        );
        router.session_ready();
        Self {
            id,
            router,
            world: DemoWorld::new(id as NetId + 1, all_subjects),
            _transport: transport,
        }
    }
}

/// Delivers queued frames until the hub goes quiet.
fn pump(hub: &Arc<Hub>, peers: &mut [Peer]) {
    loop {
        let mut moved = false;
        for i in 0..peers.len() {
            let id = peers[i].id;
            for (from, frame) in hub.drain(id) {
                moved = true;
                let peer = &mut peers[i];
                match peer.router.handle_frame(&mut peer.world, &frame, from) {
                    Ok(result) => {
                        if !matches!(result, ApplyResult::Applied) {
                            info!("peer {id}: frame from {from} -> {result:?}");
                        }
                    }
                    Err(err) => info!("peer {id}: bad frame from {from}: {err}"),
                }
            }
        }
        if !moved {
            break;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = SyncConfig {
        quest_sync: !args.no_quest_sync,
        ..SyncConfig::default()
    };

    let participants = args.participants.max(1);
    let peer_ids: Vec<PeerId> = (0..=participants as PeerId).collect();
    let all_subjects: Vec<NetId> = peer_ids.iter().map(|&id| id as NetId + 1).collect();
    let hub = Hub::new(&peer_ids);

    let mut peers: Vec<Peer> = peer_ids
        .iter()
        .map(|&id| Peer::new(id, &hub, config, &all_subjects))
        .collect();

    info!(
        "session up: 1 authoritative peer, {} participant(s)",
        participants
    );

    // Participant 1 uses a med item; everyone should converge on the
    // drained resource value.
    let user = &mut peers[1];
    let subject = user.world.local;
    user.world
        .items
        .insert((subject, "salewa".to_owned()), 45.0);
    user.router.observe_med_item_used(&mut user.world, "salewa", 3);
    pump(&hub, &mut peers);

    for peer in &peers {
        let value = peer.world.items[&(subject, "salewa".to_owned())];
        info!("peer {}: subject {subject} salewa resource = {value}", peer.id);
    }

    // Charge pool change from the authoritative side.
    let host = &mut peers[0];
    let host_subject = host.world.local;
    host.world
        .items
        .insert((host_subject, "ifak".to_owned()), 120.0);
    host.router.observe_med_charges(&mut host.world, "ifak");
    pump(&hub, &mut peers);

    // Quest progress, emitted twice. The duplicate is suppressed at
    // the source and the relayed echo never re-applies.
    let user = &mut peers[1];
    user.router
        .observe_condition_progress(&user.world, "cond_keys", 3);
    user.router
        .observe_condition_progress(&user.world, "cond_keys", 3);
    pump(&hub, &mut peers);

    for peer in &peers {
        let progress =
            peer.world.conditions[&("quest_shoreline".to_owned(), "cond_keys".to_owned())];
        info!("peer {}: cond_keys progress = {progress:?}", peer.id);
    }

    // Tear the session down; further observations go nowhere.
    hub.shutdown();
    for peer in &peers {
        peer.router.session_ended();
    }
    let user = &mut peers[1];
    let sent = user
        .router
        .observe_med_item_used(&mut user.world, "salewa", 3);
    info!("post-shutdown emission attempted, sent = {sent}");

    Ok(())
}
