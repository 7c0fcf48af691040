//! Co-op session state synchronization for raid-style multiplayer.
//!
//! Health and quest events observed on one peer are encoded into a
//! compact tagged frame, validated, deduplicated, and applied on every
//! other peer. The authoritative side relays participant frames to the
//! rest of the session.

pub mod config;
pub mod dedupe;
pub mod host;
pub mod liveness;
pub mod pipeline;
pub mod protocol;
pub mod router;
pub mod transport;
pub mod validate;
pub mod wire;

pub use config::SyncConfig;
pub use dedupe::{AppliedKey, AppliedSet};
pub use host::{
    Capabilities, CapabilityProbe, ConditionClass, EffectSpec, HostSimulation, NetId, ScalarField,
};
pub use liveness::LivenessMonitor;
pub use pipeline::{ApplyResult, Missing, SkipReason, apply_event};
pub use protocol::{EventKind, PROTOCOL_VERSION, SyncCategory, SyncEvent, SyncMessage};
pub use router::{RouterState, SyncRouter};
pub use transport::{Delivery, PeerId, Role, Transport, TransportError};
pub use validate::{
    RESOURCE_CEILING, RejectReason, Rejection, WEIGHT_CEILING, check_count, check_field,
    fix_forward_resource, fix_forward_weight, validate_scalar,
};
pub use wire::{WireError, WireReader, WireWriter};
