use thiserror::Error;

/// Connection-level identity of a remote peer.
pub type PeerId = u32;

/// Position in the session topology. The authoritative side relays
/// frames between participants; participants only talk to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authoritative,
    Participant,
}

/// Delivery guarantee requested for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    #[default]
    ReliableOrdered,
    Unreliable,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not running")]
    NotRunning,
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("send failed: {0}")]
    Send(String),
}

/// Frame carrier owned by the embedding network layer. The engine holds
/// it weakly and treats upgrade failure as shutdown.
pub trait Transport: Send + Sync {
    fn role(&self) -> Role;

    fn is_running(&self) -> bool;

    /// Participants additionally need a live link to the authoritative
    /// peer. Defaults to `is_running` for transports without a separate
    /// sender handle.
    fn sender_alive(&self) -> bool {
        self.is_running()
    }

    /// Point send. Participants send to the authoritative peer.
    fn send(&self, frame: &[u8], delivery: Delivery) -> Result<(), TransportError>;

    /// Fan out to every connected peer except `exclude`.
    fn broadcast(
        &self,
        frame: &[u8],
        delivery: Delivery,
        exclude: Option<PeerId>,
    ) -> Result<(), TransportError>;
}
