/// Per-category toggles for outbound synchronization. Inbound events
/// still apply when the originator had the category enabled, except
/// where a handler gates on capability rather than preference.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Emit health events (med items, effects, charges).
    pub health_sync: bool,
    /// Emit quest condition progress events.
    pub quest_sync: bool,
    /// Only share progress for extended (non-vanilla) conditions.
    pub extended_conditions_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            health_sync: true,
            quest_sync: true,
            extended_conditions_only: true,
        }
    }
}
