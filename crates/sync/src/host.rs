//! Seam between the sync engine and whatever simulation hosts it. The
//! engine never touches game state directly; everything goes through
//! [`HostSimulation`].

/// Network identity of a player-controlled subject.
pub type NetId = i32;

/// Scalar slots the engine reads and writes on items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    HpResource,
    Weight,
}

impl ScalarField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarField::HpResource => "hp_resource",
            ScalarField::Weight => "weight",
        }
    }
}

/// Parameters for a custom health effect application.
#[derive(Debug, Clone)]
pub struct EffectSpec {
    pub effect_type: String,
    pub body_part: u8,
    pub duration: f32,
    pub strength: f32,
    pub delay_ticks: i32,
}

/// Whether a quest condition belongs to the extended set or ships with
/// the base game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionClass {
    Extended,
    Vanilla,
}

impl ConditionClass {
    /// Type-name heuristic for hosts that cannot answer the class
    /// question directly. Extended condition types carry one of these
    /// markers in their name.
    pub fn guess_from_type_name(name: &str) -> ConditionClass {
        if name.contains("Optional") || name.contains("Extended") {
            ConditionClass::Extended
        } else {
            ConditionClass::Vanilla
        }
    }
}

/// What the host environment supports, probed once at registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Extended quest conditions are present; quest events are
    /// meaningless without them.
    pub extended_quests: bool,
    /// Subjects can be downed and revived rather than killed outright.
    pub revival: bool,
}

/// Answers the capability question at registration time.
pub trait CapabilityProbe {
    fn detect(&self) -> Capabilities;
}

/// Everything the engine needs from the hosting simulation. Mutating
/// operations return `false` when the target was resolved but the
/// mutation could not land.
pub trait HostSimulation {
    /// The world is loaded and subjects can be resolved.
    fn world_ready(&self) -> bool;

    /// Net id of the locally controlled subject, if one exists yet.
    fn local_net_id(&self) -> Option<NetId>;

    fn subject_exists(&self, net_id: NetId) -> bool;
    fn subject_alive(&self, net_id: NetId) -> bool;
    fn subject_is_local(&self, net_id: NetId) -> bool;

    /// Subject is downed but revivable. Only meaningful when the
    /// revival capability is present.
    fn subject_in_revival(&self, _net_id: NetId) -> bool {
        false
    }

    fn has_item(&self, net_id: NetId, item_id: &str) -> bool;
    fn item_scalar(&self, net_id: NetId, item_id: &str, field: ScalarField) -> Option<f32>;
    fn set_item_scalar(&mut self, net_id: NetId, item_id: &str, field: ScalarField, value: f32)
    -> bool;

    fn apply_effect(&mut self, net_id: NetId, spec: &EffectSpec) -> bool;
    fn remove_effect(&mut self, net_id: NetId, effect_type: &str, body_part: u8) -> bool;
    fn apply_tourniquet(&mut self, net_id: NetId, body_part: u8, damage_rate: f32, delay_ticks: i32)
    -> bool;
    fn apply_surgery(
        &mut self,
        net_id: NetId,
        body_part: u8,
        tick_rate: f32,
        regen_limit_factor: f32,
        delay_ticks: i32,
    ) -> bool;

    fn has_condition(&self, quest_id: &str, condition_id: &str) -> bool;
    fn set_condition_progress(
        &mut self,
        quest_id: &str,
        condition_id: &str,
        current_value: i32,
        completed: bool,
    ) -> bool;

    /// Resolve the quest a condition belongs to, for locally observed
    /// progress where only the condition id is at hand.
    fn quest_for_condition(&self, condition_id: &str) -> Option<String>;

    /// Authoritative classification, when the host can provide it.
    fn condition_class(&self, _quest_id: &str, _condition_id: &str) -> Option<ConditionClass> {
        None
    }

    /// Fallback input for the type-name heuristic.
    fn condition_type_name(&self, _quest_id: &str, _condition_id: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_heuristic() {
        assert_eq!(
            ConditionClass::guess_from_type_name("OptionalCompleteCondition"),
            ConditionClass::Extended
        );
        assert_eq!(
            ConditionClass::guess_from_type_name("ExtendedCounterCreator"),
            ConditionClass::Extended
        );
        assert_eq!(
            ConditionClass::guess_from_type_name("ConditionCounterCreator"),
            ConditionClass::Vanilla
        );
    }
}
