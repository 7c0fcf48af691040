//! Inbound apply path: resolve the subject, validate the payload,
//! dedupe where the event demands it, then mutate host state. Every
//! outcome is an [`ApplyResult`] so callers and tests can see exactly
//! where an event stopped.

use log::{debug, warn};

use crate::config::SyncConfig;
use crate::dedupe::{AppliedKey, AppliedSet};
use crate::host::{Capabilities, EffectSpec, HostSimulation, ScalarField};
use crate::protocol::{SyncEvent, SyncMessage};
use crate::validate::{RESOURCE_CEILING, Rejection, check_count, check_field};

/// What an event failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Subject,
    Item,
    Condition,
    Effect,
}

impl Missing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Missing::Subject => "subject",
            Missing::Item => "item",
            Missing::Condition => "condition",
            Missing::Effect => "effect",
        }
    }
}

/// Why an event was dropped without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyApplied,
    CategoryDisabled,
    CapabilityAbsent,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyApplied => "already applied",
            SkipReason::CategoryDisabled => "category disabled",
            SkipReason::CapabilityAbsent => "capability absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    Applied,
    Rejected(Rejection),
    NotFound(Missing),
    Skipped(SkipReason),
}

/// Runs one decoded message through the full apply pipeline.
pub fn apply_event(
    host: &mut dyn HostSimulation,
    applied: &AppliedSet,
    config: &SyncConfig,
    caps: Capabilities,
    msg: &SyncMessage,
) -> ApplyResult {
    let result = match apply_inner(host, applied, config, caps, msg) {
        Ok(result) => result,
        Err(rejection) => ApplyResult::Rejected(rejection),
    };

    match &result {
        ApplyResult::Applied => {
            debug!("applied {:?} for subject {}", msg.event.kind(), msg.net_id);
        }
        ApplyResult::Rejected(r) => {
            warn!(
                "rejected {:?} for subject {}: field {} value {} is {}",
                msg.event.kind(),
                msg.net_id,
                r.field,
                r.value,
                r.reason.as_str()
            );
        }
        ApplyResult::NotFound(what) => {
            warn!(
                "dropped {:?} for subject {}: {} not found",
                msg.event.kind(),
                msg.net_id,
                what.as_str()
            );
        }
        ApplyResult::Skipped(reason) => {
            debug!(
                "skipped {:?} for subject {}: {}",
                msg.event.kind(),
                msg.net_id,
                reason.as_str()
            );
        }
    }

    result
}

fn apply_inner(
    host: &mut dyn HostSimulation,
    applied: &AppliedSet,
    config: &SyncConfig,
    caps: Capabilities,
    msg: &SyncMessage,
) -> Result<ApplyResult, Rejection> {
    // Quest events gate on capability and preference before touching
    // the world; they are meaningless on hosts without extended quests.
    if let SyncEvent::QuestConditionProgress { .. } = &msg.event {
        if !caps.extended_quests {
            return Ok(ApplyResult::Skipped(SkipReason::CapabilityAbsent));
        }
        if !config.quest_sync {
            return Ok(ApplyResult::Skipped(SkipReason::CategoryDisabled));
        }
    }

    if !host.world_ready() || !host.subject_exists(msg.net_id) {
        return Ok(ApplyResult::NotFound(Missing::Subject));
    }

    let result = match &msg.event {
        SyncEvent::UseMedItem {
            item_id,
            resource_value,
            amount,
            ..
        } => {
            // Resolution precedes validation: an absent item is
            // NotFound even when the payload is also garbage.
            if !host.has_item(msg.net_id, item_id) {
                ApplyResult::NotFound(Missing::Item)
            } else {
                check_field("amount", *amount, RESOURCE_CEILING)?;
                let value = check_field("resource_value", *resource_value, RESOURCE_CEILING)?;
                if host.set_item_scalar(msg.net_id, item_id, ScalarField::HpResource, value) {
                    ApplyResult::Applied
                } else {
                    ApplyResult::NotFound(Missing::Item)
                }
            }
        }
        SyncEvent::ApplyCustomEffect {
            effect_type,
            body_part,
            duration,
            strength,
            delay_ticks,
        } => {
            let spec = EffectSpec {
                effect_type: effect_type.clone(),
                body_part: *body_part,
                duration: check_field("duration", *duration, RESOURCE_CEILING)?,
                strength: check_field("strength", *strength, RESOURCE_CEILING)?,
                delay_ticks: check_count("delay_ticks", *delay_ticks)?,
            };
            if host.apply_effect(msg.net_id, &spec) {
                ApplyResult::Applied
            } else {
                ApplyResult::NotFound(Missing::Effect)
            }
        }
        SyncEvent::RemoveCustomEffect {
            effect_type,
            body_part,
        } => {
            if host.remove_effect(msg.net_id, effect_type, *body_part) {
                ApplyResult::Applied
            } else {
                ApplyResult::NotFound(Missing::Effect)
            }
        }
        SyncEvent::UpdateCharges {
            item_id,
            new_charge_value,
        } => {
            if !host.has_item(msg.net_id, item_id) {
                ApplyResult::NotFound(Missing::Item)
            } else {
                let value = check_field("new_charge_value", *new_charge_value, RESOURCE_CEILING)?;
                if host.set_item_scalar(msg.net_id, item_id, ScalarField::HpResource, value) {
                    ApplyResult::Applied
                } else {
                    ApplyResult::NotFound(Missing::Item)
                }
            }
        }
        SyncEvent::TourniquetApplied {
            body_part,
            damage_rate,
            delay_ticks,
        } => {
            let rate = check_field("damage_rate", *damage_rate, RESOURCE_CEILING)?;
            let ticks = check_count("delay_ticks", *delay_ticks)?;
            if host.apply_tourniquet(msg.net_id, *body_part, rate, ticks) {
                ApplyResult::Applied
            } else {
                ApplyResult::NotFound(Missing::Effect)
            }
        }
        SyncEvent::SurgeryEffect {
            body_part,
            tick_rate,
            regen_limit_factor,
            delay_ticks,
        } => {
            let rate = check_field("tick_rate", *tick_rate, RESOURCE_CEILING)?;
            let limit = check_field("regen_limit_factor", *regen_limit_factor, RESOURCE_CEILING)?;
            let ticks = check_count("delay_ticks", *delay_ticks)?;
            if host.apply_surgery(msg.net_id, *body_part, rate, limit, ticks) {
                ApplyResult::Applied
            } else {
                ApplyResult::NotFound(Missing::Effect)
            }
        }
        SyncEvent::QuestConditionProgress {
            quest_id,
            condition_id,
            current_value,
            completed,
        } => {
            let value = check_count("current_value", *current_value)?;
            let key = AppliedKey::condition(msg.net_id, quest_id, condition_id);
            // Mark before locating the condition so a relayed echo of
            // our own event never applies twice.
            if !applied.check_and_mark(key) {
                ApplyResult::Skipped(SkipReason::AlreadyApplied)
            } else if !host.has_condition(quest_id, condition_id) {
                ApplyResult::NotFound(Missing::Condition)
            } else if host.set_condition_progress(quest_id, condition_id, value, *completed) {
                ApplyResult::Applied
            } else {
                ApplyResult::NotFound(Missing::Condition)
            }
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ConditionClass, NetId};
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct TestHost {
        ready: bool,
        subjects: HashSet<NetId>,
        items: HashMap<(NetId, String), f32>,
        conditions: HashMap<(String, String), (i32, bool)>,
        effects: Vec<(NetId, String)>,
    }

    impl TestHost {
        fn with_subject(net_id: NetId) -> Self {
            let mut host = Self {
                ready: true,
                ..Self::default()
            };
            host.subjects.insert(net_id);
            host
        }
    }

    impl HostSimulation for TestHost {
        fn world_ready(&self) -> bool {
            self.ready
        }
        fn local_net_id(&self) -> Option<NetId> {
            None
        }
        fn subject_exists(&self, net_id: NetId) -> bool {
            self.subjects.contains(&net_id)
        }
        fn subject_alive(&self, net_id: NetId) -> bool {
            self.subjects.contains(&net_id)
        }
        fn subject_is_local(&self, _net_id: NetId) -> bool {
            false
        }
        fn has_item(&self, net_id: NetId, item_id: &str) -> bool {
            self.items.contains_key(&(net_id, item_id.to_owned()))
        }
        fn item_scalar(&self, net_id: NetId, item_id: &str, _field: ScalarField) -> Option<f32> {
            self.items.get(&(net_id, item_id.to_owned())).copied()
        }
        fn set_item_scalar(
            &mut self,
            net_id: NetId,
            item_id: &str,
            _field: ScalarField,
            value: f32,
        ) -> bool {
            match self.items.get_mut(&(net_id, item_id.to_owned())) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }
        fn apply_effect(&mut self, net_id: NetId, spec: &EffectSpec) -> bool {
            self.effects.push((net_id, spec.effect_type.clone()));
            true
        }
        fn remove_effect(&mut self, net_id: NetId, effect_type: &str, _body_part: u8) -> bool {
            let before = self.effects.len();
            self.effects
                .retain(|(id, ty)| *id != net_id || ty != effect_type);
            self.effects.len() != before
        }
        fn apply_tourniquet(
            &mut self,
            net_id: NetId,
            _body_part: u8,
            _damage_rate: f32,
            _delay_ticks: i32,
        ) -> bool {
            self.effects.push((net_id, "tourniquet".into()));
            true
        }
        fn apply_surgery(
            &mut self,
            net_id: NetId,
            _body_part: u8,
            _tick_rate: f32,
            _regen_limit_factor: f32,
            _delay_ticks: i32,
        ) -> bool {
            self.effects.push((net_id, "surgery".into()));
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

    fn quest_caps() -> Capabilities {
        Capabilities {
            extended_quests: true,
            revival: false,
        }
    }

    #[test]
    fn med_item_updates_resource() {
        let mut host = TestHost::with_subject(7);
        host.items.insert((7, "salewa".into()), 400.0);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            7,
            SyncEvent::UseMedItem {
                item_id: "salewa".into(),
                body_part: 3,
                resource_value: 45.0,
                amount: 1.0,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(result, ApplyResult::Applied);
        assert_eq!(host.items[&(7, "salewa".to_owned())], 45.0);
    }

    #[test]
    fn nan_charge_rejected_without_mutation() {
        let mut host = TestHost::with_subject(7);
        host.items.insert((7, "ifak".into()), 300.0);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            7,
            SyncEvent::UpdateCharges {
                item_id: "ifak".into(),
                new_charge_value: f32::NAN,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        match result {
            ApplyResult::Rejected(r) => {
                assert_eq!(r.field, "new_charge_value");
                assert_eq!(r.reason, crate::validate::RejectReason::NotANumber);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(host.items[&(7, "ifak".to_owned())], 300.0);
    }

    #[test]
    fn missing_item_reported() {
        let mut host = TestHost::with_subject(7);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            7,
            SyncEvent::UpdateCharges {
                item_id: "ghost".into(),
                new_charge_value: 5.0,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(result, ApplyResult::NotFound(Missing::Item));
    }

    #[test]
    fn missing_item_wins_over_bad_value() {
        let mut host = TestHost::with_subject(7);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            7,
            SyncEvent::UpdateCharges {
                item_id: "ghost".into(),
                new_charge_value: f32::NAN,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(result, ApplyResult::NotFound(Missing::Item));

        let msg = SyncMessage::new(
            7,
            SyncEvent::UseMedItem {
                item_id: "ghost".into(),
                body_part: 3,
                resource_value: f32::INFINITY,
                amount: 1.0,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(result, ApplyResult::NotFound(Missing::Item));
    }

    #[test]
    fn unknown_subject_reported() {
        let mut host = TestHost::with_subject(7);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            99,
            SyncEvent::RemoveCustomEffect {
                effect_type: "E".into(),
                body_part: 0,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(result, ApplyResult::NotFound(Missing::Subject));
    }

    #[test]
    fn duplicate_condition_progress_skipped() {
        let mut host = TestHost::with_subject(3);
        host.conditions
            .insert(("quest_a".into(), "cond_1".into()), (0, false));
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            3,
            SyncEvent::QuestConditionProgress {
                quest_id: "quest_a".into(),
                condition_id: "cond_1".into(),
                current_value: 4,
                completed: false,
            },
        );
        let first = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(first, ApplyResult::Applied);
        assert_eq!(
            host.conditions[&("quest_a".to_owned(), "cond_1".to_owned())],
            (4, false)
        );

        let second = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(second, ApplyResult::Skipped(SkipReason::AlreadyApplied));
    }

    #[test]
    fn missing_condition_still_marks_dedupe() {
        // Mark-before-locate: the key lands even when the condition is
        // unknown, so a later retry of the same event stays suppressed.
        let mut host = TestHost::with_subject(3);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            3,
            SyncEvent::QuestConditionProgress {
                quest_id: "quest_a".into(),
                condition_id: "ghost".into(),
                current_value: 1,
                completed: false,
            },
        );
        let first = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(first, ApplyResult::NotFound(Missing::Condition));
        let second = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        assert_eq!(second, ApplyResult::Skipped(SkipReason::AlreadyApplied));
    }

    #[test]
    fn quest_event_needs_capability() {
        let mut host = TestHost::with_subject(3);
        host.conditions
            .insert(("quest_a".into(), "cond_1".into()), (0, false));
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            3,
            SyncEvent::QuestConditionProgress {
                quest_id: "quest_a".into(),
                condition_id: "cond_1".into(),
                current_value: 4,
                completed: false,
            },
        );
        let result = apply_event(
            &mut host,
            &applied,
            &SyncConfig::default(),
            Capabilities::default(),
            &msg,
        );
        assert_eq!(result, ApplyResult::Skipped(SkipReason::CapabilityAbsent));
        assert!(applied.is_empty());
    }

    #[test]
    fn quest_event_respects_config() {
        let mut host = TestHost::with_subject(3);
        host.conditions
            .insert(("quest_a".into(), "cond_1".into()), (0, false));
        let applied = AppliedSet::new();
        let config = SyncConfig {
            quest_sync: false,
            ..SyncConfig::default()
        };

        let msg = SyncMessage::new(
            3,
            SyncEvent::QuestConditionProgress {
                quest_id: "quest_a".into(),
                condition_id: "cond_1".into(),
                current_value: 4,
                completed: false,
            },
        );
        let result = apply_event(&mut host, &applied, &config, quest_caps(), &msg);
        assert_eq!(result, ApplyResult::Skipped(SkipReason::CategoryDisabled));
    }

    #[test]
    fn health_events_ignore_quest_config() {
        // Health sync preference gates emission, not application.
        let mut host = TestHost::with_subject(7);
        let applied = AppliedSet::new();
        let config = SyncConfig {
            health_sync: false,
            ..SyncConfig::default()
        };

        let msg = SyncMessage::new(
            7,
            SyncEvent::TourniquetApplied {
                body_part: 4,
                damage_rate: 0.08,
                delay_ticks: 0,
            },
        );
        let result = apply_event(&mut host, &applied, &config, quest_caps(), &msg);
        assert_eq!(result, ApplyResult::Applied);
    }

    #[test]
    fn negative_delay_rejected() {
        let mut host = TestHost::with_subject(7);
        let applied = AppliedSet::new();

        let msg = SyncMessage::new(
            7,
            SyncEvent::SurgeryEffect {
                body_part: 1,
                tick_rate: 0.5,
                regen_limit_factor: 0.7,
                delay_ticks: -10,
            },
        );
        let result = apply_event(&mut host, &applied, &SyncConfig::default(), quest_caps(), &msg);
        match result {
            ApplyResult::Rejected(r) => assert_eq!(r.field, "delay_ticks"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(host.effects.is_empty());
    }
}
