use crate::wire::{WireError, WireReader, WireWriter};

pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed wire tags. Renumbering is a protocol break and requires a
/// version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    UseMedItem = 0,
    ApplyCustomEffect = 1,
    RemoveCustomEffect = 2,
    UpdateCharges = 3,
    TourniquetApplied = 4,
    SurgeryEffect = 5,
    QuestConditionProgress = 6,
}

impl EventKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::UseMedItem),
            1 => Some(Self::ApplyCustomEffect),
            2 => Some(Self::RemoveCustomEffect),
            3 => Some(Self::UpdateCharges),
            4 => Some(Self::TourniquetApplied),
            5 => Some(Self::SurgeryEffect),
            6 => Some(Self::QuestConditionProgress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCategory {
    Health,
    Quest,
}

/// One synchronized state change. Exactly one variant per value; the
/// decoder switches on the tag before reading any payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    UseMedItem {
        item_id: String,
        body_part: u8,
        resource_value: f32,
        amount: f32,
    },
    ApplyCustomEffect {
        effect_type: String,
        body_part: u8,
        duration: f32,
        strength: f32,
        delay_ticks: i32,
    },
    RemoveCustomEffect {
        effect_type: String,
        body_part: u8,
    },
    UpdateCharges {
        item_id: String,
        new_charge_value: f32,
    },
    TourniquetApplied {
        body_part: u8,
        damage_rate: f32,
        delay_ticks: i32,
    },
    SurgeryEffect {
        body_part: u8,
        tick_rate: f32,
        regen_limit_factor: f32,
        delay_ticks: i32,
    },
    QuestConditionProgress {
        quest_id: String,
        condition_id: String,
        current_value: i32,
        completed: bool,
    },
}

impl SyncEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UseMedItem { .. } => EventKind::UseMedItem,
            Self::ApplyCustomEffect { .. } => EventKind::ApplyCustomEffect,
            Self::RemoveCustomEffect { .. } => EventKind::RemoveCustomEffect,
            Self::UpdateCharges { .. } => EventKind::UpdateCharges,
            Self::TourniquetApplied { .. } => EventKind::TourniquetApplied,
            Self::SurgeryEffect { .. } => EventKind::SurgeryEffect,
            Self::QuestConditionProgress { .. } => EventKind::QuestConditionProgress,
        }
    }

    pub fn category(&self) -> SyncCategory {
        match self.kind() {
            EventKind::QuestConditionProgress => SyncCategory::Quest,
            _ => SyncCategory::Health,
        }
    }
}

/// One event addressed at one subject.
///
/// Layout: `[version: u8][entityRef: i32][tag: u8][payload]`, all
/// scalars little-endian, strings u16-length-prefixed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub net_id: i32,
    pub event: SyncEvent,
}

impl SyncMessage {
    pub fn new(net_id: i32, event: SyncEvent) -> Self {
        Self { net_id, event }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = WireWriter::new();
        w.put_u8(PROTOCOL_VERSION);
        w.put_i32(self.net_id);
        w.put_u8(self.event.kind() as u8);

        match &self.event {
            SyncEvent::UseMedItem {
                item_id,
                body_part,
                resource_value,
                amount,
            } => {
                w.put_str(item_id)?;
                w.put_u8(*body_part);
                w.put_f32(*resource_value);
                w.put_f32(*amount);
            }
            SyncEvent::ApplyCustomEffect {
                effect_type,
                body_part,
                duration,
                strength,
                delay_ticks,
            } => {
                w.put_str(effect_type)?;
                w.put_u8(*body_part);
                w.put_f32(*duration);
                w.put_f32(*strength);
                w.put_i32(*delay_ticks);
            }
            SyncEvent::RemoveCustomEffect {
                effect_type,
                body_part,
            } => {
                w.put_str(effect_type)?;
                w.put_u8(*body_part);
            }
            SyncEvent::UpdateCharges {
                item_id,
                new_charge_value,
            } => {
                w.put_str(item_id)?;
                w.put_f32(*new_charge_value);
            }
            SyncEvent::TourniquetApplied {
                body_part,
                damage_rate,
                delay_ticks,
            } => {
                w.put_u8(*body_part);
                w.put_f32(*damage_rate);
                w.put_i32(*delay_ticks);
            }
            SyncEvent::SurgeryEffect {
                body_part,
                tick_rate,
                regen_limit_factor,
                delay_ticks,
            } => {
                w.put_u8(*body_part);
                w.put_f32(*tick_rate);
                w.put_f32(*regen_limit_factor);
                w.put_i32(*delay_ticks);
            }
            SyncEvent::QuestConditionProgress {
                quest_id,
                condition_id,
                current_value,
                completed,
            } => {
                w.put_str(quest_id)?;
                w.put_str(condition_id)?;
                w.put_i32(*current_value);
                w.put_bool(*completed);
            }
        }

        Ok(w.into_bytes())
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);

        let version = r.get_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let net_id = r.get_i32()?;
        let tag = r.get_u8()?;
        let kind = EventKind::from_u8(tag).ok_or(WireError::UnknownVariant(tag))?;

        let event = match kind {
            EventKind::UseMedItem => SyncEvent::UseMedItem {
                item_id: r.get_str()?,
                body_part: r.get_u8()?,
                resource_value: r.get_f32()?,
                amount: r.get_f32()?,
            },
            EventKind::ApplyCustomEffect => SyncEvent::ApplyCustomEffect {
                effect_type: r.get_str()?,
                body_part: r.get_u8()?,
                duration: r.get_f32()?,
                strength: r.get_f32()?,
                delay_ticks: r.get_i32()?,
            },
            EventKind::RemoveCustomEffect => SyncEvent::RemoveCustomEffect {
                effect_type: r.get_str()?,
                body_part: r.get_u8()?,
            },
            EventKind::UpdateCharges => SyncEvent::UpdateCharges {
                item_id: r.get_str()?,
                new_charge_value: r.get_f32()?,
            },
            EventKind::TourniquetApplied => SyncEvent::TourniquetApplied {
                body_part: r.get_u8()?,
                damage_rate: r.get_f32()?,
                delay_ticks: r.get_i32()?,
            },
            EventKind::SurgeryEffect => SyncEvent::SurgeryEffect {
                body_part: r.get_u8()?,
                tick_rate: r.get_f32()?,
                regen_limit_factor: r.get_f32()?,
                delay_ticks: r.get_i32()?,
            },
            EventKind::QuestConditionProgress => SyncEvent::QuestConditionProgress {
                quest_id: r.get_str()?,
                condition_id: r.get_str()?,
                current_value: r.get_i32()?,
                completed: r.get_bool()?,
            },
        };

        r.finish()?;
        Ok(Self { net_id, event })
    }
}
