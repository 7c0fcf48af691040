/// Ceiling for resource and charge values crossing the wire.
pub const RESOURCE_CEILING: f32 = 100_000.0;
/// Ceiling for item weight observed off host state.
pub const WEIGHT_CEILING: f32 = 1_000.0;

const WEIGHT_FLOOR_FIX: f32 = 0.1;
const WEIGHT_CEILING_FIX: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotANumber,
    Infinite,
    Negative,
    OutOfRange,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotANumber => "not a number",
            RejectReason::Infinite => "infinite",
            RejectReason::Negative => "negative",
            RejectReason::OutOfRange => "out of range",
        }
    }
}

/// A network value that failed the gate, with the field it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub field: &'static str,
    pub value: f32,
    pub reason: RejectReason,
}

/// Rules in order, first failure wins. Rejected values are dropped,
/// never clamped.
pub fn validate_scalar(value: f32, ceiling: f32) -> Result<f32, RejectReason> {
    if value.is_nan() {
        Err(RejectReason::NotANumber)
    } else if value.is_infinite() {
        Err(RejectReason::Infinite)
    } else if value < 0.0 {
        Err(RejectReason::Negative)
    } else if value > ceiling {
        Err(RejectReason::OutOfRange)
    } else {
        Ok(value)
    }
}

pub fn check_field(field: &'static str, value: f32, ceiling: f32) -> Result<f32, Rejection> {
    validate_scalar(value, ceiling).map_err(|reason| Rejection {
        field,
        value,
        reason,
    })
}

/// Integer tick/count fields only need a sign check.
pub fn check_count(field: &'static str, value: i32) -> Result<i32, Rejection> {
    if value < 0 {
        Err(Rejection {
            field,
            value: value as f32,
            reason: RejectReason::Negative,
        })
    } else {
        Ok(value)
    }
}

/// Fix-forward policy for locally observed resource values: a corrupted
/// reading is repaired in place rather than dropped, since the broken
/// value already lives in host state. Network values never take this
/// path. Returns the corrected value and whether a correction was made.
pub fn fix_forward_resource(value: f32) -> (f32, bool) {
    if value.is_nan() || value.is_infinite() || value < 0.0 {
        (0.0, true)
    } else {
        (value, false)
    }
}

/// Fix-forward for item weight readings.
pub fn fix_forward_weight(value: f32) -> (f32, bool) {
    if value.is_nan() || value.is_infinite() || value < 0.0 {
        (WEIGHT_FLOOR_FIX, true)
    } else if value > WEIGHT_CEILING {
        (WEIGHT_CEILING_FIX, true)
    } else {
        (value, false)
    }
}
