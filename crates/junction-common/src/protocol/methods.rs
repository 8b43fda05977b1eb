//! Method table shared by arbiter nodes and routers.
//!
//! Parameters may be passed by name (`{"resource": 2}`) or by position
//! (`[2]`); the helpers here accept both forms.

use serde_json::Value;

use super::error::{JunctionError, Result};

pub const SET_AUTHORITATIVE_TIME: &str = "setAuthoritativeTime";
pub const REGISTER_PARTICIPANT_TIME: &str = "registerParticipantTime";
pub const SYNCHRONIZE: &str = "synchronize";
pub const GET_SYNCHRONIZED_TIME: &str = "getSynchronizedTime";
pub const ACQUIRE_SIGNAL: &str = "acquireSignal";
pub const ACQUIRE_VIP_SIGNAL: &str = "acquireVipSignal";
pub const RELEASE_SIGNAL: &str = "releaseSignal";
pub const SUBMIT_VIP_BATCH: &str = "submitVipBatch";
pub const NEXT_VEHICLE_EVENT: &str = "nextVehicleEvent";
pub const NEXT_PEDESTRIAN_EVENT: &str = "nextPedestrianEvent";
pub const ACTIVE_SIGNAL: &str = "activeSignal";
pub const SIGNAL_STATUS_SNAPSHOT: &str = "signalStatusSnapshot";
pub const SYSTEM_STATS: &str = "systemStats";
pub const INFO: &str = "_info";

/// Every method an arbiter node answers.
pub const ALL: &[&str] = &[
    SET_AUTHORITATIVE_TIME,
    REGISTER_PARTICIPANT_TIME,
    SYNCHRONIZE,
    GET_SYNCHRONIZED_TIME,
    ACQUIRE_SIGNAL,
    ACQUIRE_VIP_SIGNAL,
    RELEASE_SIGNAL,
    SUBMIT_VIP_BATCH,
    NEXT_VEHICLE_EVENT,
    NEXT_PEDESTRIAN_EVENT,
    ACTIVE_SIGNAL,
    SIGNAL_STATUS_SNAPSHOT,
    SYSTEM_STATS,
    INFO,
];

/// Looks up a parameter by name, falling back to its position.
pub fn param<'a>(params: &'a Value, name: &str, position: usize) -> Option<&'a Value> {
    match params {
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(position),
        _ => None,
    }
    .filter(|v| !v.is_null())
}

pub fn require_str<'a>(params: &'a Value, name: &str, position: usize) -> Result<&'a str> {
    param(params, name, position)
        .ok_or_else(|| JunctionError::InvalidRequest(format!("missing parameter `{}`", name)))?
        .as_str()
        .ok_or_else(|| JunctionError::InvalidRequest(format!("parameter `{}` must be a string", name)))
}

pub fn optional_str<'a>(params: &'a Value, name: &str, position: usize) -> Result<Option<&'a str>> {
    match param(params, name, position) {
        None => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| {
            JunctionError::InvalidRequest(format!("parameter `{}` must be a string", name))
        }),
    }
}

pub fn require_u64(params: &Value, name: &str, position: usize) -> Result<u64> {
    param(params, name, position)
        .ok_or_else(|| JunctionError::InvalidRequest(format!("missing parameter `{}`", name)))?
        .as_u64()
        .ok_or_else(|| {
            JunctionError::InvalidRequest(format!("parameter `{}` must be a non-negative integer", name))
        })
}
