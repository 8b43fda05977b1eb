//! JSON-RPC dispatch for an arbiter node.
//!
//! Maps each method of [`junction_common::methods`] onto an
//! [`ArbiterNode`] operation. Bad times and unknown signals are answered
//! with `false`; missing or mistyped parameters are reported as
//! invalid-params errors.

use std::sync::Arc;

use junction_common::methods::{self, optional_str, param, require_str, require_u64};
use junction_common::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JunctionError, Result};
use serde_json::{json, Value};

use crate::node::ArbiterNode;

pub struct NodeRouter {
    node: Arc<ArbiterNode>,
}

impl NodeRouter {
    pub fn new(node: Arc<ArbiterNode>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<ArbiterNode> {
        &self.node
    }

    /// Handles one JSON-RPC request; failures become error responses.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        tracing::debug!(method = %req.method, "Handling request");

        match self.dispatch(&req.method, &req.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::debug!(method = %req.method, error = %e, "Request failed");
                JsonRpcResponse::error(id, JsonRpcError::from(&e))
            }
        }
    }

    /// Runs `method` against the node and returns its JSON result.
    pub async fn dispatch(&self, method: &str, params: &Value) -> Result<Value> {
        let node = &self.node;
        let value = match method {
            methods::SET_AUTHORITATIVE_TIME => {
                let time = require_str(params, "time", 0)?;
                answer(node.set_authoritative_time(time).map(|_| true))?
            }
            methods::REGISTER_PARTICIPANT_TIME => {
                let participant = require_str(params, "id", 0)?;
                let time = require_str(params, "time", 1)?;
                answer(node.register_participant_time(participant, time).map(|_| true))?
            }
            methods::SYNCHRONIZE => json!(node.synchronize()),
            methods::GET_SYNCHRONIZED_TIME => json!(node.synchronized_time()),
            methods::ACQUIRE_SIGNAL => {
                let resource = require_u64(params, "resource", 0)?;
                let requester = optional_str(params, "requester", 1)?;
                answer(node.acquire_signal(resource, requester))?
            }
            methods::ACQUIRE_VIP_SIGNAL => {
                let resource = require_u64(params, "resource", 0)?;
                let requester = optional_str(params, "requester", 1)?;
                answer(node.acquire_vip_signal(resource, requester))?
            }
            methods::RELEASE_SIGNAL => {
                let resource = require_u64(params, "resource", 0)?;
                let requester = optional_str(params, "requester", 1)?;
                answer(node.release_signal(resource, requester))?
            }
            methods::SUBMIT_VIP_BATCH => {
                let batch = vip_batch(params)?;
                answer(node.submit_vip_batch(&batch))?
            }
            methods::NEXT_VEHICLE_EVENT => json!(node.next_vehicle_event().await),
            methods::NEXT_PEDESTRIAN_EVENT => json!(node.next_pedestrian_event().await),
            methods::ACTIVE_SIGNAL => json!(node.active_signal()),
            methods::SIGNAL_STATUS_SNAPSHOT => serde_json::to_value(node.signal_status_snapshot())?,
            methods::SYSTEM_STATS => serde_json::to_value(node.system_stats())?,
            methods::INFO => serde_json::to_value(node.info())?,
            other => return Err(JunctionError::MethodNotFound(other.to_string())),
        };
        Ok(value)
    }
}

/// Turns a validation failure into a plain `false`.
fn answer(outcome: Result<bool>) -> Result<Value> {
    match outcome {
        Ok(flag) => Ok(Value::Bool(flag)),
        Err(e) if e.is_validation() => {
            tracing::debug!(error = %e, "Rejected input");
            Ok(Value::Bool(false))
        }
        Err(e) => Err(e),
    }
}

/// Reads `requests` as `[[resource, arrival], ...]` or
/// `[{"resource": r, "arrival": t}, ...]`.
fn vip_batch(params: &Value) -> Result<Vec<(u64, u64)>> {
    let entries = param(params, "requests", 0)
        .ok_or_else(|| JunctionError::InvalidRequest("missing parameter `requests`".into()))?
        .as_array()
        .ok_or_else(|| JunctionError::InvalidRequest("`requests` must be an array".into()))?;

    entries
        .iter()
        .map(|entry| {
            let resource = param(entry, "resource", 0).and_then(Value::as_u64);
            let arrival = param(entry, "arrival", 1).and_then(Value::as_u64);
            match (resource, arrival) {
                (Some(resource), Some(arrival)) => Ok((resource, arrival)),
                _ => Err(JunctionError::InvalidRequest(format!(
                    "malformed VIP entry {}, expected [resource, arrival]",
                    entry
                ))),
            }
        })
        .collect()
}
