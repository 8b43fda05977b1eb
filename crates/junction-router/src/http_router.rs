//! JSON-RPC front of a [`Router`].
//!
//! `systemStats` and `_info` are answered by the router itself; every other
//! method is routed to a node unchanged.

use std::sync::Arc;

use junction_common::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Result};
use serde_json::Value;

use crate::router::Router;

pub struct RouterRpc {
    router: Arc<Router>,
}

impl RouterRpc {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        match self.dispatch(&req.method, req.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::debug!(method = %req.method, error = %e, "Routed request failed");
                JsonRpcResponse::error(id, JsonRpcError::from(&e))
            }
        }
    }

    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            methods::SYSTEM_STATS => self.router.system_stats().await,
            methods::INFO => Ok(self.router.info()),
            _ => self.router.route(method, params).await,
        }
    }
}
