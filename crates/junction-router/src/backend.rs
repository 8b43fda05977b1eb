//! Backends the router can dispatch to.

use std::sync::Arc;

use async_trait::async_trait;
use junction_client::JunctionClient;
use junction_common::Result;
use junction_node::{ArbiterNode, NodeRouter};
use serde_json::Value;

/// One arbiter node as seen by the router.
#[async_trait]
pub trait NodeBackend: Send + Sync {
    /// Name used in logs and stats.
    fn addr(&self) -> &str;

    async fn call(&self, method: &str, params: Value) -> Result<Value>;
}

/// An arbiter node living in the same process.
pub struct LocalBackend {
    addr: String,
    router: NodeRouter,
}

impl LocalBackend {
    pub fn new(node: Arc<ArbiterNode>) -> Self {
        Self {
            addr: format!("local:{}", node.node_id()),
            router: NodeRouter::new(node),
        }
    }

    pub fn node(&self) -> &Arc<ArbiterNode> {
        self.router.node()
    }
}

#[async_trait]
impl NodeBackend for LocalBackend {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.router.dispatch(method, &params).await
    }
}

/// An arbiter node reached over JSON-RPC.
pub struct HttpBackend {
    addr: String,
    client: JunctionClient,
}

impl HttpBackend {
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            client: JunctionClient::new(addr.clone()),
            addr,
        }
    }
}

#[async_trait]
impl NodeBackend for HttpBackend {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.client.call(method, params).await
    }
}
