use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use junction_common::{JsonRpcRequest, JsonRpcResponse, JunctionError, Result};
use serde_json::Value;

/// JSON-RPC client for a junction node or router.
///
/// Connections are pooled by hyper, so a single client (or its clones) can
/// issue any number of concurrent calls.
#[derive(Clone)]
pub struct JunctionClient {
    url: String,
    http: Client<HttpConnector, Full<Bytes>>,
    next_id: Arc<AtomicU64>,
}

impl JunctionClient {
    /// Creates a client for `addr`, given as `host:port` or a full
    /// `http://` URL.
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr
        } else {
            format!("http://{}", addr)
        };
        let http = Client::builder(TokioExecutor::new()).build_http();

        Self {
            url,
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Calls `method` and returns its result.
    ///
    /// A JSON-RPC error from the server comes back as
    /// [`JunctionError::RemoteFault`]; anything that stops the exchange
    /// itself is a [`JunctionError::Transport`].
    pub async fn call(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, Value::from(id));
        let body = serde_json::to_vec(&request)?;

        let http_req = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.url)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| JunctionError::Transport(format!("Invalid request for {}: {}", self.url, e)))?;

        tracing::debug!(url = %self.url, method = %request.method, id, "Sending request");

        let res = self
            .http
            .request(http_req)
            .await
            .map_err(|e| JunctionError::Transport(format!("Request to {} failed: {}", self.url, e)))?;

        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| JunctionError::Transport(format!("Failed to read response body: {}", e)))?
            .to_bytes();

        let response: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            JunctionError::Transport(format!("Invalid response from {} ({}): {}", self.url, status, e))
        })?;
        response.into_result()
    }
}

impl std::fmt::Debug for JunctionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JunctionClient").field("url", &self.url).finish()
    }
}
