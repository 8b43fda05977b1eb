//! HTTP Transport Utilities
//!
//! Helpers shared by the node and router HTTP servers:
//! - parsing JSON-RPC requests out of hyper bodies
//! - building JSON responses from JSON-RPC responses
//!
//! Every JSON-RPC outcome, including protocol errors, is delivered with
//! HTTP 200; only the JSON-RPC error object signals failure.

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::Value;

use crate::protocol::error::JunctionError;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Largest accepted request body (1 MiB). Junction calls are tiny.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Type alias for hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for hyper responses produced by junction servers
pub type HyperResponse = Response<Full<Bytes>>;

/// HTTP/JSON-RPC conversion helpers.
pub struct HttpTransport;

impl HttpTransport {
    /// Parses a JSON-RPC request from a body.
    pub fn parse_jsonrpc(body: Bytes) -> Result<JsonRpcRequest, JunctionError> {
        serde_json::from_slice(&body).map_err(JunctionError::JsonSerialization)
    }

    /// Reads and parses a JSON-RPC request from an incoming HTTP request.
    ///
    /// On failure the ready-to-send error response is returned instead, so
    /// servers can answer without further branching.
    pub async fn read_jsonrpc(req: HyperRequest) -> Result<JsonRpcRequest, HyperResponse> {
        if req.method() != Method::POST {
            return Err(Self::to_http_error(
                Value::Null,
                JsonRpcError::invalid_params("Only POST requests are supported"),
            ));
        }

        let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return Err(Self::to_http_error(
                    Value::Null,
                    JsonRpcError::invalid_request(),
                ));
            }
        };

        Self::parse_jsonrpc(body)
            .map_err(|_| Self::to_http_error(Value::Null, JsonRpcError::parse_error()))
    }

    /// Converts a JSON-RPC response into an HTTP response.
    pub fn to_http_response(jsonrpc: JsonRpcResponse) -> HyperResponse {
        let body = serde_json::to_vec(&jsonrpc).unwrap_or_default();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = StatusCode::OK;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Builds an HTTP response carrying a JSON-RPC error.
    pub fn to_http_error(id: Value, error: JsonRpcError) -> HyperResponse {
        Self::to_http_response(JsonRpcResponse::error(id, error))
    }
}
