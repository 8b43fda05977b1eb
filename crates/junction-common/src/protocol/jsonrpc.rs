//! JSON-RPC 2.0 Protocol Types
//!
//! Every junction endpoint (arbiter node or router) speaks JSON-RPC 2.0.
//!
//! - Request format: `{"jsonrpc": "2.0", "method": "...", "params": ..., "id": ...}`
//! - Response format: `{"jsonrpc": "2.0", "result": ..., "error": ..., "id": ...}`
//! - Error format: `{"code": ..., "message": "...", "data": ...}`
//!
//! # Error Codes
//!
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32000`: Server error (routing failures, remote faults)
//!
//! # Example
//!
//! ```
//! use junction_common::protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse, JsonRpcError};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new("activeSignal", json!({}), json!(7));
//! let response = JsonRpcResponse::success(request.id.clone(), json!(3));
//! assert_eq!(response.into_result().unwrap(), json!(3));
//!
//! let failed = JsonRpcResponse::error(json!(7), JsonRpcError::method_not_found());
//! assert!(failed.into_result().is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::JunctionError;

/// JSON-RPC 2.0 request
///
/// `params` may be an object, a positional array, or omitted entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Name of the method to invoke
    pub method: String,
    /// Parameter values
    #[serde(default)]
    pub params: Value,
    /// Request identifier (number, string, or null)
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response
///
/// A `null` result deserializes to `None`; [`JsonRpcResponse::into_result`]
/// maps it back to `Value::Null`, which is how exhausted event queues and
/// pending synchronization are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Result value on success
    pub result: Option<Value>,
    /// Error object on failure
    pub error: Option<JsonRpcError>,
    /// Request identifier (must match the request id)
    pub id: Value,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code (standard codes are negative integers)
    pub code: i32,
    /// Short description of the error
    pub message: String,
    /// Additional data (optional)
    pub data: Option<Value>,
}

/// Invalid JSON was received by the server
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid Request object
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameter(s)
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;
/// Application-defined server error
pub const SERVER_ERROR: i32 = -32000;

impl JsonRpcError {
    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Parse error".into(),
            data: None,
        }
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request() -> Self {
        Self {
            code: INVALID_REQUEST,
            message: "Invalid Request".into(),
            data: None,
        }
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found() -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: "Method not found".into(),
            data: None,
        }
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: &str) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: msg.into(),
            data: None,
        }
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: &str) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: msg.into(),
            data: None,
        }
    }

    /// Create a server error (-32000)
    pub fn server_error(msg: &str) -> Self {
        Self {
            code: SERVER_ERROR,
            message: msg.into(),
            data: None,
        }
    }
}

impl From<&JunctionError> for JsonRpcError {
    fn from(err: &JunctionError) -> Self {
        match err {
            JunctionError::InvalidFormat(_)
            | JunctionError::InvalidResource(_)
            | JunctionError::InvalidRequest(_) => JsonRpcError::invalid_params(&err.to_string()),
            JunctionError::MethodNotFound(_) => JsonRpcError::method_not_found(),
            JunctionError::RemoteFault { code, message } => JsonRpcError {
                code: *code,
                message: message.clone(),
                data: None,
            },
            JunctionError::Internal(_) | JunctionError::JsonSerialization(_) => {
                JsonRpcError::internal_error(&err.to_string())
            }
            _ => JsonRpcError::server_error(&err.to_string()),
        }
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Converts the response into the callee's result.
    ///
    /// Error objects become [`JunctionError::RemoteFault`] carrying the
    /// remote error code, so callers can tell invalid params apart from faults.
    pub fn into_result(self) -> Result<Value, JunctionError> {
        match self.error {
            Some(error) => Err(JunctionError::RemoteFault {
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_request_serialization() {
        let req = JsonRpcRequest::new("acquireSignal", json!({"resource": 2}), json!(1));
        let serialized = serde_json::to_string(&req).unwrap();
        assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
        assert!(serialized.contains("\"method\":\"acquireSignal\""));
        assert!(serialized.contains("\"params\":{"));
        assert!(serialized.contains("\"id\":1"));
    }

    #[test]
    fn test_jsonrpc_request_without_params() {
        let json = r#"{"jsonrpc":"2.0","method":"activeSignal","id":4}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "activeSignal");
        assert_eq!(req.params, Value::Null);
        assert_eq!(req.id, json!(4));
    }

    #[test]
    fn test_null_result_round_trips_as_null() {
        let res = JsonRpcResponse::success(json!(1), Value::Null);
        let body = serde_json::to_string(&res).unwrap();
        assert!(body.contains(r#""result":null"#));

        let parsed: JsonRpcResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.result, None);
        assert_eq!(parsed.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_response_into_remote_fault() {
        let res = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
        match res.into_result() {
            Err(JunctionError::RemoteFault { code, message }) => {
                assert_eq!(code, METHOD_NOT_FOUND);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected remote fault, got {:?}", other),
        }
    }

    #[test]
    fn test_jsonrpc_error_codes() {
        assert_eq!(JsonRpcError::parse_error().code, -32700);
        assert_eq!(JsonRpcError::invalid_request().code, -32600);
        assert_eq!(JsonRpcError::method_not_found().code, -32601);
        assert_eq!(JsonRpcError::invalid_params("test").code, -32602);
        assert_eq!(JsonRpcError::internal_error("test").code, -32603);
        assert_eq!(JsonRpcError::server_error("test").code, -32000);
    }

    #[test]
    fn test_error_mapping_from_junction_error() {
        let err = JunctionError::InvalidFormat("99:00:00".into());
        assert_eq!(JsonRpcError::from(&err).code, INVALID_PARAMS);

        let err = JunctionError::MethodNotFound("reboot".into());
        assert_eq!(JsonRpcError::from(&err).code, METHOD_NOT_FOUND);

        let err = JunctionError::AllNodesFailed;
        let mapped = JsonRpcError::from(&err);
        assert_eq!(mapped.code, SERVER_ERROR);
        assert_eq!(mapped.message, "All nodes failed");

        let err = JunctionError::RemoteFault {
            code: METHOD_NOT_FOUND,
            message: "Method not found".into(),
        };
        assert_eq!(JsonRpcError::from(&err).code, METHOD_NOT_FOUND);
    }
}
