//! Junction Common Types and Transport
//!
//! This crate provides the protocol definitions and HTTP transport helpers
//! shared by every junction component.
//!
//! # Overview
//!
//! Junction arbitrates a single shared resource (which traffic direction may
//! move) across many callers. Arbiter nodes own the state; routers spread
//! calls across redundant nodes. Both speak the same wire protocol:
//!
//! - **Protocol Layer**: JSON-RPC 2.0 request/response types, the method
//!   table, and the workspace error type
//! - **Transport Layer**: helpers for carrying JSON-RPC over HTTP/1.1
//!
//! # Components
//!
//! - [`protocol`] - JSON-RPC types, method names, errors
//! - [`transport`] - HTTP request/response conversion
//!
//! # Example
//!
//! ```
//! use junction_common::protocol::{methods, JsonRpcRequest, JsonRpcResponse};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new(methods::ACQUIRE_SIGNAL, json!({"resource": 2}), json!(1));
//! let response = JsonRpcResponse::success(request.id.clone(), json!(true));
//! assert_eq!(response.result, Some(json!(true)));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
