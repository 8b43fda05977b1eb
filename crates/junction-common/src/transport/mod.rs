//! Junction Transport Layer
//!
//! Nodes and routers carry JSON-RPC 2.0 over HTTP/1.1 POST bodies.
//!
//! - **[`HttpTransport`]**: parse requests from bodies and build responses
//! - **[`HyperRequest`]** / **[`HyperResponse`]**: hyper type aliases used by
//!   both servers
//!
//! Request bodies larger than [`MAX_BODY_BYTES`] are rejected before parsing.

pub mod http;

pub use http::{HttpTransport, HyperRequest, HyperResponse, MAX_BODY_BYTES};
