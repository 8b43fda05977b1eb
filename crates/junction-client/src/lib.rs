//! Client for junction nodes and routers.
//!
//! ```no_run
//! use junction_client::JunctionClient;
//! use serde_json::json;
//!
//! # async fn run() -> junction_common::Result<()> {
//! let client = JunctionClient::new("127.0.0.1:9000");
//! let granted = client.call("acquireSignal", json!({"resource": 2})).await?;
//! assert_eq!(granted, json!(true));
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::JunctionClient;
