//! Capacity-aware router for junction arbiter nodes.
//!
//! A [`Router`] sits in front of one primary and any number of secondary
//! nodes. It tracks in-flight calls per node against a capacity, fails over
//! when the primary is full or unhealthy, and retries failed calls with
//! exponential backoff.

pub mod backend;
pub mod http_router;
pub mod http_server;
pub mod load_balancer;
pub mod node;
pub mod router;
pub mod settle;

pub use backend::{HttpBackend, LocalBackend, NodeBackend};
pub use http_router::RouterRpc;
pub use http_server::HttpServer;
pub use load_balancer::{LoadBalancer, RouterCounters, Selection};
pub use node::{NodeStats, NodeStatus};
pub use router::{RetryConfig, Router, RouterConfig, RouterStats};
pub use settle::SettleScheduler;
