//! Junction arbiter node.
//!
//! One [`ArbiterNode`] bundles the clock synchronizer, the signal lock
//! arbiter and the light sequencer for a single junction. The node can be
//! used in-process or served over JSON-RPC with [`HttpServer`].

pub mod arbiter;
pub mod clock_sync;
pub mod config;
pub mod http_router;
pub mod http_server;
pub mod node;
pub mod sequencer;
pub mod signal;

pub use arbiter::{Acquired, Arbiter, ArbiterConfig, ContentionPolicy, Priority};
pub use clock_sync::{ClockSync, ClockTime, SyncOutcome};
pub use config::NodeConfig;
pub use http_router::NodeRouter;
pub use http_server::HttpServer;
pub use node::{ArbiterNode, NodeInfo, NodeStats};
pub use sequencer::{SequenceTiming, Sequencer, SignalEvent, Transition};
pub use signal::{Face, FaceStatus, JunctionLayout, ResourceId, SignalSnapshot};
