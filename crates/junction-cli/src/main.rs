//! # Junction CLI
//!
//! Starts arbiter nodes and routers, and makes one-off JSON-RPC calls.
//!
//! ```bash
//! # Start a four-way node
//! junction node -b 0.0.0.0:9001 --node-id north
//!
//! # Start a router in front of a primary and a secondary node
//! junction router -b 0.0.0.0:8080 -n 127.0.0.1:9001 -n 127.0.0.1:9002
//!
//! # Route to in-process nodes instead
//! junction router -n local:primary -n local:secondary
//!
//! # Make a call (outputs raw JSON)
//! junction call 127.0.0.1:8080 acquireSignal -a '{"resource": 2}'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use junction_client::JunctionClient;
use junction_node::{ArbiterNode, ContentionPolicy, JunctionLayout, NodeConfig, SequenceTiming};
use junction_router::{HttpBackend, LocalBackend, NodeBackend, RetryConfig, Router, RouterConfig};

/// Prefix that makes the router host a node in-process.
const LOCAL_PREFIX: &str = "local:";

#[derive(FromArgs)]
/// Junction - distributed signal arbitration
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Node(NodeArgs),
    Router(RouterArgs),
    Call(CallArgs),
}

/// Arguments for starting an arbiter node.
#[derive(FromArgs)]
#[argh(subcommand, name = "node")]
/// start an arbiter node
struct NodeArgs {
    /// address to bind the node's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:9001\".into()")]
    bind: String,

    /// name used in logs and stats
    #[argh(option, long = "node-id", default = "\"junction-node\".into()")]
    node_id: String,

    /// junction layout: four-way or two-way
    #[argh(option, long = "layout", default = "JunctionLayout::FourWay")]
    layout: JunctionLayout,

    /// signal that is green at startup
    #[argh(option, long = "initial-active", default = "1")]
    initial_active: u64,

    /// never let a VIP request take the lock from its holder
    #[argh(switch, long = "no-vip-preemption")]
    no_vip_preemption: bool,

    /// refuse busy NORMAL requests instead of queueing them
    #[argh(switch, long = "deny-contention")]
    deny_contention: bool,

    /// run light sequences without delays
    #[argh(switch, long = "immediate")]
    immediate: bool,
}

/// Arguments for starting a router.
///
/// The first node is the primary. Addresses starting with `local:` are
/// served by an in-process node of that name.
#[derive(FromArgs)]
#[argh(subcommand, name = "router")]
/// start a router in front of arbiter nodes
struct RouterArgs {
    /// address to bind the router's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:8080\".into()")]
    bind: String,

    /// node addresses, primary first; may be repeated
    #[argh(option, short = 'n', long = "node")]
    nodes: Vec<String>,

    /// concurrent calls a node takes before overflow moves on
    #[argh(option, long = "capacity", default = "10")]
    capacity: usize,

    /// consecutive failures that make a node unhealthy
    #[argh(option, long = "failure-threshold", default = "3")]
    failure_threshold: u32,

    /// seconds an unhealthy node is avoided
    #[argh(option, long = "cooldown-secs", default = "30")]
    cooldown_secs: u64,

    /// milliseconds a finished call keeps occupying its node
    #[argh(option, long = "settle-ms", default = "4000")]
    settle_ms: u64,

    /// per-attempt deadline in seconds
    #[argh(option, long = "timeout-secs", default = "60")]
    timeout_secs: u64,

    /// total attempts per call, the first one included
    #[argh(option, long = "max-attempts", default = "3")]
    max_attempts: u32,
}

/// Arguments for making a single call.
///
/// Outputs raw JSON on stdout so the result can be piped into `jq`.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method on a node or router
struct CallArgs {
    /// address of the node or router
    #[argh(positional)]
    server_address: String,

    /// method name, e.g. acquireSignal
    #[argh(positional)]
    method: String,

    /// JSON parameters, defaults to `{}`
    #[argh(option, short = 'a', long = "args", default = "\"{}\".into()")]
    args: String,
}

impl NodeArgs {
    fn config(&self) -> Result<NodeConfig> {
        let initial = self.layout.resource(self.initial_active)?;
        let contention = if self.deny_contention {
            ContentionPolicy::Deny
        } else {
            ContentionPolicy::Queue
        };
        let timing = if self.immediate {
            SequenceTiming::immediate()
        } else {
            SequenceTiming::default()
        };

        Ok(NodeConfig::default()
            .with_node_id(self.node_id.clone())
            .with_layout(self.layout)
            .with_initial_active(initial)
            .with_vip_preemption(!self.no_vip_preemption)
            .with_contention(contention)
            .with_timing(timing))
    }
}

impl RouterArgs {
    fn config(&self) -> RouterConfig {
        RouterConfig {
            capacity: self.capacity,
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            settle_delay: Duration::from_millis(self.settle_ms),
            call_timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryConfig {
                max_attempts: self.max_attempts,
                ..Default::default()
            },
        }
    }

    fn backends(&self) -> Result<Vec<Arc<dyn NodeBackend>>> {
        if self.nodes.is_empty() {
            anyhow::bail!("No nodes specified. Use --node <addr> to add nodes.");
        }

        Ok(self.nodes.iter().map(|addr| backend(addr)).collect())
    }
}

fn backend(addr: &str) -> Arc<dyn NodeBackend> {
    match addr.strip_prefix(LOCAL_PREFIX) {
        Some(node_id) => {
            let node = ArbiterNode::new(NodeConfig::default().with_node_id(node_id));
            Arc::new(LocalBackend::new(Arc::new(node)))
        }
        None => Arc::new(HttpBackend::new(addr)),
    }
}

fn parse_bind(bind: &str) -> Result<SocketAddr> {
    bind.parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", bind, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep `call` output clean for piping.
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Node(args) => run_node(args).await,
        Commands::Router(args) => run_router(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let config = args.config()?;
    let addr = parse_bind(&args.bind)?;
    tracing::info!(
        node_id = %config.node_id,
        layout = %config.arbiter.layout,
        vip_preemption = config.arbiter.vip_preemption,
        "Starting arbiter node"
    );

    let node = Arc::new(ArbiterNode::new(config));
    junction_node::HttpServer::new(node).run(addr).await?;
    Ok(())
}

async fn run_router(args: RouterArgs) -> Result<()> {
    let backends = args.backends()?;
    let addr = parse_bind(&args.bind)?;
    tracing::info!(nodes = ?args.nodes, capacity = args.capacity, "Starting router");

    let router = Router::new(backends, args.config())?;
    junction_router::HttpServer::new(Arc::new(router)).run(addr).await?;
    Ok(())
}

async fn run_call(args: CallArgs) -> Result<()> {
    let params: serde_json::Value = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;

    let client = JunctionClient::new(args.server_address);
    let result = client.call(&args.method, params).await?;
    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}
