use std::sync::Arc;
use std::time::Duration;

use junction_common::methods;
use junction_common::protocol::jsonrpc::{INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND};
use junction_common::{JunctionError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::NodeBackend;
use crate::load_balancer::{LoadBalancer, RouterCounters};
use crate::node::NodeStatus;
use crate::settle::SettleScheduler;

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Concurrent calls a node takes before overflow goes elsewhere.
    pub capacity: usize,
    /// Consecutive failures that make a node unhealthy.
    pub failure_threshold: u32,
    /// How long an unhealthy node is avoided after its latest failure.
    pub cooldown: Duration,
    /// How long a successful call keeps occupying its node.
    pub settle_delay: Duration,
    /// Per-attempt deadline.
    pub call_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            settle_delay: Duration::from_secs(4),
            call_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStats {
    #[serde(flatten)]
    pub counters: RouterCounters,
    pub uptime_seconds: u64,
    pub nodes: Vec<NodeStatus>,
}

/// Capacity-aware router in front of redundant arbiter nodes.
///
/// Every call goes to the primary while it has room; overflow and failures
/// move to the secondaries. Node load, health and counters share one lock,
/// so a stats read always sees a consistent picture.
pub struct Router {
    backends: Vec<Arc<dyn NodeBackend>>,
    balancer: Arc<Mutex<LoadBalancer>>,
    settle: SettleScheduler,
    config: RouterConfig,
    started: Instant,
}

impl Router {
    /// Creates a router over `backends`, the first being the primary.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(backends: Vec<Arc<dyn NodeBackend>>, config: RouterConfig) -> Result<Self> {
        if backends.is_empty() {
            return Err(JunctionError::NodeUnavailable(
                "a router needs at least one node".into(),
            ));
        }
        let balancer = Arc::new(Mutex::new(LoadBalancer::new(
            backends.iter().map(|b| b.addr().to_string()),
            config.capacity,
            config.failure_threshold,
            config.cooldown,
        )));
        let settle = SettleScheduler::spawn(balancer.clone());

        tracing::info!(
            nodes = ?backends.iter().map(|b| b.addr()).collect::<Vec<_>>(),
            capacity = config.capacity,
            "Router initialized"
        );

        Ok(Self {
            backends,
            balancer,
            settle,
            config,
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn nodes(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.addr().to_string()).collect()
    }

    /// Faults the caller caused; another node would answer the same way.
    pub fn is_retryable(error: &JunctionError) -> bool {
        match error {
            JunctionError::RemoteFault { code, .. } => {
                !matches!(*code, INVALID_PARAMS | INVALID_REQUEST | METHOD_NOT_FOUND)
            }
            JunctionError::MethodNotFound(_) => false,
            e => !e.is_validation(),
        }
    }

    /// Sends `method` to a node, retrying elsewhere on failure.
    pub async fn route(&self, method: &str, params: Value) -> Result<Value> {
        let attempts = self.config.retry.max_attempts.max(1);
        let mut failed: Vec<usize> = Vec::new();

        for attempt in 1..=attempts {
            let selection = {
                let mut lb = self.balancer.lock().await;
                let selection = lb
                    .select(&failed, Instant::now())
                    .ok_or(JunctionError::AllNodesFailed)?;
                lb.begin(selection);
                selection
            };
            let index = selection.index;
            let backend = &self.backends[index];

            if selection.degraded {
                tracing::warn!(node = backend.addr(), method, "No node has spare capacity, using fallback");
            } else if selection.failover {
                tracing::info!(node = backend.addr(), method, "Failing over from primary");
            }
            tracing::debug!(node = backend.addr(), method, attempt, "Routing call");

            let outcome = match tokio::time::timeout(
                self.config.call_timeout,
                backend.call(method, params.clone()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(JunctionError::Timeout(self.config.call_timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(value) => {
                    self.balancer.lock().await.record_success(index);
                    self.release_slot(index).await;
                    return Ok(value);
                }
                Err(e) if !Self::is_retryable(&e) => {
                    let mut lb = self.balancer.lock().await;
                    lb.record_success(index);
                    lb.settle(index);
                    return Err(e);
                }
                Err(e) => {
                    let timed_out = matches!(e, JunctionError::Timeout(_));
                    {
                        let mut lb = self.balancer.lock().await;
                        lb.record_failure(index, timed_out, Instant::now());
                        lb.settle(index);
                    }
                    failed.push(index);
                    tracing::warn!(
                        node = backend.addr(),
                        method,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Routed call failed"
                    );

                    if attempt < attempts {
                        self.balancer.lock().await.record_retry();
                        tokio::time::sleep(self.config.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(method, attempts, "All routing attempts failed");
        Err(JunctionError::AllNodesFailed)
    }

    async fn release_slot(&self, index: usize) {
        if self.config.settle_delay.is_zero() {
            self.balancer.lock().await.settle(index);
        } else {
            self.settle.schedule(index, self.config.settle_delay);
        }
    }

    pub async fn stats(&self) -> RouterStats {
        let lb = self.balancer.lock().await;
        RouterStats {
            counters: lb.counters(),
            uptime_seconds: self.started.elapsed().as_secs(),
            nodes: lb.statuses(Instant::now()),
        }
    }

    /// A node's `systemStats` with the router's own stats under `"router"`.
    ///
    /// Router stats are taken before the call is routed, so they do not
    /// count the stats call itself. Falls back to router stats alone when no
    /// node answers.
    pub async fn system_stats(&self) -> Result<Value> {
        let router_stats = serde_json::to_value(self.stats().await)?;
        let node_stats = self.route(methods::SYSTEM_STATS, json!({})).await;

        Ok(match node_stats {
            Ok(Value::Object(mut map)) => {
                map.insert("router".to_string(), router_stats);
                Value::Object(map)
            }
            Ok(other) => json!({ "node": other, "router": router_stats }),
            Err(e) => {
                tracing::warn!(error = %e, "No node answered systemStats");
                json!({ "router": router_stats })
            }
        })
    }

    pub fn info(&self) -> Value {
        json!({
            "serverType": "router",
            "version": env!("CARGO_PKG_VERSION"),
            "nodes": self.nodes(),
            "uptimeSeconds": self.started.elapsed().as_secs(),
        })
    }

    /// Stops the settle scheduler. Calls still settling keep their slot.
    pub fn shutdown(&self) {
        tracing::info!("Router shutting down");
        self.settle.shutdown();
    }
}
