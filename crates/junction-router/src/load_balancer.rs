use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::node::{NodeStats, NodeStatus};

/// Chosen backend for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// Picked over the primary.
    pub failover: bool,
    /// No backend was both healthy and below capacity.
    pub degraded: bool,
}

/// Router-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterCounters {
    pub total_routed: u64,
    pub failover_count: u64,
    pub failed_attempts: u64,
    pub timeout_attempts: u64,
    pub retry_attempts: u64,
}

/// Primary-first, capacity-aware backend selection.
///
/// The primary (index 0) serves every call while it is healthy and below
/// capacity. Overflow goes to the first healthy secondary with room. With
/// nowhere to go, calls land on the primary anyway.
#[derive(Debug)]
pub struct LoadBalancer {
    nodes: Vec<NodeStats>,
    failure_threshold: u32,
    cooldown: Duration,
    counters: RouterCounters,
}

impl LoadBalancer {
    pub fn new(
        addrs: impl IntoIterator<Item = String>,
        capacity: usize,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            nodes: addrs
                .into_iter()
                .map(|addr| NodeStats::new(addr, capacity))
                .collect(),
            failure_threshold,
            cooldown,
            counters: RouterCounters::default(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&NodeStats> {
        self.nodes.get(index)
    }

    pub fn counters(&self) -> RouterCounters {
        self.counters
    }

    fn available(&self, index: usize, now: Instant) -> bool {
        let node = &self.nodes[index];
        node.has_capacity() && node.is_healthy(self.failure_threshold, self.cooldown, now)
    }

    /// Picks a backend, avoiding `excluded` (nodes that already failed this
    /// call) whenever some other node is left.
    pub fn select(&self, excluded: &[usize], now: Instant) -> Option<Selection> {
        if self.nodes.is_empty() {
            return None;
        }
        let allowed = |i: usize| !excluded.contains(&i);

        if let Some(index) = (0..self.nodes.len()).find(|&i| allowed(i) && self.available(i, now)) {
            return Some(Selection {
                index,
                failover: index != 0,
                degraded: false,
            });
        }

        let index = if allowed(0) {
            0
        } else {
            (0..self.nodes.len()).find(|&i| allowed(i)).unwrap_or(0)
        };
        Some(Selection {
            index,
            failover: index != 0,
            degraded: true,
        })
    }

    /// Accounts for a dispatch to `selection`.
    pub fn begin(&mut self, selection: Selection) {
        if let Some(node) = self.nodes.get_mut(selection.index) {
            node.in_flight += 1;
            node.total_routed += 1;
        }
        self.counters.total_routed += 1;
        if selection.failover {
            self.counters.failover_count += 1;
        }
    }

    /// Drops one in-flight call from `index`.
    pub fn settle(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.in_flight = node.in_flight.saturating_sub(1);
        }
    }

    pub fn record_success(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.record_success();
        }
    }

    pub fn record_failure(&mut self, index: usize, timed_out: bool, now: Instant) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.record_failure(now);
        }
        self.counters.failed_attempts += 1;
        if timed_out {
            self.counters.timeout_attempts += 1;
        }
    }

    pub fn record_retry(&mut self) {
        self.counters.retry_attempts += 1;
    }

    pub fn statuses(&self, now: Instant) -> Vec<NodeStatus> {
        self.nodes
            .iter()
            .map(|node| node.status(self.failure_threshold, self.cooldown, now))
            .collect()
    }
}
