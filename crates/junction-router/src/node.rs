use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Routing state of one backend.
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub addr: String,
    /// Calls dispatched and not yet settled.
    pub in_flight: usize,
    pub capacity: usize,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
    pub total_routed: u64,
}

impl NodeStats {
    pub fn new(addr: impl Into<String>, capacity: usize) -> Self {
        Self {
            addr: addr.into(),
            in_flight: 0,
            capacity,
            consecutive_failures: 0,
            last_failure: None,
            total_routed: 0,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.capacity
    }

    /// A node is unhealthy after `threshold` consecutive failures until
    /// `cooldown` has passed since the latest one.
    pub fn is_healthy(&self, threshold: u32, cooldown: Duration, now: Instant) -> bool {
        if self.consecutive_failures < threshold {
            return true;
        }
        match self.last_failure {
            Some(at) => now.saturating_duration_since(at) >= cooldown,
            None => true,
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        self.last_failure = Some(now);
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn status(&self, threshold: u32, cooldown: Duration, now: Instant) -> NodeStatus {
        NodeStatus {
            addr: self.addr.clone(),
            in_flight: self.in_flight,
            capacity: self.capacity,
            consecutive_failures: self.consecutive_failures,
            last_failure_ms_ago: self
                .last_failure
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            healthy: self.is_healthy(threshold, cooldown, now),
            total_routed: self.total_routed,
        }
    }
}

/// Reported view of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub addr: String,
    pub in_flight: usize,
    pub capacity: usize,
    pub consecutive_failures: u32,
    pub last_failure_ms_ago: Option<u64>,
    pub healthy: bool,
    pub total_routed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = NodeStats::new("127.0.0.1:9001", 10);
        assert_eq!(node.addr, "127.0.0.1:9001");
        assert_eq!(node.in_flight, 0);
        assert_eq!(node.consecutive_failures, 0);
        assert!(node.last_failure.is_none());
        assert!(node.has_capacity());
    }

    #[test]
    fn test_capacity() {
        let mut node = NodeStats::new("a", 2);
        node.in_flight = 2;
        assert!(!node.has_capacity());
        node.in_flight = 1;
        assert!(node.has_capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_until_cooldown() {
        let cooldown = Duration::from_secs(30);
        let mut node = NodeStats::new("a", 10);
        let start = Instant::now();

        node.record_failure(start);
        node.record_failure(start);
        assert!(node.is_healthy(3, cooldown, start));
        node.record_failure(start);
        assert!(!node.is_healthy(3, cooldown, start));
        assert!(!node.is_healthy(3, cooldown, start + Duration::from_secs(29)));
        assert!(node.is_healthy(3, cooldown, start + Duration::from_secs(30)));

        node.record_success();
        assert!(node.is_healthy(3, cooldown, start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_report() {
        let mut node = NodeStats::new("a", 4);
        let start = Instant::now();
        node.record_failure(start);
        node.in_flight = 3;

        let status = node.status(3, Duration::from_secs(30), start + Duration::from_millis(250));
        assert_eq!(status.in_flight, 3);
        assert_eq!(status.last_failure_ms_ago, Some(250));
        assert!(status.healthy);
    }
}
