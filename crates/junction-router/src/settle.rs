//! Delayed in-flight decrements.
//!
//! A successful call keeps counting against its node's capacity for a
//! settle period, the time the junction needs to play out the transition
//! the call started. The scheduler owns a single task that keeps the due
//! decrements in a min-heap and applies them as their deadlines pass.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::load_balancer::LoadBalancer;

enum Command {
    Schedule { node: usize, due: Instant },
    Shutdown,
}

pub struct SettleScheduler {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl SettleScheduler {
    /// Starts the scheduler task. Must be called inside a Tokio runtime.
    pub fn spawn(balancer: Arc<Mutex<LoadBalancer>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(balancer, rx));
        Self { tx, handle }
    }

    /// Releases one in-flight slot of `node` after `delay`.
    pub fn schedule(&self, node: usize, delay: Duration) {
        let due = Instant::now() + delay;
        if self.tx.send(Command::Schedule { node, due }).is_err() {
            tracing::debug!(node, "Settle scheduler stopped, decrement dropped");
        }
    }

    /// Stops the task; decrements still pending are dropped.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SettleScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(balancer: Arc<Mutex<LoadBalancer>>, mut rx: mpsc::UnboundedReceiver<Command>) {
    // Sequence number keeps equal deadlines in submission order.
    let mut pending: BinaryHeap<Reverse<(Instant, u64, usize)>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let next_due = pending.peek().map(|Reverse((due, _, _))| *due);

        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Schedule { node, due }) => {
                    pending.push(Reverse((due, seq, node)));
                    seq += 1;
                }
                Some(Command::Shutdown) | None => {
                    tracing::debug!(dropped = pending.len(), "Settle scheduler shutting down");
                    return;
                }
            },
            _ = sleep_until(next_due), if next_due.is_some() => {
                let now = Instant::now();
                let mut balancer = balancer.lock().await;
                while let Some(Reverse((due, _, node))) = pending.peek().copied() {
                    if due > now {
                        break;
                    }
                    pending.pop();
                    balancer.settle(node);
                    tracing::trace!(node, "In-flight call settled");
                }
            }
        }
    }
}

async fn sleep_until(due: Option<Instant>) {
    if let Some(due) = due {
        tokio::time::sleep_until(due).await;
    }
}
