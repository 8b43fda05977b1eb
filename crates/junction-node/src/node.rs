//! Arbiter node: clock sync, signal lock and sequencer behind one mutex.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use junction_common::{methods, Result};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::arbiter::{Acquired, Arbiter, ArbiterStats, Grant, Priority, RequestId};
use crate::clock_sync::{ClockSync, SyncOutcome};
use crate::config::NodeConfig;
use crate::sequencer::{SequenceTiming, Sequencer, SignalEvent, Transition};
use crate::signal::{JunctionLayout, ResourceId, SignalSnapshot};

struct NodeState {
    clock: ClockSync,
    arbiter: Arbiter,
    sequencer: Sequencer,
    /// Request whose transition the vehicle timeline is playing.
    sequence_owner: Option<RequestId>,
}

/// Counters and state reported by `systemStats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub node_id: String,
    pub layout: JunctionLayout,
    pub active_signal: ResourceId,
    pub active_label: String,
    pub authoritative_time: Option<String>,
    pub synchronized_time: Option<String>,
    pub participants: usize,
    pub participant_times: BTreeMap<String, String>,
    pub vehicle_events_pending: usize,
    pub pedestrian_events_pending: usize,
    pub signal_status: SignalSnapshot,
    pub arbiter: ArbiterStats,
    pub uptime_seconds: u64,
    pub requests_per_minute: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub server_type: &'static str,
    pub node_id: String,
    pub layout: JunctionLayout,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub methods: Vec<&'static str>,
}

/// One junction controller.
///
/// Every operation takes the state lock for a short, non-blocking critical
/// section. Event delays are slept after the lock is released, so a slow
/// poller never holds up other callers.
pub struct ArbiterNode {
    config: NodeConfig,
    state: Mutex<NodeState>,
    started: Instant,
}

impl ArbiterNode {
    pub fn new(config: NodeConfig) -> Self {
        let arbiter = Arbiter::new(config.arbiter.clone());
        let sequencer = Sequencer::new(config.arbiter.layout, arbiter.active(), config.timing);
        tracing::info!(
            node_id = %config.node_id,
            layout = %config.arbiter.layout,
            active = %arbiter.active(),
            vip_preemption = config.arbiter.vip_preemption,
            contention = ?config.arbiter.contention,
            "Arbiter node created"
        );
        Self {
            state: Mutex::new(NodeState {
                clock: ClockSync::new(),
                arbiter,
                sequencer,
                sequence_owner: None,
            }),
            config,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn layout(&self) -> JunctionLayout {
        self.config.arbiter.layout
    }

    pub fn timing(&self) -> SequenceTiming {
        self.config.timing
    }

    /// A panic while holding the lock cannot leave the state half-written
    /// in a way later calls can't live with, so poisoning is ignored.
    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_authoritative_time(&self, time: &str) -> Result<()> {
        self.state().clock.set_authoritative_time(time)?;
        Ok(())
    }

    pub fn register_participant_time(&self, id: &str, time: &str) -> Result<()> {
        self.state().clock.register_participant(id, time)?;
        Ok(())
    }

    /// Runs one Berkeley round; `None` while readings are missing.
    pub fn synchronize(&self) -> Option<String> {
        match self.state().clock.synchronize() {
            SyncOutcome::Synchronized(time) => Some(time.to_string()),
            SyncOutcome::Pending => {
                tracing::debug!("Synchronization pending, not enough readings");
                None
            }
        }
    }

    pub fn synchronized_time(&self) -> Option<String> {
        self.state().clock.synchronized_time().map(|t| t.to_string())
    }

    pub fn acquire_signal(&self, resource: u64, requester: Option<&str>) -> Result<bool> {
        self.acquire(resource, requester, Priority::Normal)
    }

    pub fn acquire_vip_signal(&self, resource: u64, requester: Option<&str>) -> Result<bool> {
        self.acquire(resource, requester, Priority::Vip)
    }

    fn acquire(&self, resource: u64, requester: Option<&str>, priority: Priority) -> Result<bool> {
        let layout = self.layout();
        let resource = layout.resource(resource)?;
        let label = layout.label(resource);
        let requester = match (requester, priority) {
            (Some(requester), _) => requester.to_string(),
            (None, Priority::Normal) => format!("controller-{}", label),
            (None, Priority::Vip) => format!("vip-{}", label),
        };

        let mut state = self.state();
        let outcome = state.arbiter.acquire(&requester, resource, priority)?;
        match &outcome {
            Acquired::Granted(grant) => self.start_sequence(&mut state, grant),
            Acquired::Preempted { grant, preempted } => {
                if state.sequence_owner == Some(preempted.id) {
                    tracing::info!(
                        request_id = preempted.id,
                        discarded = state.sequencer.vehicle_pending(),
                        "Preempted holder's remaining events discarded"
                    );
                }
                self.start_sequence(&mut state, grant);
            }
            Acquired::AlreadyHeld(handle) => {
                tracing::debug!(request_id = handle.id, requester = %requester, "Signal already held");
            }
            Acquired::Queued(handle) => {
                tracing::debug!(request_id = handle.id, requester = %requester, "Acquire queued");
                state.sequencer.announce(format!(
                    "Junction busy. Request from {} for junction {} is waiting.",
                    requester, label
                ));
            }
            Acquired::Denied => {
                state.sequencer.announce(format!(
                    "Junction busy. Request from {} for junction {} denied.",
                    requester, label
                ));
            }
        }
        Ok(outcome.is_granted())
    }

    /// Gives up the lock if `resource` (and `requester`, when given) match
    /// the current holder.
    pub fn release_signal(&self, resource: u64, requester: Option<&str>) -> Result<bool> {
        let resource = self.layout().resource(resource)?;
        let mut state = self.state();

        let Some(holder) = state.arbiter.holder() else {
            return Ok(false);
        };
        if holder.resource != resource || requester.is_some_and(|r| r != holder.requester) {
            return Ok(false);
        }
        let id = holder.id;

        if state.sequence_owner == Some(id) {
            state.sequence_owner = None;
        }
        if let Some(next) = state.arbiter.release(id) {
            self.start_sequence(&mut state, &next);
        }
        Ok(true)
    }

    /// Accepts a batch of simultaneous `(resource, arrival)` VIP requests.
    pub fn submit_vip_batch(&self, batch: &[(u64, u64)]) -> Result<bool> {
        let layout = self.layout();
        let batch = batch
            .iter()
            .map(|(resource, arrival)| layout.resource(*resource).map(|r| (r, *arrival)))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state();
        let outcome = state.arbiter.submit_vip_batch(&batch)?;
        match outcome {
            Some(Acquired::Granted(grant)) | Some(Acquired::Preempted { grant, .. }) => {
                self.start_sequence(&mut state, &grant);
            }
            Some(other) => {
                tracing::debug!(outcome = ?other, "VIP batch parked");
            }
            None => {
                tracing::debug!("Empty VIP batch");
            }
        }
        Ok(true)
    }

    /// Pops the next vehicle event and waits out its delay.
    pub async fn next_vehicle_event(&self) -> Option<String> {
        let event = {
            let mut state = self.state();
            let event = state.sequencer.next_vehicle_event();
            if event.is_some() {
                self.release_if_drained(&mut state);
            }
            event
        }?;
        Some(Self::deliver(event).await)
    }

    pub async fn next_pedestrian_event(&self) -> Option<String> {
        let event = self.state().sequencer.next_pedestrian_event()?;
        Some(Self::deliver(event).await)
    }

    pub fn active_signal(&self) -> ResourceId {
        self.state().arbiter.active()
    }

    pub fn signal_status_snapshot(&self) -> SignalSnapshot {
        self.state().sequencer.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.state().sequencer.subscribe()
    }

    pub fn system_stats(&self) -> NodeStats {
        let state = self.state();
        let arbiter = state.arbiter.stats();
        let uptime = self.started.elapsed();
        let minutes = (uptime.as_secs_f64() / 60.0).max(1.0 / 60.0);
        let active = state.arbiter.active();

        NodeStats {
            node_id: self.config.node_id.clone(),
            layout: self.layout(),
            active_signal: active,
            active_label: self.layout().label(active),
            authoritative_time: state.clock.authoritative_time().map(|t| t.to_string()),
            synchronized_time: state.clock.synchronized_time().map(|t| t.to_string()),
            participants: state.clock.participant_count(),
            participant_times: state
                .clock
                .participants()
                .map(|(id, time)| (id.to_string(), time.to_string()))
                .collect(),
            vehicle_events_pending: state.sequencer.vehicle_pending(),
            pedestrian_events_pending: state.sequencer.pedestrian_pending(),
            signal_status: state.sequencer.snapshot(),
            requests_per_minute: arbiter.counters.total_requests as f64 / minutes,
            arbiter,
            uptime_seconds: uptime.as_secs(),
        }
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            server_type: "node",
            node_id: self.config.node_id.clone(),
            layout: self.layout(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
            methods: methods::ALL.to_vec(),
        }
    }

    fn start_sequence(&self, state: &mut NodeState, grant: &Grant) {
        let transition = state.sequencer.begin_transition(grant.previous, grant.resource);
        state.sequence_owner = Some(grant.handle.id);
        tracing::info!(
            node_id = %self.config.node_id,
            request_id = grant.handle.id,
            requester = %grant.requester,
            from = %transition.from,
            to = %transition.to,
            noop = transition.noop,
            "Signal transition started"
        );
    }

    /// Once the holder's vehicle timeline is exhausted, the holder is done
    /// and the next waiter (if any) takes over.
    fn release_if_drained(&self, state: &mut NodeState) {
        if state.sequencer.vehicle_pending() > 0 {
            return;
        }
        let Some(owner) = state.sequence_owner.take() else {
            return;
        };
        if let Some(next) = state.arbiter.release(owner) {
            self.start_sequence(state, &next);
        }
    }

    async fn deliver(event: SignalEvent) -> String {
        if !event.delay.is_zero() {
            tokio::time::sleep(event.delay).await;
        }
        tracing::info!(kind = ?event.kind, "{}", event.message);
        event.message
    }
}
