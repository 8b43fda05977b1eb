//! Timestamp-ordered mutual exclusion over the junction's single signal lock.
//!
//! Every request gets the next logical timestamp. The lock has at most one
//! holder. Contending NORMAL requests wait in `(timestamp, requester)` order.
//! A VIP request takes the lock from its holder when preemption is enabled.
//! VIP batches are resolved by [`Arbiter::multi_vip_resolve`] and parked in
//! their own queue, which is drained ahead of NORMAL waiters.
//!
//! The arbiter only decides who holds the lock. Turning a grant into light
//! changes is the sequencer's job, so every grant reports the resource that
//! was active before it.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use junction_common::{JunctionError, Result};
use serde::Serialize;

use crate::signal::{JunctionLayout, ResourceId};

pub type RequestId = u64;

/// Finished requests remembered for [`Arbiter::state_of`].
const HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    Vip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Granted,
    Released,
    Denied,
}

/// What a busy lock does with a contending NORMAL request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentionPolicy {
    /// Wait for the lock in timestamp order.
    #[default]
    Queue,
    /// Refuse outright. Kept for controllers that expect the old
    /// single-shot behaviour.
    Deny,
}

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub layout: JunctionLayout,
    /// Signal that is green before any grant.
    pub initial_active: ResourceId,
    pub vip_preemption: bool,
    pub contention: ContentionPolicy,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            layout: JunctionLayout::FourWay,
            initial_active: ResourceId(1),
            vip_preemption: true,
            contention: ContentionPolicy::Queue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub timestamp: u64,
    pub requester: String,
    pub resource: ResourceId,
    pub priority: Priority,
    /// Arrival time reported by the caller for VIP batches, otherwise the
    /// logical timestamp.
    pub arrival: u64,
    pub state: RequestState,
}

/// Caller-side reference to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestHandle {
    pub id: RequestId,
    pub timestamp: u64,
}

impl Request {
    fn handle(&self) -> RequestHandle {
        RequestHandle {
            id: self.id,
            timestamp: self.timestamp,
        }
    }
}

/// A request that has just taken the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub handle: RequestHandle,
    pub requester: String,
    pub resource: ResourceId,
    pub priority: Priority,
    /// Active resource before this grant.
    pub previous: ResourceId,
}

impl Grant {
    /// Whether the grant leaves the lights as they are.
    pub fn is_noop(&self) -> bool {
        self.previous == self.resource
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    Granted(Grant),
    /// The requester already holds the lock.
    AlreadyHeld(RequestHandle),
    Queued(RequestHandle),
    /// A VIP took the lock from `preempted`.
    Preempted { grant: Grant, preempted: RequestHandle },
    Denied,
}

impl Acquired {
    /// True when the caller holds the lock afterwards.
    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            Acquired::Granted(_) | Acquired::AlreadyHeld(_) | Acquired::Preempted { .. }
        )
    }

    pub fn grant(&self) -> Option<&Grant> {
        match self {
            Acquired::Granted(grant) | Acquired::Preempted { grant, .. } => Some(grant),
            _ => None,
        }
    }
}

/// Running totals since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbiterCounters {
    pub total_requests: u64,
    pub vip_requests: u64,
    pub granted: u64,
    pub queued: u64,
    pub denied: u64,
    pub released: u64,
    pub preempted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderInfo {
    pub request_id: RequestId,
    pub timestamp: u64,
    pub requester: String,
    pub resource: ResourceId,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbiterStats {
    pub logical_clock: u64,
    pub active_resource: ResourceId,
    pub holder: Option<HolderInfo>,
    pub pending: usize,
    pub vip_pending: usize,
    pub pending_by_resource: BTreeMap<ResourceId, usize>,
    #[serde(flatten)]
    pub counters: ArbiterCounters,
}

#[derive(Debug)]
pub struct Arbiter {
    config: ArbiterConfig,
    logical_clock: u64,
    next_request_id: RequestId,
    active: ResourceId,
    holder: Option<RequestId>,
    /// Requests that are pending or hold the lock.
    live: HashMap<RequestId, Request>,
    normal_queue: BTreeSet<(u64, String, RequestId)>,
    vip_queue: VecDeque<RequestId>,
    history: VecDeque<(RequestId, RequestState)>,
    counters: ArbiterCounters,
}

impl Arbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        let active = if config.layout.contains(config.initial_active) {
            config.initial_active
        } else {
            ResourceId(1)
        };
        Self {
            config,
            logical_clock: 0,
            next_request_id: 1,
            active,
            holder: None,
            live: HashMap::new(),
            normal_queue: BTreeSet::new(),
            vip_queue: VecDeque::new(),
            history: VecDeque::new(),
            counters: ArbiterCounters::default(),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn layout(&self) -> JunctionLayout {
        self.config.layout
    }

    /// Resource of the most recent grant.
    pub fn active(&self) -> ResourceId {
        self.active
    }

    pub fn logical_clock(&self) -> u64 {
        self.logical_clock
    }

    pub fn holder(&self) -> Option<&Request> {
        self.holder.and_then(|id| self.live.get(&id))
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.live.get(&id)
    }

    /// State of a live or recently finished request.
    pub fn state_of(&self, id: RequestId) -> Option<RequestState> {
        self.live.get(&id).map(|r| r.state).or_else(|| {
            self.history
                .iter()
                .rev()
                .find(|(finished, _)| *finished == id)
                .map(|(_, state)| *state)
        })
    }

    pub fn pending_count(&self) -> usize {
        self.normal_queue.len()
    }

    pub fn vip_pending_count(&self) -> usize {
        self.vip_queue.len()
    }

    pub fn pending_by_resource(&self) -> BTreeMap<ResourceId, usize> {
        let mut counts = BTreeMap::new();
        let queued = self
            .normal_queue
            .iter()
            .map(|(_, _, id)| id)
            .chain(self.vip_queue.iter());
        for id in queued {
            if let Some(request) = self.live.get(id) {
                *counts.entry(request.resource).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn counters(&self) -> ArbiterCounters {
        self.counters
    }

    pub fn stats(&self) -> ArbiterStats {
        ArbiterStats {
            logical_clock: self.logical_clock,
            active_resource: self.active,
            holder: self.holder().map(|r| HolderInfo {
                request_id: r.id,
                timestamp: r.timestamp,
                requester: r.requester.clone(),
                resource: r.resource,
                priority: r.priority,
            }),
            pending: self.pending_count(),
            vip_pending: self.vip_pending_count(),
            pending_by_resource: self.pending_by_resource(),
            counters: self.counters,
        }
    }

    /// Asks for the lock on behalf of `requester`.
    pub fn acquire(
        &mut self,
        requester: &str,
        resource: ResourceId,
        priority: Priority,
    ) -> Result<Acquired> {
        self.check_resource(resource)?;

        let preempts = priority == Priority::Vip && self.config.vip_preemption;

        let held = self
            .holder()
            .filter(|h| h.requester == requester)
            .map(|h| (h.handle(), h.resource));
        if let Some((handle, held)) = held {
            if held == resource {
                tracing::debug!(requester, resource = %resource, "Requester already holds the signal lock");
                return Ok(Acquired::AlreadyHeld(handle));
            }
            // A VIP holder switches by preempting its own grant below.
            if !preempts {
                let id = self.admit(requester, resource, priority, None);
                self.finish(id, RequestState::Denied);
                self.counters.denied += 1;
                tracing::info!(
                    requester,
                    resource = %resource,
                    held = %held,
                    "Holder asked for another signal without releasing, request denied"
                );
                return Ok(Acquired::Denied);
            }
        }

        let waiting = self.queued_for(requester).map(|r| r.id);
        if let Some(waiting) = waiting {
            if !preempts {
                let handle = self.retarget(waiting, resource)?;
                return Ok(Acquired::Queued(handle));
            }
            self.withdraw(waiting);
        }

        let id = self.admit(requester, resource, priority, None);

        if self.holder.is_none() {
            let grant = self.grant(id)?;
            return Ok(Acquired::Granted(grant));
        }

        if priority == Priority::Vip && self.config.vip_preemption {
            let preempted = self.preempt_holder()?;
            let grant = self.grant(id)?;
            return Ok(Acquired::Preempted { grant, preempted });
        }

        match self.config.contention {
            ContentionPolicy::Queue => {
                let handle = self.enqueue_normal(id)?;
                Ok(Acquired::Queued(handle))
            }
            ContentionPolicy::Deny => {
                self.finish(id, RequestState::Denied);
                self.counters.denied += 1;
                tracing::info!(requester, resource = %resource, "Signal lock busy, request denied");
                Ok(Acquired::Denied)
            }
        }
    }

    /// Gives up the lock held by `id` and hands it to the next waiter.
    ///
    /// Returns the promoted grant. Releasing anything but the current holder
    /// changes nothing.
    pub fn release(&mut self, id: RequestId) -> Option<Grant> {
        if self.holder != Some(id) {
            tracing::debug!(request_id = id, "Release ignored, request does not hold the lock");
            return None;
        }
        self.holder = None;
        self.finish(id, RequestState::Released);
        self.counters.released += 1;
        tracing::info!(request_id = id, "Signal lock released");
        self.promote_next()
    }

    /// Orders a batch of simultaneous VIP requests.
    ///
    /// Entries for the `active` signal win, in input order, since serving
    /// them needs no transition. The rest follow by arrival time; ties keep
    /// input order. Fewer than two entries come back unchanged.
    pub fn multi_vip_resolve(
        active: ResourceId,
        batch: &[(ResourceId, u64)],
    ) -> Vec<(ResourceId, u64)> {
        if batch.len() < 2 {
            return batch.to_vec();
        }
        let (mut ordered, mut rest): (Vec<_>, Vec<_>) =
            batch.iter().copied().partition(|(resource, _)| *resource == active);
        rest.sort_by_key(|(_, arrival)| *arrival);
        ordered.extend(rest);
        ordered
    }

    /// Resolves a VIP batch, grants its head and parks the rest.
    ///
    /// Returns `None` for an empty batch. An invalid resource anywhere in
    /// the batch rejects the whole batch.
    pub fn submit_vip_batch(&mut self, batch: &[(ResourceId, u64)]) -> Result<Option<Acquired>> {
        for (resource, _) in batch {
            self.check_resource(*resource)?;
        }
        if batch.is_empty() {
            return Ok(None);
        }

        let ordered = Self::multi_vip_resolve(self.active, batch);
        tracing::info!(
            batch = batch.len(),
            order = ?ordered.iter().map(|(r, _)| r.0).collect::<Vec<_>>(),
            "Resolved VIP batch"
        );

        let mut head = None;
        for (resource, arrival) in ordered {
            let requester = format!("vip-{}@{}", resource, arrival);
            let id = self.admit(&requester, resource, Priority::Vip, Some(arrival));
            let handle = self.set_state(id, RequestState::Pending)?;
            if head.is_none() {
                head = Some(handle);
            }
            self.vip_queue.push_back(id);
        }
        let head = head.ok_or_else(|| JunctionError::Internal("empty VIP batch".into()))?;

        if self.holder.is_none() {
            return Ok(Some(self.promote_next().map_or(Acquired::Queued(head), Acquired::Granted)));
        }
        if self.config.vip_preemption {
            let preempted = self.preempt_holder()?;
            return Ok(Some(match self.promote_next() {
                Some(grant) => Acquired::Preempted { grant, preempted },
                None => Acquired::Queued(head),
            }));
        }
        self.counters.queued += 1;
        Ok(Some(Acquired::Queued(head)))
    }

    fn check_resource(&self, resource: ResourceId) -> Result<()> {
        if self.config.layout.contains(resource) {
            Ok(())
        } else {
            Err(JunctionError::InvalidResource(format!(
                "signal {} is not part of a {} junction",
                resource, self.config.layout
            )))
        }
    }

    fn tick(&mut self) -> u64 {
        self.logical_clock += 1;
        self.logical_clock
    }

    fn queued_for(&self, requester: &str) -> Option<&Request> {
        self.normal_queue
            .iter()
            .find(|(_, queued, _)| queued == requester)
            .and_then(|(_, _, id)| self.live.get(id))
    }

    /// Points a queued request at `resource`, keeping its place in line.
    fn retarget(&mut self, id: RequestId, resource: ResourceId) -> Result<RequestHandle> {
        let request = self
            .live
            .get_mut(&id)
            .ok_or_else(|| JunctionError::Internal(format!("request {} is not live", id)))?;
        if request.resource != resource {
            tracing::info!(
                request_id = id,
                requester = %request.requester,
                from = %request.resource,
                to = %resource,
                "Queued request retargeted"
            );
            request.resource = resource;
        } else {
            tracing::debug!(request_id = id, "Requester already queued");
        }
        Ok(request.handle())
    }

    /// Drops a queued request that is being replaced by a VIP request.
    fn withdraw(&mut self, id: RequestId) {
        self.normal_queue.retain(|(_, _, queued)| *queued != id);
        self.finish(id, RequestState::Released);
        tracing::debug!(request_id = id, "Queued request withdrawn");
    }

    /// Stamps and stores a new pending request.
    fn admit(
        &mut self,
        requester: &str,
        resource: ResourceId,
        priority: Priority,
        arrival: Option<u64>,
    ) -> RequestId {
        let timestamp = self.tick();
        let id = self.next_request_id;
        self.next_request_id += 1;

        self.counters.total_requests += 1;
        if priority == Priority::Vip {
            self.counters.vip_requests += 1;
        }
        self.live.insert(
            id,
            Request {
                id,
                timestamp,
                requester: requester.to_string(),
                resource,
                priority,
                arrival: arrival.unwrap_or(timestamp),
                state: RequestState::Pending,
            },
        );
        tracing::debug!(
            request_id = id,
            timestamp,
            requester,
            resource = %resource,
            priority = ?priority,
            "Request admitted"
        );
        id
    }

    fn set_state(&mut self, id: RequestId, state: RequestState) -> Result<RequestHandle> {
        let request = self
            .live
            .get_mut(&id)
            .ok_or_else(|| JunctionError::Internal(format!("request {} is not live", id)))?;
        request.state = state;
        Ok(request.handle())
    }

    fn grant(&mut self, id: RequestId) -> Result<Grant> {
        let handle = self.set_state(id, RequestState::Granted)?;
        let request = self
            .request(id)
            .ok_or_else(|| JunctionError::Internal(format!("request {} is not live", id)))?;

        let grant = Grant {
            handle,
            requester: request.requester.clone(),
            resource: request.resource,
            priority: request.priority,
            previous: self.active,
        };
        self.holder = Some(id);
        self.active = grant.resource;
        self.counters.granted += 1;
        tracing::info!(
            request_id = id,
            timestamp = handle.timestamp,
            requester = %grant.requester,
            resource = %grant.resource,
            previous = %grant.previous,
            priority = ?grant.priority,
            "Signal lock granted"
        );
        Ok(grant)
    }

    fn enqueue_normal(&mut self, id: RequestId) -> Result<RequestHandle> {
        let handle = self.set_state(id, RequestState::Pending)?;
        let requester = self
            .request(id)
            .map(|r| r.requester.clone())
            .unwrap_or_default();
        tracing::info!(
            request_id = id,
            timestamp = handle.timestamp,
            requester = %requester,
            "Signal lock busy, request queued"
        );
        self.normal_queue.insert((handle.timestamp, requester, id));
        self.counters.queued += 1;
        Ok(handle)
    }

    fn preempt_holder(&mut self) -> Result<RequestHandle> {
        let id = self
            .holder
            .take()
            .ok_or_else(|| JunctionError::Internal("no holder to preempt".into()))?;
        let handle = self.set_state(id, RequestState::Released)?;
        if let Some(request) = self.live.get(&id) {
            tracing::warn!(
                request_id = id,
                requester = %request.requester,
                resource = %request.resource,
                "Holder preempted by VIP request"
            );
        }
        self.finish(id, RequestState::Released);
        self.counters.preempted += 1;
        self.counters.released += 1;
        Ok(handle)
    }

    fn promote_next(&mut self) -> Option<Grant> {
        while let Some(id) = self.vip_queue.pop_front() {
            if self.live.contains_key(&id) {
                return self.grant(id).ok();
            }
        }
        while let Some((_, _, id)) = self.normal_queue.pop_first() {
            if self.live.contains_key(&id) {
                return self.grant(id).ok();
            }
        }
        None
    }

    fn finish(&mut self, id: RequestId, state: RequestState) {
        self.live.remove(&id);
        self.history.push_back((id, state));
        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter() -> Arbiter {
        Arbiter::new(ArbiterConfig::default())
    }

    fn granted(outcome: Acquired) -> Grant {
        match outcome {
            Acquired::Granted(grant) => grant,
            other => panic!("expected a grant, got {:?}", other),
        }
    }

    #[test]
    fn test_free_lock_is_granted() {
        let mut arbiter = arbiter();
        let grant = granted(arbiter.acquire("c-2", ResourceId(2), Priority::Normal).unwrap());
        assert_eq!(grant.resource, ResourceId(2));
        assert_eq!(grant.previous, ResourceId(1));
        assert_eq!(arbiter.active(), ResourceId(2));
        assert_eq!(arbiter.holder().unwrap().requester, "c-2");
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut arbiter = arbiter();
        let mut last = 0;
        for (i, requester) in ["a", "b", "c", "d"].iter().enumerate() {
            let outcome = arbiter
                .acquire(requester, ResourceId(i as u8 % 4 + 1), Priority::Normal)
                .unwrap();
            let ts = match outcome {
                Acquired::Granted(g) => g.handle.timestamp,
                Acquired::Queued(h) => h.timestamp,
                other => panic!("unexpected {:?}", other),
            };
            assert!(ts > last);
            last = ts;
        }
        assert_eq!(arbiter.logical_clock(), last);
    }

    #[test]
    fn test_reacquire_by_holder_is_idempotent() {
        let mut arbiter = arbiter();
        let grant = granted(arbiter.acquire("c-3", ResourceId(3), Priority::Normal).unwrap());
        let clock = arbiter.logical_clock();

        let again = arbiter.acquire("c-3", ResourceId(3), Priority::Normal).unwrap();
        assert_eq!(again, Acquired::AlreadyHeld(grant.handle));
        assert_eq!(arbiter.logical_clock(), clock);
        assert_eq!(arbiter.pending_count(), 0);
        assert_eq!(arbiter.active(), ResourceId(3));
    }

    #[test]
    fn test_normal_requests_wait_in_timestamp_order() {
        let mut arbiter = arbiter();
        let holder = granted(arbiter.acquire("h", ResourceId(1), Priority::Normal).unwrap());

        let a = arbiter.acquire("a", ResourceId(2), Priority::Normal).unwrap();
        let b = arbiter.acquire("b", ResourceId(3), Priority::Normal).unwrap();
        let (Acquired::Queued(a), Acquired::Queued(b)) = (a, b) else {
            panic!("both should queue");
        };
        assert!(a.timestamp < b.timestamp);
        assert_eq!(arbiter.pending_count(), 2);

        let next = arbiter.release(holder.handle.id).unwrap();
        assert_eq!(next.handle, a);
        assert_eq!(next.previous, ResourceId(1));
        let next = arbiter.release(a.id).unwrap();
        assert_eq!(next.handle, b);
        assert!(arbiter.release(b.id).is_none());
        assert!(arbiter.holder().is_none());
        assert_eq!(arbiter.state_of(a.id), Some(RequestState::Released));
    }

    #[test]
    fn test_queued_requester_is_not_queued_twice() {
        let mut arbiter = arbiter();
        arbiter.acquire("h", ResourceId(1), Priority::Normal).unwrap();
        let first = arbiter.acquire("w", ResourceId(2), Priority::Normal).unwrap();
        let second = arbiter.acquire("w", ResourceId(2), Priority::Normal).unwrap();
        assert_eq!(first, second);
        assert_eq!(arbiter.pending_count(), 1);
    }

    #[test]
    fn test_holder_asking_for_another_signal_is_denied() {
        let mut arbiter = arbiter();
        let grant = granted(arbiter.acquire("east", ResourceId(2), Priority::Normal).unwrap());

        let outcome = arbiter.acquire("east", ResourceId(3), Priority::Normal).unwrap();
        assert_eq!(outcome, Acquired::Denied);
        assert!(!outcome.is_granted());
        assert_eq!(arbiter.active(), ResourceId(2));
        assert_eq!(arbiter.holder().unwrap().id, grant.handle.id);
        assert_eq!(arbiter.counters().denied, 1);
    }

    #[test]
    fn test_vip_holder_switches_by_preempting_itself() {
        let mut arbiter = arbiter();
        let grant = granted(arbiter.acquire("east", ResourceId(2), Priority::Normal).unwrap());

        match arbiter.acquire("east", ResourceId(4), Priority::Vip).unwrap() {
            Acquired::Preempted { grant: next, preempted } => {
                assert_eq!(preempted, grant.handle);
                assert_eq!(next.resource, ResourceId(4));
                assert_eq!(next.previous, ResourceId(2));
            }
            other => panic!("expected preemption, got {:?}", other),
        }
        assert_eq!(arbiter.active(), ResourceId(4));
        assert_eq!(arbiter.holder().unwrap().requester, "east");
    }

    #[test]
    fn test_queued_requester_can_retarget() {
        let mut arbiter = arbiter();
        let holder = granted(arbiter.acquire("h", ResourceId(1), Priority::Normal).unwrap());
        let Acquired::Queued(first) = arbiter.acquire("w", ResourceId(3), Priority::Normal).unwrap()
        else {
            panic!("should queue");
        };
        let second = arbiter.acquire("w", ResourceId(4), Priority::Normal).unwrap();
        assert_eq!(second, Acquired::Queued(first));
        assert_eq!(arbiter.request(first.id).unwrap().resource, ResourceId(4));
        assert_eq!(arbiter.pending_count(), 1);

        let next = arbiter.release(holder.handle.id).unwrap();
        assert_eq!(next.handle, first);
        assert_eq!(arbiter.active(), ResourceId(4));
    }

    #[test]
    fn test_queued_requester_turning_vip_preempts() {
        let mut arbiter = arbiter();
        arbiter.acquire("h", ResourceId(1), Priority::Normal).unwrap();
        let Acquired::Queued(waiting) = arbiter.acquire("w", ResourceId(3), Priority::Normal).unwrap()
        else {
            panic!("should queue");
        };

        let outcome = arbiter.acquire("w", ResourceId(2), Priority::Vip).unwrap();
        assert!(matches!(outcome, Acquired::Preempted { .. }));
        assert_eq!(arbiter.active(), ResourceId(2));
        assert_eq!(arbiter.pending_count(), 0);
        assert!(arbiter.request(waiting.id).is_none());
    }

    #[test]
    fn test_release_by_non_holder_is_ignored() {
        let mut arbiter = arbiter();
        let holder = granted(arbiter.acquire("h", ResourceId(2), Priority::Normal).unwrap());
        let Acquired::Queued(waiter) = arbiter.acquire("w", ResourceId(3), Priority::Normal).unwrap()
        else {
            panic!("should queue");
        };
        assert!(arbiter.release(waiter.id).is_none());
        assert_eq!(arbiter.holder().unwrap().id, holder.handle.id);
        assert_eq!(arbiter.state_of(waiter.id), Some(RequestState::Pending));
    }

    #[test]
    fn test_vip_preempts_holder() {
        let mut arbiter = arbiter();
        let holder = granted(arbiter.acquire("c-2", ResourceId(2), Priority::Normal).unwrap());

        match arbiter.acquire("ambulance", ResourceId(4), Priority::Vip).unwrap() {
            Acquired::Preempted { grant, preempted } => {
                assert_eq!(preempted, holder.handle);
                assert_eq!(grant.resource, ResourceId(4));
                assert_eq!(grant.previous, ResourceId(2));
            }
            other => panic!("expected preemption, got {:?}", other),
        }
        assert_eq!(arbiter.active(), ResourceId(4));
        assert_eq!(arbiter.state_of(holder.handle.id), Some(RequestState::Released));
        assert_eq!(arbiter.counters().preempted, 1);
    }

    #[test]
    fn test_vip_without_preemption_queues() {
        let mut arbiter = Arbiter::new(ArbiterConfig {
            vip_preemption: false,
            ..Default::default()
        });
        arbiter.acquire("c-2", ResourceId(2), Priority::Normal).unwrap();
        let outcome = arbiter.acquire("ambulance", ResourceId(4), Priority::Vip).unwrap();
        assert!(matches!(outcome, Acquired::Queued(_)));
        assert_eq!(arbiter.active(), ResourceId(2));
    }

    #[test]
    fn test_deny_policy_refuses_busy_requests() {
        let mut arbiter = Arbiter::new(ArbiterConfig {
            contention: ContentionPolicy::Deny,
            ..Default::default()
        });
        arbiter.acquire("c-2", ResourceId(2), Priority::Normal).unwrap();
        assert_eq!(
            arbiter.acquire("c-3", ResourceId(3), Priority::Normal).unwrap(),
            Acquired::Denied
        );
        assert_eq!(arbiter.pending_count(), 0);
        assert_eq!(arbiter.counters().denied, 1);
        assert_eq!(arbiter.active(), ResourceId(2));
    }

    #[test]
    fn test_invalid_resource_is_rejected() {
        let mut arbiter = Arbiter::new(ArbiterConfig {
            layout: JunctionLayout::TwoWay,
            ..Default::default()
        });
        let err = arbiter.acquire("x", ResourceId(3), Priority::Normal).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(arbiter.logical_clock(), 0);
    }

    #[test]
    fn test_multi_vip_resolve_prefers_active_then_arrival() {
        let batch = [(ResourceId(3), 9), (ResourceId(2), 7), (ResourceId(1), 8), (ResourceId(2), 1)];
        let ordered = Arbiter::multi_vip_resolve(ResourceId(2), &batch);
        assert_eq!(
            ordered,
            vec![(ResourceId(2), 7), (ResourceId(2), 1), (ResourceId(1), 8), (ResourceId(3), 9)]
        );
    }

    #[test]
    fn test_multi_vip_resolve_short_lists_unchanged() {
        assert!(Arbiter::multi_vip_resolve(ResourceId(1), &[]).is_empty());
        assert_eq!(
            Arbiter::multi_vip_resolve(ResourceId(1), &[(ResourceId(3), 4)]),
            vec![(ResourceId(3), 4)]
        );
    }

    #[test]
    fn test_multi_vip_resolve_ties_keep_input_order() {
        let batch = [(ResourceId(4), 5), (ResourceId(3), 5)];
        assert_eq!(Arbiter::multi_vip_resolve(ResourceId(1), &batch), batch.to_vec());
    }

    #[test]
    fn test_vip_batch_grants_head_and_parks_rest() {
        let mut arbiter = arbiter();
        let outcome = arbiter
            .submit_vip_batch(&[(ResourceId(3), 2), (ResourceId(4), 1)])
            .unwrap()
            .unwrap();
        let grant = granted(outcome);
        assert_eq!(grant.resource, ResourceId(4));
        assert_eq!(arbiter.vip_pending_count(), 1);

        let next = arbiter.release(grant.handle.id).unwrap();
        assert_eq!(next.resource, ResourceId(3));
        assert_eq!(next.priority, Priority::Vip);
    }

    #[test]
    fn test_vip_batch_drains_before_normal_waiters() {
        let mut arbiter = arbiter();
        let holder = granted(arbiter.acquire("h", ResourceId(2), Priority::Normal).unwrap());
        arbiter.acquire("w", ResourceId(1), Priority::Normal).unwrap();

        let outcome = arbiter
            .submit_vip_batch(&[(ResourceId(3), 1), (ResourceId(4), 2)])
            .unwrap()
            .unwrap();
        let Acquired::Preempted { grant, preempted } = outcome else {
            panic!("batch head should preempt");
        };
        assert_eq!(preempted, holder.handle);
        assert_eq!(grant.resource, ResourceId(3));

        let next = arbiter.release(grant.handle.id).unwrap();
        assert_eq!(next.resource, ResourceId(4));
        let next = arbiter.release(next.handle.id).unwrap();
        assert_eq!(next.requester, "w");
    }

    #[test]
    fn test_vip_batch_on_active_resource_is_noop_grant() {
        let mut arbiter = arbiter();
        let outcome = arbiter
            .submit_vip_batch(&[(ResourceId(2), 1), (ResourceId(1), 5)])
            .unwrap()
            .unwrap();
        let grant = granted(outcome);
        assert!(grant.is_noop());
        assert_eq!(grant.resource, ResourceId(1));
    }

    #[test]
    fn test_empty_and_invalid_batches() {
        let mut arbiter = arbiter();
        assert_eq!(arbiter.submit_vip_batch(&[]).unwrap(), None);
        assert!(arbiter.submit_vip_batch(&[(ResourceId(1), 1), (ResourceId(9), 2)]).is_err());
        assert_eq!(arbiter.vip_pending_count(), 0);
        assert_eq!(arbiter.logical_clock(), 0);
    }

    #[test]
    fn test_stats_report_queue_shape() {
        let mut arbiter = arbiter();
        arbiter.acquire("h", ResourceId(1), Priority::Normal).unwrap();
        arbiter.acquire("a", ResourceId(2), Priority::Normal).unwrap();
        arbiter.acquire("b", ResourceId(2), Priority::Normal).unwrap();

        let stats = arbiter.stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.pending_by_resource.get(&ResourceId(2)), Some(&2));
        assert_eq!(stats.holder.unwrap().requester, "h");
        assert_eq!(stats.counters.total_requests, 3);
        assert_eq!(stats.counters.queued, 2);
    }
}
