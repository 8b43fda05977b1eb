//! Turns grants into timed light changes.
//!
//! A transition produces two independent timelines, one for the vehicle
//! heads and one for the pedestrian crossings. Callers drain them one event
//! at a time and wait out each event's delay themselves.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::signal::{self, JunctionLayout, ResourceId, SignalSnapshot};

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Delay that precedes each kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTiming {
    pub yellow: Duration,
    pub red: Duration,
    pub green: Duration,
    pub walk: Duration,
    pub stop: Duration,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            yellow: Duration::from_millis(3000),
            red: Duration::from_millis(2000),
            green: Duration::from_millis(2000),
            walk: Duration::from_millis(1000),
            stop: Duration::from_millis(1000),
        }
    }
}

impl SequenceTiming {
    /// No delays at all; for tests and simulations.
    pub fn immediate() -> Self {
        Self {
            yellow: Duration::ZERO,
            red: Duration::ZERO,
            green: Duration::ZERO,
            walk: Duration::ZERO,
            stop: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    VehicleYellow(ResourceId),
    VehicleRed(ResourceId),
    VehicleGreen(ResourceId),
    /// Crossing turns green.
    Walk(ResourceId),
    /// Crossing turns red.
    DontWalk(ResourceId),
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    pub delay: Duration,
    pub kind: EventKind,
    pub message: String,
}

/// Published whenever a new pair of timelines is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub generation: u64,
    pub from: ResourceId,
    pub to: ResourceId,
    pub noop: bool,
}

#[derive(Debug)]
pub struct Sequencer {
    layout: JunctionLayout,
    timing: SequenceTiming,
    vehicle: VecDeque<SignalEvent>,
    pedestrian: VecDeque<SignalEvent>,
    active: ResourceId,
    clearing: Option<ResourceId>,
    generation: u64,
    transitions: broadcast::Sender<Transition>,
}

impl Sequencer {
    pub fn new(layout: JunctionLayout, active: ResourceId, timing: SequenceTiming) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            layout,
            timing,
            vehicle: VecDeque::new(),
            pedestrian: VecDeque::new(),
            active,
            clearing: None,
            generation: 0,
            transitions,
        }
    }

    pub fn timing(&self) -> SequenceTiming {
        self.timing
    }

    pub fn active(&self) -> ResourceId {
        self.active
    }

    pub fn clearing(&self) -> Option<ResourceId> {
        self.clearing
    }

    pub fn vehicle_pending(&self) -> usize {
        self.vehicle.len()
    }

    pub fn pedestrian_pending(&self) -> usize {
        self.pedestrian.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Replaces both timelines with the change from `from` to `to`.
    ///
    /// Falls through to [`Sequencer::begin_noop`] when the two are equal.
    pub fn begin_transition(&mut self, from: ResourceId, to: ResourceId) -> Transition {
        if from == to {
            return self.begin_noop(to);
        }
        let old = self.layout.label(from);
        let new = self.layout.label(to);
        let t = self.timing;

        self.vehicle = VecDeque::from([
            SignalEvent {
                delay: t.yellow,
                kind: EventKind::VehicleYellow(from),
                message: format!("Junction {} is now YELLOW.", old),
            },
            SignalEvent {
                delay: t.red,
                kind: EventKind::VehicleRed(from),
                message: format!("Junction {} is now RED. Vehicles must stop.", old),
            },
            SignalEvent {
                delay: t.green,
                kind: EventKind::VehicleGreen(to),
                message: format!("Junction {} is now GREEN. Vehicles can go.", new),
            },
        ]);
        self.pedestrian = VecDeque::from([
            SignalEvent {
                delay: t.walk,
                kind: EventKind::Walk(from),
                message: format!("Pedestrian crossing {} is now GREEN. Safe to cross.", old),
            },
            SignalEvent {
                delay: t.stop,
                kind: EventKind::DontWalk(to),
                message: format!("Pedestrian crossing {} is now RED. Do not cross.", new),
            },
        ]);

        self.active = to;
        self.clearing = Some(from);
        self.publish(from, to, false)
    }

    /// Replaces both timelines with a single "nothing to do" notice each.
    pub fn begin_noop(&mut self, resource: ResourceId) -> Transition {
        let label = self.layout.label(resource);
        self.vehicle = VecDeque::from([SignalEvent {
            delay: Duration::ZERO,
            kind: EventKind::Notice,
            message: format!("Signal {} is already GREEN. No change needed.", label),
        }]);
        self.pedestrian = VecDeque::from([SignalEvent {
            delay: Duration::ZERO,
            kind: EventKind::Notice,
            message: format!("Pedestrian crossing {} is already RED. No change needed.", label),
        }]);

        self.active = resource;
        self.publish(resource, resource, true)
    }

    /// Appends a zero-delay notice to the vehicle timeline.
    pub fn announce(&mut self, message: impl Into<String>) {
        self.vehicle.push_back(SignalEvent {
            delay: Duration::ZERO,
            kind: EventKind::Notice,
            message: message.into(),
        });
    }

    pub fn next_vehicle_event(&mut self) -> Option<SignalEvent> {
        let event = self.vehicle.pop_front()?;
        if let EventKind::VehicleRed(resource) = event.kind {
            if self.clearing == Some(resource) {
                self.clearing = None;
            }
        }
        Some(event)
    }

    pub fn next_pedestrian_event(&mut self) -> Option<SignalEvent> {
        self.pedestrian.pop_front()
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        signal::snapshot(self.layout, self.active, self.clearing)
    }

    fn publish(&mut self, from: ResourceId, to: ResourceId, noop: bool) -> Transition {
        self.generation += 1;
        let transition = Transition {
            generation: self.generation,
            from,
            to,
            noop,
        };
        // No subscribers is fine.
        let _ = self.transitions.send(transition.clone());
        transition
    }
}
