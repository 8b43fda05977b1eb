use std::sync::Arc;

use junction_node::{
    ArbiterNode, ContentionPolicy, Face, JunctionLayout, NodeConfig, ResourceId, SequenceTiming,
};

fn node() -> ArbiterNode {
    ArbiterNode::new(NodeConfig::default().with_timing(SequenceTiming::immediate()))
}

async fn drain_vehicle(node: &ArbiterNode) -> Vec<String> {
    let mut events = Vec::new();
    while let Some(event) = node.next_vehicle_event().await {
        events.push(event);
    }
    events
}

fn assert_complement(node: &ArbiterNode) {
    let faces = node.signal_status_snapshot();
    let active = node.layout().label(node.active_signal());
    let greens: Vec<_> = faces
        .iter()
        .filter(|(_, status)| status.vehicle == Face::Green)
        .map(|(label, _)| label.clone())
        .collect();
    assert_eq!(greens, vec![active.clone()]);
    for (label, status) in &faces {
        let expected = if *label == active { Face::Red } else { Face::Green };
        assert_eq!(status.pedestrian, expected, "crossing {}", label);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquires_grant_one_holder_at_a_time() {
    let node = Arc::new(node());
    let mut transitions = node.subscribe();

    let tasks: Vec<_> = (0..32u64)
        .map(|i| {
            let node = node.clone();
            tokio::spawn(async move { node.acquire_signal(i % 4 + 1, Some(&format!("car-{}", i))) })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);

    let stats = node.system_stats();
    assert!(stats.arbiter.holder.is_some());
    assert_eq!(stats.arbiter.pending, 31);

    // Every drained timeline hands the lock to exactly one waiter.
    drain_vehicle(&node).await;
    let stats = node.system_stats();
    assert!(stats.arbiter.holder.is_none());
    assert_eq!(stats.arbiter.pending, 0);
    assert_eq!(stats.arbiter.counters.granted, 32);
    assert_eq!(stats.arbiter.counters.released, 32);

    let mut previous = ResourceId(1);
    for _ in 0..32 {
        let transition = transitions.recv().await.unwrap();
        assert_eq!(transition.from, previous);
        previous = transition.to;
    }
    assert_eq!(previous, node.active_signal());
}

#[tokio::test]
async fn test_vip_preemption_truncates_holder_sequence() {
    let node = node();
    assert!(node.acquire_signal(1, Some("holder")).unwrap());
    assert!(node.acquire_signal(1, Some("holder")).unwrap());
    let holder_events = drain_vehicle(&node).await;
    assert_eq!(holder_events.len(), 1);

    assert!(node.acquire_signal(3, Some("holder")).unwrap());
    assert_eq!(node.next_vehicle_event().await.unwrap(), "Junction 1 is now YELLOW.");

    assert!(node.acquire_vip_signal(2, Some("fire-engine")).unwrap());
    assert_eq!(node.active_signal(), ResourceId(2));
    let events = drain_vehicle(&node).await;
    assert_eq!(events.first().unwrap(), "Junction 3 is now YELLOW.");
    assert_eq!(events.last().unwrap(), "Junction 2 is now GREEN. Vehicles can go.");
    assert!(events.iter().all(|e| !e.contains("Junction 3 is now GREEN")));
}

#[tokio::test]
async fn test_normal_requests_are_served_by_timestamp() {
    let node = node();
    assert!(node.acquire_signal(2, Some("holder")).unwrap());
    assert!(!node.acquire_signal(3, Some("a")).unwrap());
    assert!(!node.acquire_signal(4, Some("b")).unwrap());

    let mut transitions = node.subscribe();
    drain_vehicle(&node).await;

    let first = transitions.recv().await.unwrap();
    let second = transitions.recv().await.unwrap();
    assert_eq!((first.from, first.to), (ResourceId(2), ResourceId(3)));
    assert_eq!((second.from, second.to), (ResourceId(3), ResourceId(4)));
}

#[tokio::test]
async fn test_berkeley_example() {
    let node = node();
    node.set_authoritative_time("10:00:00").unwrap();
    node.register_participant_time("north", "10:00:02").unwrap();
    node.register_participant_time("south", "09:59:58").unwrap();
    assert_eq!(node.synchronize().as_deref(), Some("10:00:00"));
}

#[tokio::test]
async fn test_exhausted_sequence_stays_empty() {
    let node = node();
    assert!(node.acquire_signal(2, None).unwrap());
    for _ in 0..3 {
        assert!(node.next_vehicle_event().await.is_some());
    }
    for _ in 0..3 {
        assert!(node.next_vehicle_event().await.is_none());
    }

    assert!(node.acquire_signal(4, None).unwrap());
    assert!(node.next_vehicle_event().await.is_some());
}

#[tokio::test]
async fn test_snapshot_invariant_holds_across_activity() {
    let node = node();
    assert_complement(&node);

    let script: &[(u64, bool)] = &[(2, false), (3, false), (4, true), (1, false), (4, false), (2, true)];
    for (resource, vip) in script {
        if *vip {
            node.acquire_vip_signal(*resource, None).unwrap();
        } else {
            node.acquire_signal(*resource, None).unwrap();
        }
        assert_complement(&node);
        node.next_vehicle_event().await;
        assert_complement(&node);
        node.next_pedestrian_event().await;
        assert_complement(&node);
    }
    while node.next_vehicle_event().await.is_some() {
        assert_complement(&node);
    }
}

#[tokio::test]
async fn test_idempotent_re_request() {
    let node = node();
    assert!(node.acquire_signal(3, None).unwrap());
    let before = node.system_stats();
    assert!(node.acquire_signal(3, None).unwrap());
    let after = node.system_stats();

    assert_eq!(after.arbiter.pending, 0);
    assert_eq!(after.arbiter.logical_clock, before.arbiter.logical_clock);
    assert_eq!(after.active_signal, ResourceId(3));
}

#[tokio::test]
async fn test_independent_nodes_share_nothing() {
    let east = node();
    let west = ArbiterNode::new(
        NodeConfig::default()
            .with_node_id("west")
            .with_layout(JunctionLayout::TwoWay)
            .with_contention(ContentionPolicy::Deny)
            .with_timing(SequenceTiming::immediate()),
    );

    assert!(east.acquire_signal(4, None).unwrap());
    assert!(west.acquire_signal(2, None).unwrap());
    assert!(!west.acquire_signal(1, None).unwrap());

    assert_eq!(east.active_signal(), ResourceId(4));
    assert_eq!(west.active_signal(), ResourceId(2));
    assert_eq!(west.signal_status_snapshot()["B"].vehicle, Face::Green);
    assert_eq!(east.system_stats().arbiter.counters.denied, 0);
    assert_eq!(west.system_stats().arbiter.counters.denied, 1);
}

#[tokio::test]
async fn test_holder_must_release_before_switching() {
    let node = node();
    assert!(node.acquire_signal(2, Some("east")).unwrap());
    assert!(!node.acquire_signal(3, Some("east")).unwrap());
    assert_eq!(node.active_signal(), ResourceId(2));

    assert!(node.acquire_vip_signal(4, Some("east")).unwrap());
    assert_eq!(node.active_signal(), ResourceId(4));
    let events = drain_vehicle(&node).await;
    assert_eq!(events.first().unwrap(), "Junction 2 is now YELLOW.");
    assert_eq!(events.last().unwrap(), "Junction 4 is now GREEN. Vehicles can go.");
}

#[tokio::test]
async fn test_queued_requester_keeps_latest_signal() {
    let node = node();
    assert!(node.acquire_signal(2, Some("holder")).unwrap());
    assert!(!node.acquire_signal(3, Some("w")).unwrap());
    assert!(!node.acquire_signal(4, Some("w")).unwrap());
    assert_eq!(node.system_stats().arbiter.pending, 1);

    let mut transitions = node.subscribe();
    drain_vehicle(&node).await;
    let next = transitions.recv().await.unwrap();
    assert_eq!((next.from, next.to), (ResourceId(2), ResourceId(4)));
    assert_eq!(node.active_signal(), ResourceId(4));
}

#[tokio::test]
async fn test_vip_preempts_vip_holder() {
    let node = node();
    assert!(node.acquire_vip_signal(2, Some("ambulance")).unwrap());
    assert_eq!(node.next_vehicle_event().await.unwrap(), "Junction 1 is now YELLOW.");

    assert!(node.acquire_vip_signal(3, Some("fire-engine")).unwrap());
    assert_eq!(node.active_signal(), ResourceId(3));

    let events = drain_vehicle(&node).await;
    assert_eq!(events.first().unwrap(), "Junction 2 is now YELLOW.");
    assert!(events.iter().all(|e| !e.contains("Junction 2 is now GREEN")));

    let counters = node.system_stats().arbiter.counters;
    assert_eq!(counters.preempted, 1);
    assert_eq!(counters.vip_requests, 2);
}

#[tokio::test]
async fn test_vip_without_preemption_waits_its_turn() {
    let node = ArbiterNode::new(
        NodeConfig::default()
            .with_vip_preemption(false)
            .with_timing(SequenceTiming::immediate()),
    );
    assert!(node.acquire_signal(2, Some("holder")).unwrap());
    assert!(!node.acquire_signal(3, Some("bus")).unwrap());
    assert!(!node.acquire_vip_signal(4, Some("ambulance")).unwrap());
    assert_eq!(node.active_signal(), ResourceId(2));
    assert_eq!(node.system_stats().arbiter.pending, 2);

    let mut transitions = node.subscribe();
    drain_vehicle(&node).await;
    let first = transitions.recv().await.unwrap();
    let second = transitions.recv().await.unwrap();
    assert_eq!((first.from, first.to), (ResourceId(2), ResourceId(3)));
    assert_eq!((second.from, second.to), (ResourceId(3), ResourceId(4)));
    assert_eq!(node.system_stats().arbiter.counters.preempted, 0);
}
