//! Integration tests exercising `TransferCoordinator` against the concrete
//! scenarios and invariants. The event bus is constructed by the test (as
//! the process entry point would) and cloned into the coordinator, so the
//! test can subscribe and, where a scenario calls for it, publish events a
//! sibling subsystem (e.g. the volume monitor) would normally emit.

use dailies::system_info::MockSystemInfoPort;
use dailies::{
    CoordinatorConfig, Event, EventBus, FilesystemMetadataPort, Priority, TransferStatus,
    VerificationPolicy,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn make_coordinator(parallel_copies: u8, bus: EventBus) -> dailies::TransferCoordinator {
    let config = CoordinatorConfig {
        parallel_copies,
        chunk_size: 64 * 1024,
        buffer_size: 1024 * 1024,
        verify_mode: VerificationPolicy::SizeOnly,
        bandwidth_limit_bytes_per_second: 0,
        mappings: HashMap::new(),
        watcher_poll_interval: Duration::from_millis(50),
        max_retries: 3,
        retry_delay_ms: 10,
        retry_backoff_cap_ms: 100,
    };
    dailies::TransferCoordinator::new(
        config,
        bus,
        Arc::new(FilesystemMetadataPort::new()),
        Arc::new(MockSystemInfoPort::new()),
    )
}

fn drain_until<F>(rx: &dailies::EventReceiver, timeout: Duration, mut matches_event: F) -> bool
where
    F: FnMut(&Event) -> bool,
{
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if let Some(event) = rx.recv_timeout(Duration::from_millis(100)) {
            if matches_event(&event) {
                return true;
            }
        }
    }
    false
}

/// Scenario 3: with a single worker, an Urgent transfer queued alongside
/// several Normal ones completes first.
#[test]
fn urgent_transfer_completes_before_normal_ones() {
    let dir = tempdir().unwrap();
    let mut write = |name: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![7u8; 1024 * 1024]).unwrap();
        path
    };

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(1, bus);

    let normal_sources: Vec<_> = (0..3).map(|i| write(&format!("normal_{i}.mov"))).collect();
    let normal_ids: Vec<_> = normal_sources
        .iter()
        .enumerate()
        .map(|(i, src)| {
            coordinator
                .enqueue(src.clone(), dir.path().join(format!("out_normal_{i}.mov")), 1024 * 1024, Priority::Normal, None)
                .unwrap()
        })
        .collect();

    let urgent_source = write("urgent.mov");
    let urgent_id = coordinator
        .enqueue(urgent_source, dir.path().join("out_urgent.mov"), 1024 * 1024, Priority::Urgent, None)
        .unwrap();

    let mut completion_order = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while completion_order.len() < 4 && std::time::Instant::now() < deadline {
        if let Some(Event::Completed { id }) = rx.recv_timeout(Duration::from_millis(200)) {
            completion_order.push(id);
        }
    }

    assert_eq!(completion_order.len(), 4, "expected all four transfers to complete");
    assert_eq!(completion_order[0], urgent_id, "urgent transfer should complete first");
    for id in &normal_ids {
        assert!(completion_order.contains(id));
    }

    coordinator.shutdown(Duration::from_secs(2));
}

/// Scenario 6: enqueueing the same source/size twice back-to-back is
/// rejected as a duplicate and produces no additional work.
#[test]
fn duplicate_enqueue_is_rejected() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    std::fs::write(&source, vec![1u8; 4096]).unwrap();

    let coordinator = make_coordinator(2, EventBus::new());
    let first = coordinator
        .enqueue(source.clone(), dir.path().join("out1.mov"), 4096, Priority::Normal, None)
        .unwrap();
    let second = coordinator.enqueue(source, dir.path().join("out2.mov"), 4096, Priority::Normal, None);

    assert!(second.is_err());
    assert_eq!(coordinator.status(first).unwrap().status, TransferStatus::Queued);
    coordinator.shutdown(Duration::from_secs(2));
}

/// Target already present with identical size: transfer lands on `Skipped`
/// with the source left untouched.
#[test]
fn target_with_identical_size_is_skipped() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    let target = dir.path().join("out.mov");
    std::fs::write(&source, vec![9u8; 2048]).unwrap();
    std::fs::write(&target, vec![0u8; 2048]).unwrap();

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(1, bus);
    let id = coordinator.enqueue(source.clone(), target, 2048, Priority::Normal, None).unwrap();

    assert!(drain_until(&rx, Duration::from_secs(3), |e| matches!(e, Event::Skipped { id: skipped, .. } if *skipped == id)));
    assert_eq!(coordinator.status(id).unwrap().status, TransferStatus::Skipped);
    assert!(source.exists(), "source must be preserved on skip");
    coordinator.shutdown(Duration::from_secs(2));
}

/// Volume detach mid-flight collaterally errors out any non-terminal
/// transfer sourced from that volume.
#[test]
fn volume_detach_errors_running_transfer() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("big.mov");
    std::fs::write(&source, vec![3u8; 8 * 1024 * 1024]).unwrap();

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(1, bus.clone());
    let volume = dailies::VolumeId::new("E:");
    let id = coordinator
        .enqueue(source, dir.path().join("out.mov"), 8 * 1024 * 1024, Priority::Normal, Some(volume.clone()))
        .unwrap();

    assert!(drain_until(&rx, Duration::from_secs(2), |e| matches!(e, Event::Started { id: started, .. } if *started == id)));

    // Simulate the volume monitor observing the detach, as it would in a
    // running process sharing this same bus.
    bus.publish(Event::VolumeDetached { id: volume });

    assert!(drain_until(&rx, Duration::from_secs(2), |e| matches!(e, Event::Error { id: errored, .. } if *errored == id)));
    let record = coordinator.status(id).unwrap();
    assert_eq!(record.status, TransferStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("source_volume_detached"));
    coordinator.shutdown(Duration::from_secs(2));
}

/// Zero-byte source completes immediately with a single terminal event.
#[test]
fn zero_byte_source_completes_trivially() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("empty.mov");
    std::fs::write(&source, []).unwrap();

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(1, bus);
    let id = coordinator.enqueue(source, dir.path().join("out.mov"), 0, Priority::Normal, None).unwrap();

    assert!(drain_until(&rx, Duration::from_secs(2), |e| matches!(e, Event::Completed { id: done } if *done == id)));
    assert_eq!(coordinator.status(id).unwrap().total_bytes, 0);
    coordinator.shutdown(Duration::from_secs(2));
}

/// Scenario 2: pausing a running transfer halts progress; after resuming,
/// the copy restarts and runs through to completion.
#[test]
fn pause_mid_transfer_then_resume_completes() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("big.mov");
    std::fs::write(&source, vec![5u8; 16 * 1024 * 1024]).unwrap();

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(1, bus);
    let id = coordinator
        .enqueue(source, dir.path().join("out.mov"), 16 * 1024 * 1024, Priority::Normal, None)
        .unwrap();

    assert!(drain_until(&rx, Duration::from_secs(2), |e| matches!(e, Event::Started { id: started, .. } if *started == id)));
    coordinator.pause(id).unwrap();
    assert!(drain_until(&rx, Duration::from_secs(2), |e| matches!(e, Event::Paused { id: paused } if *paused == id)));
    assert_eq!(coordinator.status(id).unwrap().status, TransferStatus::Paused);

    // No further progress is published for the paused transfer.
    let mut saw_progress = false;
    let deadline = std::time::Instant::now() + Duration::from_millis(200);
    while std::time::Instant::now() < deadline {
        if let Some(Event::Progress { id: progressed, .. }) = rx.recv_timeout(Duration::from_millis(50)) {
            if progressed == id {
                saw_progress = true;
            }
        }
    }
    assert!(!saw_progress, "a paused transfer must not keep reporting progress");

    coordinator.resume(id).unwrap();
    assert!(drain_until(&rx, Duration::from_secs(5), |e| matches!(e, Event::Completed { id: done } if *done == id)));
    assert_eq!(coordinator.status(id).unwrap().status, TransferStatus::Completed);
    coordinator.shutdown(Duration::from_secs(2));
}

/// Batch status recomputes to `Completed` once every member finishes.
#[test]
fn batch_completes_once_all_members_finish() {
    let dir = tempdir().unwrap();
    let mut items = Vec::new();
    for i in 0..3 {
        let source = dir.path().join(format!("clip_{i}.mov"));
        std::fs::write(&source, vec![1u8; 1024]).unwrap();
        items.push((source, dir.path().join(format!("out_{i}.mov")), 1024u64, None));
    }

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let coordinator = make_coordinator(2, bus);
    let batch_id = coordinator
        .enqueue_batch("daily roll".to_string(), None, items, Priority::Normal)
        .unwrap();

    assert!(drain_until(&rx, Duration::from_secs(5), |e| matches!(e, Event::BatchCompleted { batch_id: done } if *done == batch_id)));
    assert_eq!(coordinator.batch_status(batch_id).unwrap().status, dailies::BatchStatus::Completed);
    coordinator.shutdown(Duration::from_secs(2));
}
