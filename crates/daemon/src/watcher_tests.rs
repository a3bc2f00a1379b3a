// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{EventType, FakeClock};
use pilot_storage::StatePaths;
use serde_json::Value;

fn event(clock: &FakeClock, topic: &str) -> BusEvent {
    BusEvent::new(
        clock.epoch_ms(),
        EventType::Notify,
        "S-agent",
        PM,
        topic,
        Value::Null,
    )
}

#[test]
fn classification_matches_topic_table() {
    let clock = FakeClock::default();
    let classified = ClassifiedEvent::classify(event(&clock, "task.complete"));
    assert_eq!(classified.action, EventAction::AssignNext);

    let classified = ClassifiedEvent::classify(event(&clock, "weird.topic"));
    assert_eq!(classified.action, EventAction::LogOnly);
}

#[tokio::test]
async fn watcher_delivers_classified_events() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::default();
    let bus = MessageBus::new(StatePaths::new(dir.path()), clock.clone());

    bus.publish(&event(&clock, "session.start")).unwrap();
    bus.publish(&event(&clock, "task.claimed")).unwrap();

    let mut watcher = start_watcher(bus.clone(), Duration::from_millis(10));

    // Give the poll task a moment to pick things up
    let mut drained = Vec::new();
    for _ in 0..50 {
        drained.extend(watcher.try_drain(MAX_ACTIONS_PER_CYCLE));
        if drained.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].action, EventAction::GreetAgent);
    assert_eq!(drained[1].action, EventAction::TrackClaim);
    watcher.stop();
}

#[tokio::test]
async fn drain_respects_the_cap() {
    let (tx, mut watcher) = EventWatcher::channel();
    let clock = FakeClock::default();
    for i in 0..10 {
        tx.send(ClassifiedEvent::classify(event(&clock, &format!("t.{i}"))))
            .await
            .unwrap();
    }

    let first = watcher.try_drain(4);
    assert_eq!(first.len(), 4);
    // The rest stay queued for the next tick
    let second = watcher.try_drain(100);
    assert_eq!(second.len(), 6);
    assert!(watcher.try_drain(100).is_empty());
}
