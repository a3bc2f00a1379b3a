// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event watcher: tails the bus as consumer `PM` and classifies events.
//!
//! Runs as a background task on a short poll, handing `(event, action)`
//! pairs to the loop through a channel. The loop drains at most
//! [`MAX_ACTIONS_PER_CYCLE`] per tick; the rest wait in the channel.

use pilot_core::{classify_topic, BusEvent, Clock, EventAction, PM};
use pilot_storage::MessageBus;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// Bus poll interval.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Handler invocations allowed per tick; excess events are deferred.
pub const MAX_ACTIONS_PER_CYCLE: usize = 25;

const CHANNEL_CAPACITY: usize = 256;

/// One classified bus event.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub event: BusEvent,
    pub action: EventAction,
}

impl ClassifiedEvent {
    pub fn classify(event: BusEvent) -> Self {
        let action = classify_topic(&event.topic);
        Self { event, action }
    }
}

/// Receiving end held by the PM loop.
pub struct EventWatcher {
    rx: mpsc::Receiver<ClassifiedEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl EventWatcher {
    /// A watcher fed manually (tests, and the `once`-mode inline reader).
    pub fn channel() -> (mpsc::Sender<ClassifiedEvent>, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            tx,
            Self {
                rx,
                shutdown: None,
            },
        )
    }

    /// Drain up to `max` pending events without blocking.
    pub fn try_drain(&mut self, max: usize) -> Vec<ClassifiedEvent> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(event) => out.push(event),
                Err(_) => break,
            }
        }
        out
    }

    /// Stop the background poll task, if one is attached.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the background tailer.
pub fn start_watcher<C: Clock>(bus: MessageBus<C>, poll: Duration) -> EventWatcher {
    let (tx, mut watcher) = EventWatcher::channel();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    watcher.shutdown = Some(shutdown_tx);

    tokio::spawn(async move {
        loop {
            match bus.read_new(PM) {
                Ok(events) => {
                    for event in events {
                        let classified = ClassifiedEvent::classify(event);
                        debug!(
                            topic = %classified.event.topic,
                            action = classified.action.as_str(),
                            "bus event observed"
                        );
                        if tx.send(classified).await.is_err() {
                            // Loop side gone; nothing left to do
                            return;
                        }
                    }
                }
                Err(e) => error!(error = %e, "bus read failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = &mut shutdown_rx => return,
            }
        }
    });

    watcher
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
