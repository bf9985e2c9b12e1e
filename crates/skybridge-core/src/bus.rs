//! The security event bus.
//!
//! `EventBus` owns a bounded main queue, the subscriber registry, and the
//! shared overflow gate.  Publishing is non-blocking: an accepted event is
//! appended to the main queue and a dispatcher task fans it out to every
//! `SubscriberChannel`.  Nothing on the publish path waits for a listener.
//!
//! Locking: the bus state and each channel's state are separate mutexes and
//! no code path holds both.  The dispatcher releases the bus lock before it
//! enqueues into channels, and a channel releases its own lock before
//! reporting overflow back to the bus.
//!
//! The bus is a cheap `Clone` handle.  Build one at startup and pass it to
//! every producer and consumer.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use skybridge_contracts::config::BusConfig;
use skybridge_contracts::event::OverflowSource;

use crate::channel::{EnqueueOutcome, SubscriberChannel, SubscriberStats, SubscriptionId};
use crate::event::SecurityEvent;
use crate::overflow::{GateDecision, OverflowGate};
use crate::traits::SecurityEventListener;

/// What happened to a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Accepted into the main queue for fan-out.
    Enqueued,
    /// Rejected because the main queue was full.
    Dropped,
    /// A meta-event, handed straight to this many subscribers.
    DeliveredDirect { subscribers: usize },
}

/// Counters describing the bus since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub main_queue_depth: usize,
    pub subscribers: usize,
    pub enqueued_total: u64,
    /// Drops across the main queue and every subscriber queue.
    pub dropped_total: u64,
    pub meta_events_emitted: u64,
    pub meta_events_suppressed: u64,
    /// Drops counted but not yet reported by a meta-event.
    pub unreported_drops: u64,
}

struct BusState {
    main_queue: VecDeque<Arc<SecurityEvent>>,
    dispatching: bool,
    subscribers: BTreeMap<SubscriptionId, Arc<SubscriberChannel>>,
    gate: OverflowGate,
    enqueued_total: u64,
    dropped_total: u64,
}

impl BusState {
    fn channels(&self) -> Vec<Arc<SubscriberChannel>> {
        self.subscribers.values().cloned().collect()
    }
}

pub(crate) struct BusShared {
    config: BusConfig,
    next_subscription: AtomicU64,
    state: Mutex<BusState>,
}

impl BusShared {
    fn lock_state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one drop from `source` and emit a loss report if the shared gate
    /// allows it.
    pub(crate) fn report_overflow(&self, source: OverflowSource) {
        let (decision, channels) = {
            let mut state = self.lock_state();
            state.dropped_total = state.dropped_total.saturating_add(1);
            let decision = state.gate.record_drop(Instant::now());
            let channels = match decision {
                GateDecision::Emit { .. } => state.channels(),
                GateDecision::Suppress => Vec::new(),
            };
            (decision, channels)
        };

        match decision {
            GateDecision::Suppress => {
                trace!(queue = %source, "overflow meta-event suppressed by rate limit");
            }
            GateDecision::Emit { dropped } => {
                warn!(
                    queue = %source,
                    dropped,
                    "security events dropped, emitting overflow meta-event"
                );
                let report = Arc::new(SecurityEvent::overflow_report(source, dropped));
                Self::deliver_direct(&report, &channels);
            }
        }
    }

    fn deliver_direct(event: &Arc<SecurityEvent>, channels: &[Arc<SubscriberChannel>]) -> usize {
        channels
            .iter()
            .filter(|channel| channel.deliver_direct(Arc::clone(event)))
            .count()
    }

    fn deliver_meta(&self, event: Arc<SecurityEvent>) -> usize {
        let channels = self.lock_state().channels();
        Self::deliver_direct(&event, &channels)
    }

    fn enqueue_main(self: &Arc<Self>, event: Arc<SecurityEvent>) -> PublishOutcome {
        let start_dispatcher = {
            let mut state = self.lock_state();
            if state.main_queue.len() >= self.config.main_queue_capacity {
                None
            } else {
                state.main_queue.push_back(event);
                state.enqueued_total = state.enqueued_total.saturating_add(1);
                let start = !state.dispatching;
                state.dispatching = true;
                Some(start)
            }
        };

        match start_dispatcher {
            None => {
                debug!(
                    capacity = self.config.main_queue_capacity,
                    "main queue full, security event dropped"
                );
                self.report_overflow(OverflowSource::MainQueue);
                PublishOutcome::Dropped
            }
            Some(start) => {
                if start {
                    tokio::spawn(Arc::clone(self).dispatch());
                }
                PublishOutcome::Enqueued
            }
        }
    }

    /// Move events from the main queue into every subscriber channel.
    async fn dispatch(self: Arc<Self>) {
        loop {
            let (event, channels) = {
                let mut state = self.lock_state();
                match state.main_queue.pop_front() {
                    Some(event) => (event, state.channels()),
                    None => {
                        state.dispatching = false;
                        return;
                    }
                }
            };

            let accepted = channels
                .iter()
                .filter(|channel| channel.enqueue(Arc::clone(&event)) == EnqueueOutcome::Accepted)
                .count();
            trace!(
                event_id = %event.id(),
                accepted,
                subscribers = channels.len(),
                "security event fanned out"
            );

            tokio::task::yield_now().await;
        }
    }
}

/// Bounded, backpressure-aware publish/fan-out hub for security events.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus with the given limits.
    pub fn new(config: BusConfig) -> Self {
        let gate = OverflowGate::new(config.meta_event_min_interval());
        let main_queue = VecDeque::with_capacity(config.main_queue_capacity.min(1024));
        Self {
            shared: Arc::new(BusShared {
                config,
                next_subscription: AtomicU64::new(1),
                state: Mutex::new(BusState {
                    main_queue,
                    dispatching: false,
                    subscribers: BTreeMap::new(),
                    gate,
                    enqueued_total: 0,
                    dropped_total: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Publish an event to every subscriber.
    ///
    /// Regular events go through the main queue; when it is full the event is
    /// dropped and the shared overflow gate may emit a loss report.
    /// Meta-events skip every queue and are handed to each listener directly.
    ///
    /// Never fails and never waits for a listener.  Must be called from within
    /// a Tokio runtime.
    pub async fn publish(&self, event: SecurityEvent) -> PublishOutcome {
        let event = Arc::new(event);

        if event.is_meta_event() {
            let subscribers = self.shared.deliver_meta(event);
            return PublishOutcome::DeliveredDirect { subscribers };
        }

        trace!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            severity = %event.severity(),
            "publishing security event"
        );
        self.shared.enqueue_main(event)
    }

    /// Schedule `publish` on the current runtime without waiting for it.
    ///
    /// For call sites that cannot await.  Outside a Tokio runtime the event
    /// is logged and discarded.
    pub fn publish_detached(&self, event: SecurityEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let bus = self.clone();
                handle.spawn(async move {
                    bus.publish(event).await;
                });
            }
            Err(_) => {
                warn!(
                    event_type = %event.event_type(),
                    severity = %event.severity(),
                    "no async runtime available, security event discarded"
                );
            }
        }
    }

    /// Register `listener` with the configured per-subscriber capacity.
    pub fn subscribe(&self, listener: impl SecurityEventListener) -> SubscriptionId {
        self.subscribe_with_capacity(listener, self.shared.config.subscriber_capacity)
    }

    /// Register `listener` with its own queue capacity (minimum 1).
    pub fn subscribe_with_capacity(
        &self,
        listener: impl SecurityEventListener,
        capacity: usize,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        let channel = Arc::new(SubscriberChannel::new(
            id,
            capacity.max(1),
            Arc::new(listener),
            Arc::downgrade(&self.shared),
        ));

        let subscribers = {
            let mut state = self.shared.lock_state();
            state.subscribers.insert(id, channel);
            state.subscribers.len()
        };

        info!(subscription_id = %id, capacity, subscribers, "security event subscriber registered");
        id
    }

    /// Remove a subscriber.  Returns false for an unknown id.
    ///
    /// Events still pending for it are abandoned; a listener call already in
    /// progress is cancelled at its next await point.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.shared.lock_state().subscribers.remove(&id);
        match removed {
            Some(channel) => {
                channel.close();
                info!(subscription_id = %channel.id(), "security event subscriber removed");
                true
            }
            None => {
                debug!(subscription_id = %id, "unsubscribe for unknown subscription ignored");
                false
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock_state().subscribers.len()
    }

    pub fn subscriber_stats(&self, id: SubscriptionId) -> Option<SubscriberStats> {
        let channel = self.shared.lock_state().subscribers.get(&id).cloned();
        channel.map(|channel| channel.stats())
    }

    pub fn stats(&self) -> BusStats {
        let state = self.shared.lock_state();
        BusStats {
            main_queue_depth: state.main_queue.len(),
            subscribers: state.subscribers.len(),
            enqueued_total: state.enqueued_total,
            dropped_total: state.dropped_total,
            meta_events_emitted: state.gate.emitted_total(),
            meta_events_suppressed: state.gate.suppressed_total(),
            unreported_drops: state.gate.pending_drops(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
