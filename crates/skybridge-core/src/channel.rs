//! Per-subscriber delivery channel.
//!
//! Each subscriber gets its own bounded FIFO and its own drain task.  The
//! drain task hands events to the listener strictly one at a time; the event
//! being handled stays at the front of the queue (and counts against the
//! capacity) until the listener returns.  Enqueueing never waits for the
//! listener, so a slow subscriber only ever holds up itself.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use skybridge_contracts::event::OverflowSource;

use crate::bus::BusShared;
use crate::event::SecurityEvent;
use crate::traits::SecurityEventListener;

/// Handle returned by `EventBus::subscribe`.  Never reused within one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Point-in-time view of one subscriber's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriberStats {
    pub capacity: usize,
    /// Events queued, including the one the listener is currently handling.
    pub pending: usize,
    /// Events rejected since the queue last drained empty.
    pub dropped_since_drain: u64,
    /// Whether a drain task is running.
    pub draining: bool,
}

/// Result of handing one event to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueOutcome {
    Accepted,
    Dropped,
    Closed,
}

struct ChannelState {
    pending: VecDeque<Arc<SecurityEvent>>,
    dropped_since_drain: u64,
    draining: bool,
    closed: bool,
    drain_task: Option<JoinHandle<()>>,
}

pub(crate) struct SubscriberChannel {
    id: SubscriptionId,
    capacity: usize,
    listener: Arc<dyn SecurityEventListener>,
    /// Non-owning link back to the bus, used only to report overflow.
    bus: Weak<BusShared>,
    state: Mutex<ChannelState>,
}

impl SubscriberChannel {
    pub(crate) fn new(
        id: SubscriptionId,
        capacity: usize,
        listener: Arc<dyn SecurityEventListener>,
        bus: Weak<BusShared>,
    ) -> Self {
        Self {
            id,
            capacity,
            listener,
            bus,
            state: Mutex::new(ChannelState {
                pending: VecDeque::with_capacity(capacity.min(64)),
                dropped_since_drain: 0,
                draining: false,
                closed: false,
                drain_task: None,
            }),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `event` for serial delivery, starting a drain task if none runs.
    ///
    /// A full queue rejects the event, bumps `dropped_since_drain`, and tells
    /// the bus so it can decide on a loss report.  The channel lock is released
    /// before the bus is contacted.
    pub(crate) fn enqueue(self: &Arc<Self>, event: Arc<SecurityEvent>) -> EnqueueOutcome {
        let dropped_since_drain = {
            let mut state = self.lock_state();
            if state.closed {
                return EnqueueOutcome::Closed;
            }

            if state.pending.len() >= self.capacity {
                state.dropped_since_drain = state.dropped_since_drain.saturating_add(1);
                state.dropped_since_drain
            } else {
                state.pending.push_back(event);
                if !state.draining {
                    state.draining = true;
                    state.drain_task = Some(tokio::spawn(Arc::clone(self).drain()));
                }
                return EnqueueOutcome::Accepted;
            }
        };

        debug!(
            subscription_id = %self.id,
            capacity = self.capacity,
            dropped_since_drain,
            "subscriber queue full, security event dropped"
        );

        if let Some(bus) = self.bus.upgrade() {
            bus.report_overflow(OverflowSource::Subscriber(self.id.0));
        }

        EnqueueOutcome::Dropped
    }

    /// Hand `event` straight to the listener on its own task, bypassing the
    /// pending queue and the drain loop.  Reserved for meta-events.
    pub(crate) fn deliver_direct(&self, event: Arc<SecurityEvent>) -> bool {
        if self.lock_state().closed {
            return false;
        }
        let listener = Arc::clone(&self.listener);
        tokio::spawn(async move {
            listener.on_event(event).await;
        });
        true
    }

    /// Stop delivery: discard pending events and abort the drain task.
    pub(crate) fn close(&self) {
        let task = {
            let mut state = self.lock_state();
            state.closed = true;
            state.draining = false;
            let abandoned = state.pending.len();
            state.pending.clear();
            if abandoned > 0 {
                debug!(subscription_id = %self.id, abandoned, "pending events abandoned on unsubscribe");
            }
            state.drain_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
    }

    pub(crate) fn stats(&self) -> SubscriberStats {
        let state = self.lock_state();
        SubscriberStats {
            capacity: self.capacity,
            pending: state.pending.len(),
            dropped_since_drain: state.dropped_since_drain,
            draining: state.draining,
        }
    }

    async fn drain(self: Arc<Self>) {
        trace!(subscription_id = %self.id, "drain started");

        loop {
            let next = {
                let mut state = self.lock_state();
                if state.closed {
                    return;
                }
                match state.pending.front() {
                    Some(event) => Arc::clone(event),
                    None => {
                        state.draining = false;
                        state.dropped_since_drain = 0;
                        state.drain_task = None;
                        trace!(subscription_id = %self.id, "drain finished");
                        return;
                    }
                }
            };

            self.listener.on_event(next).await;

            {
                let mut state = self.lock_state();
                if !state.closed {
                    state.pending.pop_front();
                }
            }
        }
    }
}
