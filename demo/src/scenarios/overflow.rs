//! Scenario 1: Overflow signalling
//!
//! Floods the bus past its main-queue capacity while one subscriber handles
//! events slowly from a tiny queue.  Both overflow sources share one rate
//! gate, so the operator sees at most one meta-event per interval, each
//! carrying the number of drops since the previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use skybridge_contracts::{
    config::TelemetryConfig,
    error::TelemetryResult,
    event::{SecurityEventType, Severity, CONTEXT_DROPPED_COUNT, CONTEXT_OVERFLOW_QUEUE},
};
use skybridge_core::{EventBus, FnListener, PublishOutcome, SecurityEvent};

use super::settle;

/// Queue capacity of the deliberately slow subscriber.
const SLOW_SUBSCRIBER_CAPACITY: usize = 4;

/// Events published past the main queue's capacity in each burst.
const BURST_EXCESS: usize = 20;

/// Run Scenario 1: two bursts separated by one meta-event interval.
pub async fn run_scenario(config: &TelemetryConfig) -> TelemetryResult<()> {
    println!("=== Scenario 1: Overflow signalling ===");
    println!();

    let bus = EventBus::new(config.bus.clone());
    let meta_seen = Arc::new(AtomicU64::new(0));

    // Operator console: prints meta-events as they arrive.
    let seen = Arc::clone(&meta_seen);
    bus.subscribe(FnListener::new(move |event: Arc<SecurityEvent>| {
        let seen = Arc::clone(&seen);
        async move {
            if event.is_meta_event() {
                seen.fetch_add(1, Ordering::SeqCst);
                let context = event.context();
                println!(
                    "    [meta] {} (queue={}, droppedCount={})",
                    event.message(),
                    context.get(CONTEXT_OVERFLOW_QUEUE).map(String::as_str).unwrap_or("?"),
                    context.get(CONTEXT_DROPPED_COUNT).map(String::as_str).unwrap_or("?"),
                );
            }
        }
    }));

    // Alert forwarder stuck behind a slow uplink.
    let slow = bus.subscribe_with_capacity(
        FnListener::new(|_event: Arc<SecurityEvent>| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }),
        SLOW_SUBSCRIBER_CAPACITY,
    );

    let burst = config.bus.main_queue_capacity + BURST_EXCESS;

    println!("  Burst 1: publishing {} events", burst);
    let (enqueued, dropped) = publish_burst(&bus, burst, "burst-1").await;
    println!("    enqueued={} dropped={}", enqueued, dropped);
    settle(100).await;

    let interval = config.bus.meta_event_min_interval();
    println!();
    println!("  Waiting {} ms for the rate gate to reopen", interval.as_millis() + 100);
    tokio::time::sleep(interval + Duration::from_millis(100)).await;

    println!("  Burst 2: publishing {} events", burst);
    let (enqueued, dropped) = publish_burst(&bus, burst, "burst-2").await;
    println!("    enqueued={} dropped={}", enqueued, dropped);
    settle(100).await;

    let stats = bus.stats();
    println!();
    println!("  Bus stats:");
    println!("    enqueued total        : {}", stats.enqueued_total);
    println!("    dropped total         : {}", stats.dropped_total);
    println!("    meta-events emitted   : {}", stats.meta_events_emitted);
    println!("    meta-events suppressed: {}", stats.meta_events_suppressed);
    println!("    drops awaiting report : {}", stats.unreported_drops);
    if let Some(slow_stats) = bus.subscriber_stats(slow) {
        println!(
            "    slow subscriber {}    : pending={} dropped_since_drain={}",
            slow, slow_stats.pending, slow_stats.dropped_since_drain
        );
    }

    bus.unsubscribe(slow);
    println!();
    println!(
        "  Operator saw {} meta-event(s) for {} dropped event(s)",
        meta_seen.load(Ordering::SeqCst),
        stats.dropped_total
    );
    println!();
    Ok(())
}

async fn publish_burst(bus: &EventBus, count: usize, label: &str) -> (usize, usize) {
    let mut enqueued = 0;
    let mut dropped = 0;
    for n in 0..count {
        let event = SecurityEvent::new(
            SecurityEventType::RateLimitExceeded,
            Severity::Warning,
            format!("inbound message rate exceeded ({label} #{n})"),
        )
        .with_context("peer", "iphone-15");

        match bus.publish(event).await {
            PublishOutcome::Dropped => dropped += 1,
            _ => enqueued += 1,
        }
    }
    (enqueued, dropped)
}
