//! Listener trait for bus subscribers.
//!
//! Every subscriber (UI warnings, alerting, the audit chain) implements
//! `SecurityEventListener`.  The bus calls `on_event` from the subscriber's
//! own drain task, one event at a time, and waits for it to finish before
//! handing over the next one.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::SecurityEvent;

/// A consumer of security events.
///
/// Implementations must not assume anything about ordering relative to other
/// subscribers.  A slow or stuck `on_event` only delays this listener's own
/// queue.
#[async_trait]
pub trait SecurityEventListener: Send + Sync + 'static {
    /// Handle one event.
    ///
    /// Meta-events (`event.is_meta_event()`) may arrive while regular events
    /// for this listener are still queued.
    async fn on_event(&self, event: Arc<SecurityEvent>);
}

/// Adapts an async closure into a `SecurityEventListener`.
///
/// ```rust,ignore
/// let id = bus.subscribe(FnListener::new(|event| async move {
///     println!("{}", event.message());
/// }));
/// ```
pub struct FnListener<F> {
    handler: F,
}

impl<F> FnListener<F> {
    pub fn new<Fut>(handler: F) -> Self
    where
        F: Fn(Arc<SecurityEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut> SecurityEventListener for FnListener<F>
where
    F: Fn(Arc<SecurityEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_event(&self, event: Arc<SecurityEvent>) {
        (self.handler)(event).await;
    }
}

#[async_trait]
impl<L: SecurityEventListener> SecurityEventListener for Arc<L> {
    async fn on_event(&self, event: Arc<SecurityEvent>) {
        (**self).on_event(event).await;
    }
}
