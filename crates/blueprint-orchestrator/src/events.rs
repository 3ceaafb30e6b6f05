use blueprint_core::EventEnvelope;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Envelopes kept in the bus-wide history.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Event type names published by the pipeline.
pub mod kinds {
    pub const PLAN_CREATED: &str = "PLAN_CREATED";
    pub const PLAN_INVALID: &str = "PLAN_INVALID";
    pub const JOB_STARTED: &str = "JOB_STARTED";
    pub const JOB_PAUSED: &str = "JOB_PAUSED";
    pub const JOB_RESUMED: &str = "JOB_RESUMED";
    pub const JOB_COMPLETED: &str = "JOB_COMPLETED";
    pub const JOB_FAILED: &str = "JOB_FAILED";
    pub const TASK_STARTED: &str = "TASK_STARTED";
    pub const TASK_COMPLETED: &str = "TASK_COMPLETED";
    pub const TASK_FAILED: &str = "TASK_FAILED";
    pub const TASK_RETRIED: &str = "TASK_RETRIED";
    pub const DEADLOCK: &str = "DEADLOCK";
    pub const DISPATCH_COMPLETED: &str = "DISPATCH_COMPLETED";
    pub const CONSENSUS_SCORED: &str = "CONSENSUS_SCORED";
    pub const TOOLS_COMPLETED: &str = "TOOLS_COMPLETED";
    pub const GROUNDING_COMPLETED: &str = "GROUNDING_COMPLETED";
    pub const VERIFICATION_COMPLETED: &str = "VERIFICATION_COMPLETED";
    pub const REVISION_CRITIQUE: &str = "REVISION_CRITIQUE";
    pub const REVISION_DISPATCH: &str = "REVISION_DISPATCH";
    pub const REVISION_RESIDUAL: &str = "REVISION_RESIDUAL";
}

/// Synchronous observer. Called on the publishing task; must not block.
pub type EventSink = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// In-process pub/sub for trace events with a bounded global history.
///
/// Constructed explicitly and shared by `Arc`; there is no process-wide
/// instance.
pub struct EventBus {
    sinks: RwLock<Vec<(SubscriptionId, EventSink)>>,
    next_id: AtomicU64,
    history: Mutex<VecDeque<EventEnvelope>>,
    history_limit: usize,
    channel: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(limit: usize) -> Self {
        let (channel, _) = broadcast::channel(256);
        Self {
            sinks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            history: Mutex::new(VecDeque::new()),
            history_limit: limit.max(1),
            channel,
        }
    }

    /// Register a callback sink.
    pub fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks.write().push((id, sink));
        id
    }

    /// Returns whether the sink was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(sid, _)| *sid != id);
        sinks.len() != before
    }

    /// Async subscription. Slow receivers observe `Lagged` rather than
    /// slowing down publishers.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<EventEnvelope> {
        self.channel.subscribe()
    }

    /// Record the envelope and fan it out to every subscriber.
    pub fn publish(&self, event: EventEnvelope) {
        {
            let mut history = self.history.lock();
            history.push_back(event.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        // Sinks run outside the lock so they may publish or unsubscribe.
        let sinks: Vec<EventSink> = self.sinks.read().iter().map(|(_, s)| s.clone()).collect();
        for sink in sinks {
            sink(&event);
        }

        // No receivers is fine.
        let _ = self.channel.send(event);
    }

    /// History in publish order, optionally restricted to one job.
    pub fn history(&self, job_id: Option<Uuid>) -> Vec<EventEnvelope> {
        self.history
            .lock()
            .iter()
            .filter(|e| job_id.map_or(true, |id| e.job_id == id))
            .cloned()
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use blueprint_core::Phase;
    use std::sync::atomic::AtomicUsize;

    fn envelope(job_id: Uuid, kind: &str) -> EventEnvelope {
        EventEnvelope::new(job_id, Phase::Dispatch, kind, serde_json::json!({}))
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::with_history_limit(3);
        let job = Uuid::new_v4();
        for i in 0..5 {
            bus.publish(envelope(job, &format!("E{i}")));
        }
        let history = bus.history(None);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].event_type, "E2");
        assert_eq!(history[2].event_type, "E4");
    }

    #[test]
    fn test_history_filters_by_job() {
        let bus = EventBus::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        bus.publish(envelope(a, "A"));
        bus.publish(envelope(b, "B"));
        bus.publish(envelope(a, "A2"));
        assert_eq!(bus.history(Some(a)).len(), 2);
        assert_eq!(bus.history(Some(b)).len(), 1);
    }

    #[test]
    fn test_sink_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = bus.subscribe(Arc::new(move |_e: &EventEnvelope| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bus.publish(envelope(Uuid::new_v4(), "X"));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(envelope(Uuid::new_v4(), "Y"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sink_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.subscribe(Arc::new(move |e: &EventEnvelope| {
            if e.event_type == "OUTER" {
                inner.publish(envelope(e.job_id, "INNER"));
            }
        }));
        bus.publish(envelope(Uuid::new_v4(), "OUTER"));
        let kinds: Vec<String> = bus.history(None).into_iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec!["OUTER", "INNER"]);
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_channel();
        let job = Uuid::new_v4();
        bus.publish(envelope(job, kinds::TASK_STARTED));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, job);
        assert_eq!(received.event_type, kinds::TASK_STARTED);
    }
}
