use crate::events::EventBus;
use crate::verifier::VerificationReport;
use blueprint_core::{
    ArtifactSet, Credentials, EventEnvelope, EventLevel, IntelligenceJob, JobStatus, Phase, RunPlan,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Mutable run state of one job. Only the supervisor touches it.
pub(crate) struct JobState {
    pub(crate) credentials: Credentials,
    pub(crate) plan: Option<RunPlan>,
    pub(crate) artifacts: ArtifactSet,
    pub(crate) document: Option<String>,
    pub(crate) verification: Option<VerificationReport>,
}

/// Supervisor-side handle for one job: the record, its pause flag and its
/// run state.
pub(crate) struct JobControl {
    pub(crate) id: Uuid,
    record: Mutex<IntelligenceJob>,
    paused: watch::Sender<bool>,
    bus: Arc<EventBus>,
    running: AtomicBool,
    pub(crate) state: tokio::sync::Mutex<JobState>,
}

impl JobControl {
    pub(crate) fn new(job: IntelligenceJob, credentials: Credentials, bus: Arc<EventBus>) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            id: job.id,
            record: Mutex::new(job),
            paused,
            bus,
            state: tokio::sync::Mutex::new(JobState {
                credentials,
                plan: None,
                artifacts: ArtifactSet::new(),
                document: None,
                verification: None,
            }),
            running: AtomicBool::new(false),
        }
    }

    /// Append to the job log and publish on the bus.
    pub(crate) fn emit(
        &self,
        phase: Phase,
        event_type: &str,
        level: EventLevel,
        payload: serde_json::Value,
    ) {
        let event = EventEnvelope::new(self.id, phase, event_type, payload).with_level(level);
        self.record.lock().push_log(event.clone());
        self.bus.publish(event);
    }

    pub(crate) fn info(&self, phase: Phase, event_type: &str, payload: serde_json::Value) {
        self.emit(phase, event_type, EventLevel::Info, payload);
    }

    pub(crate) fn snapshot(&self) -> IntelligenceJob {
        self.record.lock().clone()
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.record.lock().status
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        self.record.lock().set_status(status);
    }

    pub(crate) fn set_plan_id(&self, plan_id: Uuid) {
        self.record.lock().plan_id = Some(plan_id);
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.record.lock().fail(reason);
    }

    /// Claim the job for one run. False if a run is already in progress.
    pub(crate) fn try_begin(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    /// Returns once the job is not paused. In-flight work is never
    /// interrupted; callers check this before each new dispatch.
    pub(crate) async fn wait_if_paused(&self) {
        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn control() -> Arc<JobControl> {
        let job = IntelligenceJob::new("proj", "doc", "prompt").with_log_limit(2);
        Arc::new(JobControl::new(
            job,
            Credentials::new("claude", "m"),
            Arc::new(EventBus::new()),
        ))
    }

    #[test]
    fn test_emit_logs_and_publishes() {
        let bus = Arc::new(EventBus::new());
        let job = IntelligenceJob::new("proj", "doc", "prompt").with_log_limit(2);
        let control = JobControl::new(job, Credentials::new("claude", "m"), bus.clone());
        for kind in ["A", "B", "C"] {
            control.info(Phase::Plan, kind, serde_json::json!({}));
        }
        let logs = control.snapshot().logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].event_type, "B");
        assert_eq!(bus.history(Some(control.id)).len(), 3);
    }

    #[tokio::test]
    async fn test_wait_if_paused_blocks_until_resume() {
        let control = control();
        control.set_paused(true);

        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_if_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        control.set_paused(false);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_single_run_at_a_time() {
        let control = control();
        assert!(control.try_begin());
        assert!(!control.try_begin());
        control.end();
        assert!(!control.is_running());
        assert!(control.try_begin());
    }

    #[tokio::test]
    async fn test_not_paused_returns_immediately() {
        let control = control();
        tokio::time::timeout(Duration::from_millis(100), control.wait_if_paused())
            .await
            .unwrap();
    }
}
