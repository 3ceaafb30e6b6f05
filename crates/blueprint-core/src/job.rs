use crate::event::EventEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default cap on the per-job event log.
pub const DEFAULT_JOB_LOG_LIMIT: usize = 200;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
    /// Advisory: stops new dispatches, does not preempt in-flight calls.
    Paused,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// The execution record for one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceJob {
    pub id: Uuid,
    pub project_id: String,
    pub document_id: String,
    pub prompt: String,
    pub status: JobStatus,
    pub plan_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<EventEnvelope>,
    #[serde(default = "default_log_limit")]
    pub log_limit: usize,
}

fn default_log_limit() -> usize {
    DEFAULT_JOB_LOG_LIMIT
}

impl IntelligenceJob {
    pub fn new(
        project_id: impl Into<String>,
        document_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            document_id: document_id.into(),
            prompt: prompt.into(),
            status: JobStatus::Created,
            plan_id: None,
            error: None,
            created_at: now,
            updated_at: now,
            logs: Vec::new(),
            log_limit: DEFAULT_JOB_LOG_LIMIT,
        }
    }

    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit.max(1);
        self
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        self.set_status(JobStatus::Failed);
    }

    /// Append an event, dropping the oldest entries beyond the log limit.
    pub fn push_log(&mut self, event: EventEnvelope) {
        self.logs.push(event);
        if self.logs.len() > self.log_limit {
            let excess = self.logs.len() - self.log_limit;
            self.logs.drain(..excess);
        }
        self.updated_at = Utc::now();
    }
}
