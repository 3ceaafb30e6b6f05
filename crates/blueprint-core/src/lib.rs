//! Core types and error definitions for the Blueprint document pipeline.
//!
//! This crate provides the foundational types shared across all Blueprint crates:
//! the error enum, the closed set of agent roles and document sections, the
//! task graph, the job record, the typed artifact blackboard, and trace events.
//!
//! # Main types
//!
//! - [`BlueprintError`]: Unified error enum for all Blueprint subsystems.
//! - [`BlueprintResult`]: Convenience alias for `Result<T, BlueprintError>`.
//! - [`AgentRole`] / [`Section`]: The eight pipeline roles and the section each one writes.
//! - [`Task`] / [`RunPlan`]: One unit of work and the dependency graph that orders them.
//! - [`IntelligenceJob`]: The execution record owned by the supervisor.
//! - [`ArtifactSet`]: Section-keyed blackboard built up while a job runs.
//! - [`EventEnvelope`]: Immutable trace record published on the event bus.

/// Typed section → text blackboard.
pub mod artifact;
/// Provider credentials passed through to collaborators.
pub mod credentials;
/// Trace event envelopes.
pub mod event;
/// Job lifecycle record.
pub mod job;
/// Agent roles and document sections.
pub mod section;
/// Tasks and run plans.
pub mod task;

pub use artifact::ArtifactSet;
pub use credentials::Credentials;
pub use event::{EventEnvelope, EventLevel, Phase};
pub use job::{IntelligenceJob, JobStatus};
pub use section::{AgentRole, Section};
pub use task::{RunPlan, Task, TaskBudget, TaskId, TaskStatus};

use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the Blueprint pipeline.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// The task graph has unmet dependencies and nothing is in flight.
    #[error("Deadlock: {0}")]
    Deadlock(String),

    /// The generation collaborator failed or returned unusable output.
    #[error("Generation error: {0}")]
    Generation(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error from the persistent store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// Input rejected by a typed invariant (empty artifact, bad plan, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// No job with this id is known to the supervisor.
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// No task with this id exists in the plan.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// An error from the supervisor or executor loop.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`BlueprintError`].
pub type BlueprintResult<T> = Result<T, BlueprintError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BlueprintError::Deadlock("2 tasks blocked".to_string());
        assert_eq!(err.to_string(), "Deadlock: 2 tasks blocked");

        let id = Uuid::new_v4();
        let err = BlueprintError::JobNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: BlueprintError = parse.unwrap_err().into();
        assert!(matches!(err, BlueprintError::Json(_)));
    }
}
