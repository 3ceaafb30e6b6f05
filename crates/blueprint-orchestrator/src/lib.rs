//! Multi-agent document pipeline for Blueprint.
//!
//! A job turns one product prompt into an eight-section technical document.
//! The [`Planner`] emits a fixed dependency graph of role tasks; the
//! [`Supervisor`] runs every ready task concurrently, scores each output,
//! runs static tools and grounding over it, assembles the sections in plan
//! order, verifies the document and runs one targeted revision pass.
//!
//! Generation goes through a content-addressed cache, so rerunning a job with
//! the same seed, credentials and inputs replays the stored text instead of
//! calling the model.
//!
//! # Main types
//!
//! - [`Supervisor`] / [`SupervisorBuilder`]: Job lifecycle and DAG execution.
//! - [`Planner`]: Produces the [`RunPlan`](blueprint_core::RunPlan) for a request.
//! - [`Dispatcher`]: Prompt assembly and cached, streaming generation.
//! - [`DeterministicCache`]: Store-backed generation cache keyed by a content hash.
//! - [`ConsensusEngine`]: Heuristic and semantic confidence scoring.
//! - [`GroundingValidator`]: Claim extraction and evidence lookup.
//! - [`Verifier`]: Rule-based whole-document verification.
//! - [`EventBus`]: Injectable publish/subscribe trace bus.
//! - [`PipelineConfig`]: Tunables loaded from configuration.

/// Content-addressed generation cache.
pub mod cache;
/// Pipeline configuration.
pub mod config;
/// Confidence scoring for raw agent output.
pub mod consensus;
mod control;
/// Prompt assembly and cached generation.
pub mod dispatcher;
/// Event bus and event type names.
pub mod events;
/// Claim grounding against the knowledge index and fact checker.
pub mod grounding;
/// Per-task execution pipeline.
pub mod pipeline;
/// Static run plan construction.
pub mod planner;
/// Role system prompts.
pub mod profiles;
/// Critique and targeted re-dispatch.
pub mod revision;
/// Job lifecycle and DAG execution.
pub mod supervisor;
/// Whole-document rulebook.
pub mod verifier;

pub use cache::{cache_key, CachedGeneration, DeterministicCache};
pub use config::PipelineConfig;
pub use consensus::{ConsensusEngine, ConsensusItem, Provenance, ScoredAlternative};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use events::{EventBus, EventSink, SubscriptionId};
pub use grounding::{GroundingEvidence, GroundingReport, GroundingStatus, GroundingValidator};
pub use pipeline::{TaskChunk, TaskOutput};
pub use planner::Planner;
pub use profiles::RolePrompts;
pub use revision::{Critique, CritiqueSeverity, RevisionOutcome};
pub use supervisor::{JobOutcome, JobRequest, Supervisor, SupervisorBuilder};
pub use verifier::{
    default_rulebook, Rule, RuleCheck, RuleSeverity, VerificationReport, VerificationStatus,
    Verifier,
};
