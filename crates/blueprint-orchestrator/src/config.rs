use blueprint_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunables for one supervisor instance. Every field has a default, so an
/// empty `[pipeline]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Context longer than this (in characters) is truncated before dispatch.
    pub context_max_chars: usize,
    /// Leading characters kept verbatim when truncating.
    pub context_head_chars: usize,
    /// Chunk size used when replaying a cached generation to a stream.
    pub replay_chunk_chars: usize,
    /// Minimum knowledge-index similarity for a claim to count as grounded.
    pub grounding_threshold: f32,
    /// Claims extracted per artifact.
    pub max_claims: usize,
    /// Record ungrounded claims as issues (turns the report to WARN).
    pub enforce_grounding: bool,
    /// Run the revision loop after the first verification.
    pub revision_enabled: bool,
    /// Envelopes kept on each job record.
    pub job_log_limit: usize,
    /// Wrap each dispatch in the task's `max_duration_secs` deadline.
    pub enforce_task_budgets: bool,
    /// System prompts that replace the built-in role prompts.
    pub prompt_overrides: BTreeMap<AgentRole, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_max_chars: 60_000,
            context_head_chars: 10_000,
            replay_chunk_chars: 64,
            grounding_threshold: 0.78,
            max_claims: 3,
            enforce_grounding: false,
            revision_enabled: true,
            job_log_limit: 200,
            enforce_task_budgets: false,
            prompt_overrides: BTreeMap::new(),
        }
    }
}
