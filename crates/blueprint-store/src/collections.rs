pub const JOBS: &str = "jobs";
pub const PLANS: &str = "plans";
pub const CONSENSUS: &str = "consensus";
pub const GROUNDING: &str = "grounding";
pub const TOOL_REPORTS: &str = "tool_reports";
pub const VERIFICATION: &str = "verification";
pub const DOCUMENTS: &str = "documents";
pub const GENERATION_CACHE: &str = "generation_cache";

/// Key for records scoped to one task of one job.
pub fn task_key(job_id: impl std::fmt::Display, task_id: impl std::fmt::Display) -> String {
    format!("{job_id}_{task_id}")
}
