use crate::control::JobControl;
use crate::events::kinds;
use crate::pipeline::{build_context, TaskOutput, TaskPipeline};
use blueprint_agent::stream::strip_code_fence;
use blueprint_agent::GenerationMode;
use blueprint_core::{
    AgentRole, ArtifactSet, BlueprintError, BlueprintResult, Credentials, EventLevel, Phase,
    RunPlan, Section,
};
use blueprint_tools::{check_coherence, coherence_report, CoherenceIssue, ToolReport, ToolSeverity};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Synthetic task id for the critique call's cache entry.
pub const CRITIQUE_SCOPE: &str = "revision-critique";
const SUMMARY_CHARS: usize = 1_000;

const CRITIQUE_PROMPT: &str = "\
You are a principal architect reviewing a complete technical design document for internal \
consistency, missing decisions and risks.

Return a JSON object of the form:
{\"critiques\": [{\"severity\": \"critical|major|minor|suggestion\", \"role\": \"product|ux|frontend|backend|data_model|security|platform|testing\", \"section\": \"<section name>\", \"issue\": \"...\", \"recommendation\": \"...\"}]}

Attribute each finding to the role whose section must change. Use \"suggestion\" for \
nice-to-have improvements. Return {\"critiques\": []} when the document is consistent.";

/// How urgently a finding needs a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueSeverity {
    Critical,
    Major,
    Minor,
    /// Never triggers a revision.
    Suggestion,
}

impl CritiqueSeverity {
    /// Anything other than `suggestion` is actionable; unrecognised labels
    /// count as minor.
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "suggestion" => Self::Suggestion,
            "critical" | "blocker" => Self::Critical,
            "major" | "high" | "error" => Self::Major,
            _ => Self::Minor,
        }
    }

    fn from_tool(severity: ToolSeverity) -> Self {
        match severity {
            ToolSeverity::Critical => Self::Critical,
            ToolSeverity::High => Self::Major,
            ToolSeverity::Medium => Self::Minor,
            ToolSeverity::Low | ToolSeverity::Info => Self::Suggestion,
        }
    }
}

/// One review finding attributed to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub severity: CritiqueSeverity,
    pub role: AgentRole,
    pub section: Section,
    pub issue: String,
    pub recommendation: String,
}

impl From<&CoherenceIssue> for Critique {
    fn from(issue: &CoherenceIssue) -> Self {
        Self {
            severity: CritiqueSeverity::from_tool(issue.severity),
            role: issue.affected_role,
            section: issue.affected_role.section(),
            issue: issue.issue.clone(),
            recommendation: issue.recommendation.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawCritique {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    section: String,
    #[serde(default)]
    issue: String,
    #[serde(default)]
    recommendation: String,
}

/// Parse the critique call's response: either `{"critiques": [...]}` or a
/// bare array. Entries without a recognisable role are dropped.
pub fn parse_critiques(response: &str) -> BlueprintResult<Vec<Critique>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(response))?;
    let list = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => map
            .remove("critiques")
            .or_else(|| map.remove("findings"))
            .unwrap_or(serde_json::Value::Array(Vec::new())),
        _ => {
            return Err(BlueprintError::Generation(
                "critique response is not a JSON object or array".into(),
            ))
        }
    };
    let raw: Vec<RawCritique> = serde_json::from_value(list)?;

    Ok(raw
        .into_iter()
        .filter_map(|r| {
            let severity = CritiqueSeverity::parse(&r.severity);
            let role = AgentRole::parse_role(&r.role)
                .or_else(|| Section::parse_section(&r.section).map(Section::owner))?;
            let section = Section::parse_section(&r.section).unwrap_or_else(|| role.section());
            Some(Critique {
                severity,
                role,
                section,
                issue: r.issue,
                recommendation: r.recommendation,
            })
        })
        .collect())
}

/// Distinct roles with at least one critique above "suggestion", in pipeline order.
pub fn roles_to_revise(critiques: &[Critique]) -> Vec<AgentRole> {
    critiques
        .iter()
        .filter(|c| c.severity != CritiqueSeverity::Suggestion)
        .map(|c| c.role)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Seed for the single revision pass.
pub fn revision_seed(seed: &str) -> String {
    format!("{seed}_rev_1")
}

/// Result of a revision pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionOutcome {
    pub artifacts: ArtifactSet,
    pub critiques: Vec<Critique>,
    pub revised_roles: Vec<AgentRole>,
    /// Cross-section coherence of the artifacts before revision.
    pub coherence: ToolReport,
    /// Coherence issues left after the pass. Reported, never acted on.
    pub residual_issues: Vec<CoherenceIssue>,
}

/// Single-pass critique and targeted re-dispatch.
pub(crate) struct RevisionLoop {
    pipeline: Arc<TaskPipeline>,
}

impl RevisionLoop {
    pub(crate) fn new(pipeline: Arc<TaskPipeline>) -> Self {
        Self { pipeline }
    }

    pub(crate) async fn run(
        &self,
        job: &JobControl,
        plan: &RunPlan,
        artifacts: &ArtifactSet,
        credentials: &Credentials,
        prompt: &str,
    ) -> BlueprintResult<RevisionOutcome> {
        let issues = check_coherence(artifacts);
        let coherence = coherence_report(&issues);
        let mut critiques: Vec<Critique> = issues.iter().map(Critique::from).collect();
        critiques.extend(self.critique(job, artifacts, credentials, &plan.seed).await?);

        let roles: Vec<AgentRole> = roles_to_revise(&critiques)
            .into_iter()
            .filter(|role| {
                plan.task_for_role(*role).is_some() && artifacts.contains(role.section())
            })
            .collect();

        job.info(
            Phase::Verify,
            kinds::REVISION_CRITIQUE,
            serde_json::json!({
                "critiques": critiques.len(),
                "roles": roles,
            }),
        );

        if roles.is_empty() {
            info!(job_id = %job.id, critiques = critiques.len(), "Revision: nothing to revise");
            return Ok(RevisionOutcome {
                artifacts: artifacts.clone(),
                critiques,
                revised_roles: Vec::new(),
                coherence,
                residual_issues: Vec::new(),
            });
        }

        let seed = revision_seed(&plan.seed);
        let requirements = artifacts.get(Section::Requirements).unwrap_or(prompt);
        let revisions = roles.iter().filter_map(|role| plan.task_for_role(*role)).map(|task| {
            let feedback = feedback_block(&critiques, task.role);
            let previous = artifacts.get(task.section).unwrap_or_default();
            let context = format!(
                "{}\n\n# Previous version of {}\n\n{}\n\n# Reviewer feedback\n\n{}\n\n\
                 Rewrite the section in full, resolving every point above.",
                build_context(task, plan, artifacts, prompt),
                task.section.title(),
                previous.trim(),
                feedback
            );
            job.info(
                Phase::Dispatch,
                kinds::REVISION_DISPATCH,
                serde_json::json!({ "task_id": task.id, "role": task.role }),
            );
            let seed = seed.as_str();
            async move {
                let req = (task.section != Section::Requirements).then_some(requirements);
                self.pipeline
                    .execute(job, task, &context, credentials, seed, req)
                    .await
            }
        });
        let outputs: Vec<TaskOutput> = try_join_all(revisions).await?;

        let mut revised = artifacts.clone();
        for output in &outputs {
            revised.replace(output.section, output.text())?;
        }

        let residual_issues = check_coherence(&revised);
        job.emit(
            Phase::Verify,
            kinds::REVISION_RESIDUAL,
            if residual_issues.is_empty() {
                EventLevel::Info
            } else {
                EventLevel::Warn
            },
            serde_json::json!({
                "revised": roles,
                "residual_issues": residual_issues.iter().map(|i| i.issue.clone()).collect::<Vec<_>>(),
            }),
        );
        info!(job_id = %job.id, revised = roles.len(), residual = residual_issues.len(), "Revision: pass complete");

        Ok(RevisionOutcome {
            artifacts: revised,
            critiques,
            revised_roles: roles,
            coherence,
            residual_issues,
        })
    }

    async fn critique(
        &self,
        job: &JobControl,
        artifacts: &ArtifactSet,
        credentials: &Credentials,
        seed: &str,
    ) -> BlueprintResult<Vec<Critique>> {
        job.wait_if_paused().await;
        let summaries = summarize(artifacts);
        let outcome = self
            .pipeline
            .dispatcher
            .complete_cached(
                CRITIQUE_SCOPE,
                CRITIQUE_PROMPT,
                &summaries,
                GenerationMode::Json,
                credentials,
                seed,
            )
            .await?;
        match parse_critiques(&outcome.text) {
            Ok(critiques) => Ok(critiques),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Revision: unreadable critique, using coherence findings only");
                Ok(Vec::new())
            }
        }
    }
}

fn summarize(artifacts: &ArtifactSet) -> String {
    artifacts
        .iter()
        .map(|(section, text)| {
            let head: String = text.chars().take(SUMMARY_CHARS).collect();
            format!("## {} (role: {})\n\n{}", section.title(), section.owner(), head.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn feedback_block(critiques: &[Critique], role: AgentRole) -> String {
    critiques
        .iter()
        .filter(|c| c.role == role && c.severity != CritiqueSeverity::Suggestion)
        .map(|c| format!("- [{:?}] {} -> {}", c.severity, c.issue, c.recommendation))
        .collect::<Vec<_>>()
        .join("\n")
}
