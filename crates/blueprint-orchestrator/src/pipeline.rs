use crate::consensus::{ConsensusEngine, ConsensusItem};
use crate::control::JobControl;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::events::kinds;
use crate::grounding::{GroundingReport, GroundingStatus, GroundingValidator};
use blueprint_core::{
    ArtifactSet, BlueprintError, BlueprintResult, Credentials, EventLevel, Phase, RunPlan, Section,
    Task, TaskId,
};
use blueprint_store::collections::{task_key, CONSENSUS, GROUNDING, TOOL_REPORTS};
use blueprint_store::{put_json, DocumentStore};
use blueprint_tools::{ToolReport, ToolSuite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// A streamed fragment of one task's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskChunk {
    pub job_id: Uuid,
    pub task_id: TaskId,
    pub text: String,
}

/// Everything produced for one task execution.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task_id: TaskId,
    pub section: Section,
    pub cache_hit: bool,
    pub consensus: ConsensusItem,
    pub tool_reports: Vec<ToolReport>,
    pub grounding: GroundingReport,
}

impl TaskOutput {
    /// The text committed to the blackboard.
    pub fn text(&self) -> &str {
        &self.consensus.final_text
    }
}

/// Dispatch, score, analyse and ground one task. Shared by the DAG executor,
/// manual retries and the revision loop.
pub(crate) struct TaskPipeline {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) consensus: ConsensusEngine,
    pub(crate) tools: ToolSuite,
    pub(crate) grounding: GroundingValidator,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) stream_sink: Option<mpsc::Sender<TaskChunk>>,
    pub(crate) enforce_budgets: bool,
}

impl TaskPipeline {
    pub(crate) async fn execute(
        &self,
        job: &JobControl,
        task: &Task,
        context: &str,
        credentials: &Credentials,
        seed: &str,
        requirements: Option<&str>,
    ) -> BlueprintResult<TaskOutput> {
        job.wait_if_paused().await;

        let dispatched = self.dispatch(job, task, context, credentials, seed).await?;
        job.info(
            Phase::Dispatch,
            kinds::DISPATCH_COMPLETED,
            serde_json::json!({
                "task_id": task.id,
                "role": task.role,
                "cache_key": dispatched.cache_key,
                "cache_hit": dispatched.cache_hit,
                "chars": dispatched.text.len(),
            }),
        );

        let consensus = self
            .consensus
            .score(&task.id, &dispatched.text, credentials, requirements)
            .await;
        put_json(
            self.store.as_ref(),
            CONSENSUS,
            &task_key(job.id, &task.id),
            &consensus,
        )
        .await?;
        job.info(
            Phase::Consensus,
            kinds::CONSENSUS_SCORED,
            serde_json::json!({
                "task_id": task.id,
                "confidence": consensus.confidence,
                "semantic_distance": consensus.semantic_distance,
                "evidence": consensus.evidence,
            }),
        );

        let tool_reports = self.tools.run_for(task.role, &consensus.final_text);
        put_json(
            self.store.as_ref(),
            TOOL_REPORTS,
            &task_key(job.id, &task.id),
            &tool_reports,
        )
        .await?;
        let failing: Vec<String> = tool_reports
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.tool.to_string())
            .collect();
        job.emit(
            Phase::ToolExecution,
            kinds::TOOLS_COMPLETED,
            if failing.is_empty() {
                EventLevel::Info
            } else {
                EventLevel::Warn
            },
            serde_json::json!({
                "task_id": task.id,
                "tools": tool_reports.iter().map(|r| r.summary.clone()).collect::<Vec<_>>(),
                "failing": failing,
            }),
        );

        let grounding = self.grounding.validate(&consensus, credentials).await;
        put_json(
            self.store.as_ref(),
            GROUNDING,
            &task_key(job.id, &task.id),
            &grounding,
        )
        .await?;
        job.emit(
            Phase::Grounding,
            kinds::GROUNDING_COMPLETED,
            match grounding.status {
                GroundingStatus::Pass => EventLevel::Info,
                GroundingStatus::Warn => EventLevel::Warn,
            },
            serde_json::json!({
                "task_id": task.id,
                "status": grounding.status,
                "claims": grounding.claims_checked.len(),
                "ungrounded": grounding.ungrounded.len(),
                "issues": grounding.issues,
            }),
        );

        info!(
            job_id = %job.id,
            task_id = %task.id,
            role = %task.role,
            cache_hit = dispatched.cache_hit,
            confidence = consensus.confidence,
            "Pipeline: task complete"
        );

        Ok(TaskOutput {
            task_id: task.id.clone(),
            section: task.section,
            cache_hit: dispatched.cache_hit,
            consensus,
            tool_reports,
            grounding,
        })
    }

    async fn dispatch(
        &self,
        job: &JobControl,
        task: &Task,
        context: &str,
        credentials: &Credentials,
        seed: &str,
    ) -> BlueprintResult<DispatchOutcome> {
        let call = self.dispatch_inner(job.id, task, context, credentials, seed);
        if !self.enforce_budgets {
            return call.await;
        }
        let limit = Duration::from_secs(task.budget.max_duration_secs);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(job_id = %job.id, task_id = %task.id, limit_secs = limit.as_secs(), "Pipeline: task budget exceeded");
                Err(BlueprintError::Orchestrator(format!(
                    "task {} exceeded its {}s budget",
                    task.id,
                    limit.as_secs()
                )))
            }
        }
    }

    async fn dispatch_inner(
        &self,
        job_id: Uuid,
        task: &Task,
        context: &str,
        credentials: &Credentials,
        seed: &str,
    ) -> BlueprintResult<DispatchOutcome> {
        let Some(sink) = &self.stream_sink else {
            return self
                .dispatcher
                .dispatch_task(task, context, credentials, seed)
                .await;
        };

        let (tx, mut rx) = mpsc::channel::<String>(64);
        let sink = sink.clone();
        let task_id = task.id.clone();
        let forward = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let chunk = TaskChunk {
                    job_id,
                    task_id: task_id.clone(),
                    text,
                };
                if sink.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        let result = self
            .dispatcher
            .dispatch_task_streaming(task, context, credentials, seed, tx)
            .await;
        if let Err(e) = forward.await {
            warn!(error = %e, "Pipeline: stream forwarder stopped");
        }
        result
    }
}

/// Context handed to a task: the original request, the requirements (unless
/// this is the requirements task), then each direct dependency's artifact.
pub(crate) fn build_context(task: &Task, plan: &RunPlan, artifacts: &ArtifactSet, prompt: &str) -> String {
    let mut context = format!("# Original request\n\n{}", prompt.trim());
    let mut included: Vec<Section> = Vec::new();

    if task.section != Section::Requirements {
        if let Some(requirements) = artifacts.get(Section::Requirements) {
            push_section(&mut context, Section::Requirements, requirements);
            included.push(Section::Requirements);
        }
    }

    for dep in &task.dependencies {
        let Some(section) = plan.task(dep).map(|t| t.section) else {
            continue;
        };
        if included.contains(&section) {
            continue;
        }
        if let Some(text) = artifacts.get(section) {
            push_section(&mut context, section, text);
            included.push(section);
        }
    }
    context
}

fn push_section(context: &mut String, section: Section, text: &str) {
    context.push_str("\n\n# ");
    context.push_str(section.title());
    context.push_str("\n\n");
    context.push_str(text.trim());
}
