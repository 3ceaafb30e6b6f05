use crate::cache::DeterministicCache;
use crate::config::PipelineConfig;
use crate::consensus::ConsensusEngine;
use crate::control::JobControl;
use crate::dispatcher::Dispatcher;
use crate::events::{kinds, EventBus};
use crate::grounding::GroundingValidator;
use crate::pipeline::{build_context, TaskChunk, TaskOutput, TaskPipeline};
use crate::planner::Planner;
use crate::profiles::RolePrompts;
use crate::revision::{RevisionLoop, RevisionOutcome};
use crate::verifier::{VerificationReport, VerificationStatus, Verifier};
use blueprint_agent::{FactChecker, GenerationClient};
use blueprint_core::{
    ArtifactSet, BlueprintError, BlueprintResult, Credentials, EventEnvelope, EventLevel,
    IntelligenceJob, JobStatus, Phase, RunPlan, Section, Task, TaskId, TaskStatus,
};
use blueprint_memory::{EmbeddingProvider, KnowledgeIndex};
use blueprint_store::collections::{DOCUMENTS, JOBS, PLANS, VERIFICATION};
use blueprint_store::{get_json, put_json, DocumentStore};
use blueprint_tools::ToolSuite;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A generation request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub project_id: String,
    pub document_id: String,
    pub prompt: String,
    /// Part of every cache key. Defaults to `{project_id}:{document_id}`.
    pub seed: String,
    pub credentials: Credentials,
}

impl JobRequest {
    pub fn new(
        project_id: impl Into<String>,
        document_id: impl Into<String>,
        prompt: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let project_id = project_id.into();
        let document_id = document_id.into();
        Self {
            seed: format!("{project_id}:{document_id}"),
            project_id,
            document_id,
            prompt: prompt.into(),
            credentials,
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }
}

/// Final state of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: IntelligenceJob,
    pub plan: RunPlan,
    pub document: String,
    pub verification: VerificationReport,
    pub revision: Option<RevisionOutcome>,
}

/// Wires collaborators into a [`Supervisor`].
pub struct SupervisorBuilder {
    client: Arc<dyn GenerationClient>,
    store: Arc<dyn DocumentStore>,
    bus: Option<Arc<EventBus>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn KnowledgeIndex>>,
    fact_checker: Option<Arc<dyn FactChecker>>,
    prompts: RolePrompts,
    tools: ToolSuite,
    verifier: Verifier,
    config: PipelineConfig,
    stream_sink: Option<mpsc::Sender<TaskChunk>>,
}

impl SupervisorBuilder {
    pub fn new(client: Arc<dyn GenerationClient>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            client,
            store,
            bus: None,
            embedder: None,
            index: None,
            fact_checker: None,
            prompts: RolePrompts::builtin(),
            tools: ToolSuite::default(),
            verifier: Verifier::default(),
            config: PipelineConfig::default(),
            stream_sink: None,
        }
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn knowledge_index(mut self, index: Arc<dyn KnowledgeIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn fact_checker(mut self, checker: Arc<dyn FactChecker>) -> Self {
        self.fact_checker = Some(checker);
        self
    }

    pub fn prompts(mut self, prompts: RolePrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn tools(mut self, tools: ToolSuite) -> Self {
        self.tools = tools;
        self
    }

    pub fn verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Forward every task's output chunks to `sink` as they are generated.
    pub fn stream_to(mut self, sink: mpsc::Sender<TaskChunk>) -> Self {
        self.stream_sink = Some(sink);
        self
    }

    pub fn build(self) -> Arc<Supervisor> {
        let config = self.config;
        let prompts = self.prompts.with_overrides(config.prompt_overrides.clone());
        let dispatcher = Dispatcher::new(
            self.client,
            DeterministicCache::new(self.store.clone()),
            prompts,
            &config,
        );
        let consensus = match self.embedder {
            Some(embedder) => ConsensusEngine::with_embedder(embedder),
            None => ConsensusEngine::new(),
        };
        let mut grounding = GroundingValidator::new(config.grounding_threshold, config.max_claims)
            .with_enforcement(config.enforce_grounding);
        if let Some(index) = self.index {
            grounding = grounding.with_index(index);
        }
        if let Some(checker) = self.fact_checker {
            grounding = grounding.with_fact_checker(checker);
        }

        let pipeline = Arc::new(TaskPipeline {
            dispatcher,
            consensus,
            tools: self.tools,
            grounding,
            store: self.store.clone(),
            stream_sink: self.stream_sink,
            enforce_budgets: config.enforce_task_budgets,
        });

        Arc::new(Supervisor {
            planner: Planner::new(),
            revision: RevisionLoop::new(pipeline.clone()),
            pipeline,
            verifier: self.verifier,
            store: self.store,
            bus: self.bus.unwrap_or_default(),
            config,
            jobs: RwLock::new(HashMap::new()),
        })
    }
}

/// Owns job lifecycles and drives each job's task graph.
pub struct Supervisor {
    planner: Planner,
    pipeline: Arc<TaskPipeline>,
    revision: RevisionLoop,
    verifier: Verifier,
    store: Arc<dyn DocumentStore>,
    bus: Arc<EventBus>,
    config: PipelineConfig,
    jobs: RwLock<HashMap<Uuid, Arc<JobControl>>>,
}

impl Supervisor {
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Record a CREATED job without running it.
    pub async fn create_job(&self, request: JobRequest) -> BlueprintResult<Uuid> {
        if request.prompt.trim().is_empty() {
            return Err(BlueprintError::Validation("prompt must not be empty".into()));
        }
        let job = IntelligenceJob::new(&request.project_id, &request.document_id, &request.prompt)
            .with_log_limit(self.config.job_log_limit);
        let job_id = job.id;
        let control = Arc::new(JobControl::new(job, request.credentials, self.bus.clone()));
        self.jobs.write().insert(job_id, control.clone());
        self.persist_job(&control).await?;
        info!(job_id = %job_id, project = %request.project_id, document = %request.document_id, "Supervisor: job created");
        Ok(job_id)
    }

    /// Create a job and run it in the background. Returns once the job is
    /// recorded.
    pub async fn start_job(self: &Arc<Self>, request: JobRequest) -> BlueprintResult<Uuid> {
        let plan = self.planner.create_run_plan(&request.project_id, &request.seed);
        let job_id = self.create_job(request).await?;
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = supervisor.run_plan(job_id, plan).await {
                warn!(job_id = %job_id, error = %e, "Supervisor: background job failed");
            }
        });
        Ok(job_id)
    }

    /// Create a job and run it to completion.
    pub async fn run_job(&self, request: JobRequest) -> BlueprintResult<JobOutcome> {
        let plan = self.planner.create_run_plan(&request.project_id, &request.seed);
        let job_id = self.create_job(request).await?;
        self.run_plan(job_id, plan).await
    }

    /// Run `plan` for an existing job. Any task failure or a deadlock fails
    /// the job and is returned.
    pub async fn run_plan(&self, job_id: Uuid, plan: RunPlan) -> BlueprintResult<JobOutcome> {
        let control = self.control(job_id)?;
        if !control.try_begin() {
            return Err(BlueprintError::Orchestrator(format!(
                "job {job_id} is already running"
            )));
        }
        let result = self.drive(&control, plan).await;
        control.end();

        if let Err(e) = &result {
            error!(job_id = %job_id, error = %e, "Supervisor: job failed");
            control.fail(&e.to_string());
            control.emit(
                Phase::Finalize,
                kinds::JOB_FAILED,
                EventLevel::Error,
                serde_json::json!({ "error": e.to_string() }),
            );
            if let Err(persist) = self.persist_job(&control).await {
                warn!(job_id = %job_id, error = %persist, "Supervisor: could not persist failed job");
            }
        }
        result
    }

    async fn drive(&self, control: &Arc<JobControl>, mut plan: RunPlan) -> BlueprintResult<JobOutcome> {
        if let Err(e) = plan.validate() {
            warn!(job_id = %control.id, error = %e, "Supervisor: plan failed validation");
            control.emit(
                Phase::Plan,
                kinds::PLAN_INVALID,
                EventLevel::Warn,
                serde_json::json!({ "error": e.to_string(), "cyclic": plan.has_cycle() }),
            );
        }
        control.set_plan_id(plan.id);
        put_json(self.store.as_ref(), PLANS, &plan.id.to_string(), &plan).await?;
        control.info(
            Phase::Plan,
            kinds::PLAN_CREATED,
            serde_json::json!({
                "plan_id": plan.id,
                "seed": plan.seed,
                "tasks": plan.tasks.iter().map(|t| serde_json::json!({
                    "id": t.id,
                    "role": t.role,
                    "dependencies": t.dependencies,
                })).collect::<Vec<_>>(),
            }),
        );

        if control.status() != JobStatus::Paused {
            control.set_status(JobStatus::Running);
        }
        self.persist_job(control).await?;
        control.info(Phase::Plan, kinds::JOB_STARTED, serde_json::json!({ "tasks": plan.tasks.len() }));
        info!(job_id = %control.id, plan_id = %plan.id, tasks = plan.tasks.len(), "Supervisor: executing plan");

        let credentials = control.state.lock().await.credentials.clone();
        let prompt = control.snapshot().prompt;
        let mut artifacts = ArtifactSet::new();
        let executed = self
            .execute_dag(control, &mut plan, &mut artifacts, &credentials, &prompt)
            .await;
        {
            let mut state = control.state.lock().await;
            state.plan = Some(plan.clone());
            state.artifacts = artifacts.clone();
        }
        executed?;

        self.finalize(control, plan, artifacts, &credentials, &prompt).await
    }

    /// Wavefront DAG runner: launch everything runnable, then wait for
    /// whichever task finishes first.
    async fn execute_dag(
        &self,
        control: &Arc<JobControl>,
        plan: &mut RunPlan,
        artifacts: &mut ArtifactSet,
        credentials: &Credentials,
        prompt: &str,
    ) -> BlueprintResult<()> {
        let total = plan.tasks.len();
        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut in_progress: HashSet<TaskId> = HashSet::new();
        let mut running: JoinSet<(TaskId, BlueprintResult<TaskOutput>)> = JoinSet::new();

        while completed.len() < total {
            let runnable: Vec<Task> = plan
                .tasks
                .iter()
                .filter(|t| {
                    !completed.contains(&t.id) && !in_progress.contains(&t.id) && t.is_ready(&completed)
                })
                .cloned()
                .collect();

            for task in runnable {
                let context = build_context(&task, plan, artifacts, prompt);
                let requirements = (task.section != Section::Requirements)
                    .then(|| artifacts.get(Section::Requirements).unwrap_or(prompt).to_string());

                plan.set_status(&task.id, TaskStatus::InProgress);
                in_progress.insert(task.id.clone());
                control.info(
                    Phase::Dispatch,
                    kinds::TASK_STARTED,
                    serde_json::json!({
                        "task_id": task.id,
                        "role": task.role,
                        "dependencies": task.dependencies,
                    }),
                );
                info!(job_id = %control.id, task_id = %task.id, role = %task.role, "Supervisor: task started");

                let pipeline = self.pipeline.clone();
                let job = control.clone();
                let credentials = credentials.clone();
                let seed = plan.seed.clone();
                running.spawn(async move {
                    let result = pipeline
                        .execute(&job, &task, &context, &credentials, &seed, requirements.as_deref())
                        .await;
                    (task.id, result)
                });
            }

            if in_progress.is_empty() {
                let blocked: Vec<String> = plan
                    .tasks
                    .iter()
                    .filter(|t| !completed.contains(&t.id))
                    .map(|t| t.id.to_string())
                    .collect();
                let message = format!(
                    "{} task(s) blocked on unmet dependencies: {}",
                    blocked.len(),
                    blocked.join(", ")
                );
                error!(job_id = %control.id, blocked = ?blocked, "Supervisor: task deadlock");
                control.emit(
                    Phase::Dispatch,
                    kinds::DEADLOCK,
                    EventLevel::Error,
                    serde_json::json!({ "blocked": blocked }),
                );
                return Err(BlueprintError::Deadlock(message));
            }

            let Some(joined) = running.join_next().await else {
                return Err(BlueprintError::Orchestrator(
                    "executor lost track of in-flight tasks".into(),
                ));
            };
            let (task_id, result) = joined.map_err(|e| {
                BlueprintError::Orchestrator(format!("task aborted: {e}"))
            })?;
            in_progress.remove(&task_id);

            match result {
                Ok(output) => {
                    artifacts.commit(output.section, output.text())?;
                    plan.set_status(&task_id, TaskStatus::Completed);
                    completed.insert(task_id.clone());
                    control.info(
                        Phase::Dispatch,
                        kinds::TASK_COMPLETED,
                        serde_json::json!({
                            "task_id": task_id,
                            "cache_hit": output.cache_hit,
                            "confidence": output.consensus.confidence,
                            "remaining": total - completed.len(),
                        }),
                    );
                }
                Err(e) => {
                    plan.set_status(&task_id, TaskStatus::Failed);
                    error!(job_id = %control.id, task_id = %task_id, error = %e, "Supervisor: task failed");
                    control.emit(
                        Phase::Dispatch,
                        kinds::TASK_FAILED,
                        EventLevel::Error,
                        serde_json::json!({ "task_id": task_id, "error": e.to_string() }),
                    );
                    running.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Assemble, verify, revise, re-verify, persist.
    async fn finalize(
        &self,
        control: &Arc<JobControl>,
        plan: RunPlan,
        mut artifacts: ArtifactSet,
        credentials: &Credentials,
        prompt: &str,
    ) -> BlueprintResult<JobOutcome> {
        let order = plan.section_order();
        let mut document = artifacts.assemble(&order);
        let mut verification = self.verify(control, &document);

        let mut revision = None;
        if self.config.revision_enabled {
            let outcome = self
                .revision
                .run(control, &plan, &artifacts, credentials, prompt)
                .await?;
            if !outcome.revised_roles.is_empty() {
                artifacts = outcome.artifacts.clone();
                document = artifacts.assemble(&order);
                verification = self.verify(control, &document);
            }
            revision = Some(outcome);
        }

        self.persist_results(control.id, &document, &verification).await?;
        {
            let mut state = control.state.lock().await;
            state.artifacts = artifacts;
            state.document = Some(document.clone());
            state.verification = Some(verification.clone());
        }

        control.set_status(JobStatus::Completed);
        self.persist_job(control).await?;
        control.info(
            Phase::Finalize,
            kinds::JOB_COMPLETED,
            serde_json::json!({
                "verification": verification.status,
                "revised_roles": revision.as_ref().map(|r| r.revised_roles.clone()).unwrap_or_default(),
                "chars": document.len(),
            }),
        );
        info!(job_id = %control.id, verification = ?verification.status, "Supervisor: job completed");

        Ok(JobOutcome {
            job: control.snapshot(),
            plan,
            document,
            verification,
            revision,
        })
    }

    fn verify(&self, control: &JobControl, document: &str) -> VerificationReport {
        let report = self.verifier.verify(document);
        let failed: Vec<&str> = report.failed().map(|c| c.rule_id.as_str()).collect();
        control.emit(
            Phase::Verify,
            kinds::VERIFICATION_COMPLETED,
            match report.status {
                VerificationStatus::Pass => EventLevel::Info,
                VerificationStatus::Fail => EventLevel::Warn,
            },
            serde_json::json!({
                "status": report.status,
                "failed": failed,
                "non_blocking_failures": report.non_blocking_failures,
            }),
        );
        report
    }

    /// Re-run one task's dispatch, scoring, tools and grounding against the
    /// job's current artifacts. Other tasks are left untouched. When every task
    /// is then complete, the document is reassembled and re-verified.
    pub async fn retry_task(&self, job_id: Uuid, task_id: &TaskId) -> BlueprintResult<TaskOutput> {
        let control = self.control(job_id)?;
        if !control.try_begin() {
            return Err(BlueprintError::Orchestrator(format!(
                "job {job_id} is running; retry after it stops"
            )));
        }
        let result = self.retry_inner(&control, task_id).await;
        control.end();
        result
    }

    async fn retry_inner(&self, control: &Arc<JobControl>, task_id: &TaskId) -> BlueprintResult<TaskOutput> {
        let (mut plan, mut artifacts, credentials) = {
            let state = control.state.lock().await;
            let plan = state.plan.clone().ok_or_else(|| {
                BlueprintError::Orchestrator(format!("job {} has not been planned", control.id))
            })?;
            (plan, state.artifacts.clone(), state.credentials.clone())
        };
        let task = plan
            .task(task_id)
            .cloned()
            .ok_or_else(|| BlueprintError::TaskNotFound(task_id.to_string()))?;
        let prompt = control.snapshot().prompt;

        let context = build_context(&task, &plan, &artifacts, &prompt);
        let requirements = (task.section != Section::Requirements)
            .then(|| artifacts.get(Section::Requirements).unwrap_or(&prompt).to_string());

        plan.set_status(&task.id, TaskStatus::InProgress);
        control.info(
            Phase::Dispatch,
            kinds::TASK_RETRIED,
            serde_json::json!({ "task_id": task.id, "role": task.role }),
        );
        let output = match self
            .pipeline
            .execute(control, &task, &context, &credentials, &plan.seed, requirements.as_deref())
            .await
        {
            Ok(output) => output,
            Err(e) => {
                plan.set_status(&task.id, TaskStatus::Failed);
                control.state.lock().await.plan = Some(plan);
                control.emit(
                    Phase::Dispatch,
                    kinds::TASK_FAILED,
                    EventLevel::Error,
                    serde_json::json!({ "task_id": task.id, "error": e.to_string() }),
                );
                return Err(e);
            }
        };

        artifacts.replace(output.section, output.text())?;
        plan.set_status(&task.id, TaskStatus::Completed);
        control.info(
            Phase::Dispatch,
            kinds::TASK_COMPLETED,
            serde_json::json!({
                "task_id": task.id,
                "cache_hit": output.cache_hit,
                "confidence": output.consensus.confidence,
                "retry": true,
            }),
        );

        let all_done = plan.tasks.iter().all(|t| t.status == TaskStatus::Completed);
        let finished = if all_done {
            let document = artifacts.assemble(&plan.section_order());
            let verification = self.verify(control, &document);
            self.persist_results(control.id, &document, &verification).await?;
            Some((document, verification))
        } else {
            None
        };

        {
            let mut state = control.state.lock().await;
            state.plan = Some(plan);
            state.artifacts = artifacts;
            if let Some((document, verification)) = finished {
                state.document = Some(document);
                state.verification = Some(verification);
                drop(state);
                control.set_status(JobStatus::Completed);
                control.info(Phase::Finalize, kinds::JOB_COMPLETED, serde_json::json!({ "retry": true }));
            }
        }
        self.persist_job(control).await?;
        Ok(output)
    }

    /// Stop issuing new dispatches. In-flight calls finish normally.
    pub async fn pause_job(&self, job_id: Uuid) -> BlueprintResult<()> {
        let control = self.control(job_id)?;
        let status = control.status();
        if status.is_terminal() {
            return Err(BlueprintError::Validation(format!(
                "job {job_id} is {status:?} and cannot be paused"
            )));
        }
        control.set_paused(true);
        control.set_status(JobStatus::Paused);
        control.info(Phase::Dispatch, kinds::JOB_PAUSED, serde_json::json!({}));
        info!(job_id = %job_id, "Supervisor: job paused");
        self.persist_job(&control).await
    }

    pub async fn resume_job(&self, job_id: Uuid) -> BlueprintResult<()> {
        let control = self.control(job_id)?;
        if control.status() != JobStatus::Paused {
            return Err(BlueprintError::Validation(format!("job {job_id} is not paused")));
        }
        control.set_status(if control.is_running() {
            JobStatus::Running
        } else {
            JobStatus::Created
        });
        control.set_paused(false);
        control.info(Phase::Dispatch, kinds::JOB_RESUMED, serde_json::json!({}));
        info!(job_id = %job_id, "Supervisor: job resumed");
        self.persist_job(&control).await
    }

    /// The job record, from memory or the store.
    pub async fn job(&self, job_id: Uuid) -> BlueprintResult<Option<IntelligenceJob>> {
        if let Some(control) = self.jobs.read().get(&job_id) {
            return Ok(Some(control.snapshot()));
        }
        get_json(self.store.as_ref(), JOBS, &job_id.to_string()).await
    }

    /// Bus history for the job, oldest first.
    pub fn events(&self, job_id: Uuid) -> Vec<EventEnvelope> {
        self.bus.history(Some(job_id))
    }

    pub async fn artifacts(&self, job_id: Uuid) -> Option<ArtifactSet> {
        let control = self.control(job_id).ok()?;
        let state = control.state.lock().await;
        Some(state.artifacts.clone())
    }

    pub async fn document(&self, job_id: Uuid) -> BlueprintResult<Option<String>> {
        if let Ok(control) = self.control(job_id) {
            if let Some(document) = &control.state.lock().await.document {
                return Ok(Some(document.clone()));
            }
        }
        get_json(self.store.as_ref(), DOCUMENTS, &job_id.to_string()).await
    }

    pub async fn verification(&self, job_id: Uuid) -> BlueprintResult<Option<VerificationReport>> {
        if let Ok(control) = self.control(job_id) {
            if let Some(report) = &control.state.lock().await.verification {
                return Ok(Some(report.clone()));
            }
        }
        get_json(self.store.as_ref(), VERIFICATION, &job_id.to_string()).await
    }

    fn control(&self, job_id: Uuid) -> BlueprintResult<Arc<JobControl>> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(BlueprintError::JobNotFound(job_id))
    }

    async fn persist_job(&self, control: &JobControl) -> BlueprintResult<()> {
        let snapshot = control.snapshot();
        put_json(self.store.as_ref(), JOBS, &snapshot.id.to_string(), &snapshot).await
    }

    async fn persist_results(
        &self,
        job_id: Uuid,
        document: &str,
        verification: &VerificationReport,
    ) -> BlueprintResult<()> {
        let key = job_id.to_string();
        put_json(self.store.as_ref(), DOCUMENTS, &key, &document).await?;
        put_json(self.store.as_ref(), VERIFICATION, &key, verification).await
    }
}
