//! `blueprint` command-line entry point.

mod config;

use blueprint_agent::{
    GenerationClient, HttpGenerationClient, LlmFactChecker, OpenAiEmbedding, RetryingClient,
};
use blueprint_core::{IntelligenceJob, TaskId};
use blueprint_memory::{EmbeddingProvider, LocalEmbedding, LocalKnowledgeIndex};
use blueprint_orchestrator::{
    JobRequest, Planner, RuleSeverity, SupervisorBuilder, TaskChunk, VerificationReport,
    VerificationStatus, Verifier,
};
use blueprint_store::collections::{DOCUMENTS, JOBS, VERIFICATION};
use blueprint_store::{get_json, DocumentStore, FileStore};
use clap::{Parser, Subcommand};
use config::BlueprintConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "blueprint", about = "Blueprint: multi-agent technical design generator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "blueprint.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a design document from a product prompt
    Run {
        /// Product prompt
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,
        /// Read the prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        project: String,
        #[arg(long, default_value = "main")]
        document: String,
        /// Cache seed (defaults to `<project>:<document>`)
        #[arg(long)]
        seed: Option<String>,
        /// Write the document here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Write the full job outcome as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Print section text to stderr as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Print the task graph for a project
    Plan {
        #[arg(long, default_value = "default")]
        project: String,
        #[arg(long, default_value = "default:main")]
        seed: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check a Markdown document against the rulebook
    Verify {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show a stored job
    Job {
        id: Uuid,
        /// Include the job's event log
        #[arg(long)]
        events: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            prompt,
            prompt_file,
            project,
            document,
            seed,
            out,
            report,
            stream,
        } => {
            let prompt = match (prompt, prompt_file) {
                (Some(prompt), _) => prompt,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                    anyhow::anyhow!("Failed to read prompt file '{}': {}", path.display(), e)
                })?,
                (None, None) => anyhow::bail!("either --prompt or --prompt-file is required"),
            };
            let config = BlueprintConfig::load(&cli.config).await?;
            run(config, prompt, project, document, seed, out, report, stream).await?;
        }
        Commands::Plan {
            project,
            seed,
            json,
        } => {
            let plan = Planner::new().create_run_plan(&project, &seed);
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for task in &plan.tasks {
                    let deps: Vec<&str> = task.dependencies.iter().map(TaskId::as_str).collect();
                    println!(
                        "{:<8} {:<11} {:<28} after: {}",
                        task.id,
                        task.role,
                        task.section.title(),
                        if deps.is_empty() {
                            "-".to_string()
                        } else {
                            deps.join(", ")
                        }
                    );
                }
            }
        }
        Commands::Verify { file, json } => {
            let text = tokio::fs::read_to_string(&file).await.map_err(|e| {
                anyhow::anyhow!("Failed to read '{}': {}", file.display(), e)
            })?;
            let report = Verifier::new().verify(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_verification(&report);
            }
            if report.status == VerificationStatus::Fail {
                anyhow::bail!("verification failed");
            }
        }
        Commands::Job { id, events } => {
            let config = BlueprintConfig::load(&cli.config).await?;
            let store = FileStore::new(config.data_dir).await?;
            let key = id.to_string();
            let job: IntelligenceJob = get_json(&store, JOBS, &key)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no job {id} in the data directory"))?;

            println!("job:      {}", job.id);
            println!("project:  {} / {}", job.project_id, job.document_id);
            println!("status:   {:?}", job.status);
            println!("updated:  {}", job.updated_at.to_rfc3339());
            if let Some(error) = &job.error {
                println!("error:    {error}");
            }
            let document: Option<String> = get_json(&store, DOCUMENTS, &key).await?;
            if let Some(document) = document {
                println!("document: {} chars", document.chars().count());
            }
            let verification: Option<VerificationReport> =
                get_json(&store, VERIFICATION, &key).await?;
            if let Some(report) = verification {
                print_verification(&report);
            }
            if events {
                for event in &job.logs {
                    println!(
                        "{} {:<5} {:?} {} {}",
                        event.timestamp.to_rfc3339(),
                        format!("{:?}", event.level).to_uppercase(),
                        event.phase,
                        event.event_type,
                        event.payload
                    );
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: BlueprintConfig,
    prompt: String,
    project: String,
    document: String,
    seed: Option<String>,
    out: Option<PathBuf>,
    report: Option<PathBuf>,
    stream: bool,
) -> anyhow::Result<()> {
    let store: Arc<dyn DocumentStore> = Arc::new(FileStore::new(config.data_dir.clone()).await?);
    let http: Arc<dyn GenerationClient> = Arc::new(HttpGenerationClient::from_config(&config.model));
    let client: Arc<dyn GenerationClient> = Arc::new(RetryingClient::new(
        http,
        config.model.retry_policy.clone().unwrap_or_default(),
    ));

    let embedder: Arc<dyn EmbeddingProvider> = match &config.embedding_model {
        Some(model) => Arc::new(OpenAiEmbedding::new(model)),
        None => Arc::new(LocalEmbedding::default()),
    };

    let mut builder = SupervisorBuilder::new(client.clone(), store)
        .embedder(embedder)
        .config(config.pipeline.clone());

    if let Some(dir) = &config.knowledge_dir {
        let index = LocalKnowledgeIndex::new();
        let passages = index.load_dir(dir).await?;
        info!(dir = %dir.display(), passages, "Knowledge index ready");
        builder = builder.knowledge_index(Arc::new(index));
    }
    if config.fact_check {
        builder = builder.fact_checker(Arc::new(LlmFactChecker::new(client)));
    }

    let printer = if stream {
        let (tx, rx) = mpsc::channel::<TaskChunk>(256);
        builder = builder.stream_to(tx);
        Some(tokio::spawn(print_chunks(rx)))
    } else {
        None
    };

    let supervisor = builder.build();
    let mut request = JobRequest::new(project, document, prompt, config.model.credentials());
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }
    info!(provider = %config.model.provider.as_str(), model = %config.model.model_id, seed = %request.seed, "Starting job");

    let result = supervisor.run_job(request).await;
    drop(supervisor);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let outcome = result?;

    match &out {
        Some(path) => {
            tokio::fs::write(path, &outcome.document).await?;
            eprintln!("Document written to {}", path.display());
        }
        None => println!("{}", outcome.document),
    }
    if let Some(path) = &report {
        tokio::fs::write(path, serde_json::to_string_pretty(&outcome)?).await?;
    }

    eprintln!("job {}: {:?}", outcome.job.id, outcome.job.status);
    if let Some(revision) = &outcome.revision {
        eprintln!(
            "revision: {} critique(s), revised {:?}, {} residual issue(s)",
            revision.critiques.len(),
            revision.revised_roles,
            revision.residual_issues.len()
        );
    }
    eprint_verification(&outcome.verification);
    Ok(())
}

async fn print_chunks(mut rx: mpsc::Receiver<TaskChunk>) {
    let mut current: Option<TaskId> = None;
    while let Some(chunk) = rx.recv().await {
        if current.as_ref() != Some(&chunk.task_id) {
            eprintln!("\n--- {} ---", chunk.task_id);
            current = Some(chunk.task_id.clone());
        }
        eprint!("{}", chunk.text);
    }
    eprintln!();
}

fn verification_lines(report: &VerificationReport) -> Vec<String> {
    let mut lines = vec![format!(
        "verification: {:?} ({} non-blocking failure(s))",
        report.status, report.non_blocking_failures
    )];
    for check in &report.checks {
        let severity = match check.severity {
            RuleSeverity::Blocker => "BLOCKER",
            RuleSeverity::Major => "MAJOR",
            RuleSeverity::Minor => "MINOR",
        };
        lines.push(format!(
            "  {} {:<10} [{severity}] {}",
            if check.passed { "PASS" } else { "FAIL" },
            check.rule_id,
            check.description
        ));
        if let Some(remediation) = &check.remediation {
            lines.push(format!("       -> {remediation}"));
        }
    }
    lines
}

fn print_verification(report: &VerificationReport) {
    for line in verification_lines(report) {
        println!("{line}");
    }
}

fn eprint_verification(report: &VerificationReport) {
    for line in verification_lines(report) {
        eprintln!("{line}");
    }
}
