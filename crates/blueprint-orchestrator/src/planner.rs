use blueprint_core::{AgentRole, RunPlan, Task, TaskBudget, TaskId};
use std::collections::HashMap;
use tracing::debug;

struct Stage {
    role: AgentRole,
    instruction: &'static str,
    depends_on: &'static [AgentRole],
    max_tokens: u32,
}

/// The fixed pipeline. Dependencies may only name roles declared above them.
const STAGES: &[Stage] = &[
    Stage {
        role: AgentRole::Product,
        instruction: "Derive the product requirements from the original request.",
        depends_on: &[],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Ux,
        instruction: "Design the user journeys and screens that satisfy the requirements.",
        depends_on: &[AgentRole::Product],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Frontend,
        instruction: "Design the frontend architecture for the UX above.",
        depends_on: &[AgentRole::Ux],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Backend,
        instruction: "Design the backend services and the full API contract.",
        depends_on: &[AgentRole::Ux],
        max_tokens: 6144,
    },
    Stage {
        role: AgentRole::DataModel,
        instruction: "Design the data model backing every API resource.",
        depends_on: &[AgentRole::Frontend, AgentRole::Backend],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Security,
        instruction: "Write the security architecture covering the API and the data model.",
        depends_on: &[AgentRole::DataModel],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Platform,
        instruction: "Design infrastructure, deployment and operations, with a cost estimate.",
        depends_on: &[AgentRole::Security],
        max_tokens: 4096,
    },
    Stage {
        role: AgentRole::Testing,
        instruction: "Write the test strategy for the whole system.",
        depends_on: &[AgentRole::Security],
        max_tokens: 4096,
    },
];

/// Builds the 8-stage run plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Total: every stage resolves its dependencies against tasks already
    /// created, so the plan is topologically ordered by construction.
    pub fn create_run_plan(&self, project_id: &str, seed: &str) -> RunPlan {
        let mut created: HashMap<AgentRole, TaskId> = HashMap::new();
        let mut tasks = Vec::with_capacity(STAGES.len());

        for (index, stage) in STAGES.iter().enumerate() {
            let id = TaskId::from_index(index);
            let dependencies: Vec<TaskId> = stage
                .depends_on
                .iter()
                .filter_map(|role| created.get(role).cloned())
                .collect();
            debug_assert_eq!(dependencies.len(), stage.depends_on.len());

            let budget = TaskBudget {
                max_tokens: stage.max_tokens,
                ..TaskBudget::default()
            };
            tasks.push(
                Task::new(id.clone(), stage.role, stage.instruction)
                    .with_dependencies(dependencies)
                    .with_budget(budget),
            );
            created.insert(stage.role, id);
        }

        let plan = RunPlan::new(project_id, seed, tasks);
        debug!(plan_id = %plan.id, project = %project_id, tasks = plan.tasks.len(), "Planner: plan created");
        plan
    }
}
