use crate::section::{AgentRole, Section};
use crate::{BlueprintError, BlueprintResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Stable, index-based task identifier (`task-0`, `task-1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Identifier for the task at `index` in plan order.
    pub fn from_index(index: usize) -> Self {
        Self(format!("task-{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a task. Mutated only by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Token/time ceiling for one task. Advisory unless budget enforcement is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBudget {
    pub max_tokens: u32,
    pub max_duration_secs: u64,
}

impl Default for TaskBudget {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_duration_secs: 300,
        }
    }
}

/// One unit of work in a run plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub role: AgentRole,
    pub section: Section,
    pub instruction: String,
    pub dependencies: Vec<TaskId>,
    pub budget: TaskBudget,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: TaskId, role: AgentRole, instruction: impl Into<String>) -> Self {
        Self {
            id,
            role,
            section: role.section(),
            instruction: instruction.into(),
            dependencies: Vec::new(),
            budget: TaskBudget::default(),
            status: TaskStatus::Pending,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_budget(mut self, budget: TaskBudget) -> Self {
        self.budget = budget;
        self
    }

    /// True when every dependency is in `completed`.
    pub fn is_ready(&self, completed: &HashSet<TaskId>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

/// An ordered collection of tasks forming a dependency DAG.
///
/// The shape never changes after creation; only `Task::status` is updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub id: Uuid,
    pub project_id: String,
    pub seed: String,
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
}

impl RunPlan {
    pub fn new(project_id: impl Into<String>, seed: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            seed: seed.into(),
            tasks,
            created_at: Utc::now(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// The task that writes the given role's section.
    pub fn task_for_role(&self, role: AgentRole) -> Option<&Task> {
        self.tasks.iter().find(|t| t.role == role)
    }

    pub fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> bool {
        if let Some(task) = self.task_mut(id) {
            task.status = status;
            true
        } else {
            false
        }
    }

    /// Sections in plan order, used to assemble the final document.
    pub fn section_order(&self) -> Vec<Section> {
        self.tasks.iter().map(|t| t.section).collect()
    }

    /// Check that every dependency refers to a task created earlier in plan order.
    pub fn validate(&self) -> BlueprintResult<()> {
        let mut seen: HashSet<&TaskId> = HashSet::new();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !seen.contains(dep) {
                    return Err(BlueprintError::Validation(format!(
                        "task {} depends on {} which is not declared before it",
                        task.id, dep
                    )));
                }
            }
            if !seen.insert(&task.id) {
                return Err(BlueprintError::Validation(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
        }
        Ok(())
    }

    /// Check for cycles in the dependency graph.
    /// Returns true if a cycle is detected.
    pub fn has_cycle(&self) -> bool {
        let index: HashMap<&TaskId, &Task> = self.tasks.iter().map(|t| (&t.id, t)).collect();
        let mut visited: HashMap<&TaskId, u8> = HashMap::new();
        self.tasks
            .iter()
            .any(|t| dfs_cycle(&t.id, &index, &mut visited))
    }
}

fn dfs_cycle<'a>(
    id: &'a TaskId,
    index: &HashMap<&'a TaskId, &'a Task>,
    visited: &mut HashMap<&'a TaskId, u8>,
) -> bool {
    match visited.get(id) {
        Some(1) => return true,  // back edge
        Some(2) => return false, // already processed
        _ => {}
    }
    visited.insert(id, 1);
    if let Some(&task) = index.get(id) {
        for dep in &task.dependencies {
            if dfs_cycle(dep, index, visited) {
                return true;
            }
        }
    }
    visited.insert(id, 2);
    false
}
