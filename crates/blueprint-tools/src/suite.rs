use crate::api_lint::{extract_endpoints, lint_api};
use crate::compliance::check_compliance;
use crate::cost::{cost_report, estimate_cost};
use crate::mentions_any;
use crate::report::{ToolKind, ToolReport};
use crate::scalability::assess_scalability;
use crate::secrets::scan_secrets;
use blueprint_core::AgentRole;
use tracing::debug;

/// Runs the single-artifact tools that apply to a role's output.
///
/// Selection is by role first and by content trigger second, so a Security
/// artifact that happens to list endpoints is still API-linted.
#[derive(Debug, Clone)]
pub struct ToolSuite {
    enabled: Vec<ToolKind>,
}

impl Default for ToolSuite {
    fn default() -> Self {
        Self {
            enabled: vec![
                ToolKind::SecretScan,
                ToolKind::CostEstimate,
                ToolKind::ApiLint,
                ToolKind::Compliance,
                ToolKind::Scalability,
            ],
        }
    }
}

impl ToolSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the suite to the given tools.
    pub fn with_enabled(enabled: Vec<ToolKind>) -> Self {
        Self { enabled }
    }

    /// Tools triggered for `role` given its artifact `text`.
    pub fn applicable(&self, role: AgentRole, text: &str) -> Vec<ToolKind> {
        let lower = text.to_lowercase();
        self.enabled
            .iter()
            .copied()
            .filter(|tool| match tool {
                ToolKind::SecretScan => true,
                ToolKind::CostEstimate => {
                    role == AgentRole::Platform || !estimate_cost(text).items.is_empty()
                }
                ToolKind::ApiLint => {
                    role == AgentRole::Backend || !extract_endpoints(text).is_empty()
                }
                ToolKind::Compliance => {
                    matches!(
                        role,
                        AgentRole::Product | AgentRole::DataModel | AgentRole::Security
                    ) || mentions_any(&lower, &["personal data", "gdpr", "pii"])
                }
                ToolKind::Scalability => {
                    matches!(role, AgentRole::Backend | AgentRole::Platform)
                }
                // Cross-artifact only; run by the revision loop.
                ToolKind::Coherence => false,
            })
            .collect()
    }

    /// Run every applicable tool, in suite order.
    pub fn run_for(&self, role: AgentRole, text: &str) -> Vec<ToolReport> {
        let tools = self.applicable(role, text);
        debug!(role = %role, tools = ?tools, "tool suite: running");
        tools
            .into_iter()
            .filter_map(|tool| match tool {
                ToolKind::SecretScan => Some(scan_secrets(text)),
                ToolKind::CostEstimate => Some(cost_report(text)),
                ToolKind::ApiLint => Some(lint_api(text)),
                ToolKind::Compliance => Some(check_compliance(text)),
                ToolKind::Scalability => Some(assess_scalability(text)),
                ToolKind::Coherence => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_gets_cost_and_scalability() {
        let suite = ToolSuite::new();
        let tools = suite.applicable(AgentRole::Platform, "2 EC2 and 1 RDS");
        assert_eq!(
            tools,
            vec![
                ToolKind::SecretScan,
                ToolKind::CostEstimate,
                ToolKind::Scalability
            ]
        );
    }

    #[test]
    fn test_content_triggers() {
        let suite = ToolSuite::new();
        let tools = suite.applicable(AgentRole::Ux, "Calls GET /v1/items; stores personal data.");
        assert!(tools.contains(&ToolKind::ApiLint));
        assert!(tools.contains(&ToolKind::Compliance));
        assert!(!tools.contains(&ToolKind::CostEstimate));
    }

    #[test]
    fn test_run_for_backend() {
        let suite = ToolSuite::new();
        let reports = suite.run_for(AgentRole::Backend, "POST /v1/todos with JWT auth, 400 on error");
        let kinds: Vec<ToolKind> = reports.iter().map(|r| r.tool).collect();
        assert_eq!(
            kinds,
            vec![ToolKind::SecretScan, ToolKind::ApiLint, ToolKind::Scalability]
        );
    }

    #[test]
    fn test_disabled_tools_never_run() {
        let suite = ToolSuite::with_enabled(vec![ToolKind::SecretScan]);
        let reports = suite.run_for(AgentRole::Platform, "2 EC2");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].tool, ToolKind::SecretScan);
    }
}
