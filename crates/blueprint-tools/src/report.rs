use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tools in the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SecretScan,
    CostEstimate,
    ApiLint,
    Coherence,
    Compliance,
    Scalability,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::SecretScan => write!(f, "secret_scan"),
            ToolKind::CostEstimate => write!(f, "cost_estimate"),
            ToolKind::ApiLint => write!(f, "api_lint"),
            ToolKind::Coherence => write!(f, "coherence"),
            ToolKind::Compliance => write!(f, "compliance"),
            ToolKind::Scalability => write!(f, "scalability"),
        }
    }
}

/// Severity level of a tool finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl ToolSeverity {
    /// Critical and High findings fail a report.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ToolSeverity::Critical | ToolSeverity::High)
    }
}

/// A specific finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFinding {
    pub id: String,
    pub severity: ToolSeverity,
    pub title: String,
    pub detail: String,
    pub recommendation: String,
}

impl ToolFinding {
    pub fn new(
        id: impl Into<String>,
        severity: ToolSeverity,
        title: impl Into<String>,
        detail: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            title: title.into(),
            detail: detail.into(),
            recommendation: recommendation.into(),
        }
    }
}

/// Output of one tool run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReport {
    pub tool: ToolKind,
    pub passed: bool,
    pub findings: Vec<ToolFinding>,
    /// Tool-specific numbers (cost totals, endpoint counts, scores).
    #[serde(default)]
    pub metrics: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
}

impl ToolReport {
    pub fn new(tool: ToolKind, findings: Vec<ToolFinding>) -> Self {
        let blocking = findings.iter().filter(|f| f.severity.is_blocking()).count();
        let summary = format!(
            "{}: {} finding(s), {} blocking",
            tool,
            findings.len(),
            blocking
        );
        Self {
            tool,
            passed: blocking == 0,
            findings,
            metrics: serde_json::Value::Null,
            generated_at: Utc::now(),
            summary,
        }
    }

    pub fn with_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn warnings(&self) -> Vec<&ToolFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity != ToolSeverity::Info)
            .collect()
    }
}
