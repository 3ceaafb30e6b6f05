//! Static analysis heuristics run against generated artifacts.
//!
//! Every tool is a pure, synchronous function of the text it is given. None of
//! them fail: problems are reported as findings inside a [`ToolReport`].
//!
//! # Main types
//!
//! - [`ToolSuite`]: Selects and runs the tools that apply to a role's artifact.
//! - [`ToolReport`] / [`ToolFinding`]: Structured output shared by every tool.
//! - [`CostEstimate`]: Monthly infrastructure cost derived from service mentions.
//! - [`CoherenceIssue`]: Cross-artifact inconsistency attributed to one role.

/// API contract lint.
pub mod api_lint;
/// Cross-artifact coherence check.
pub mod coherence;
/// Personal-data compliance check.
pub mod compliance;
/// Infrastructure cost estimate.
pub mod cost;
/// Report types shared by every tool.
pub mod report;
/// Scalability heuristics.
pub mod scalability;
/// Hardcoded secret scan.
pub mod secrets;
/// Tool selection per role.
pub mod suite;

pub use api_lint::lint_api;
pub use coherence::{check_coherence, coherence_report, CoherenceIssue};
pub use compliance::check_compliance;
pub use cost::{estimate_cost, CostEstimate, CostLineItem};
pub use report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};
pub use scalability::assess_scalability;
pub use secrets::scan_secrets;
pub use suite::ToolSuite;

/// Compile a static pattern table, skipping entries that fail to compile.
pub(crate) fn compile_patterns<T: Copy>(table: &[(T, &str)]) -> Vec<(T, regex::Regex)> {
    table
        .iter()
        .filter_map(|(tag, pattern)| regex::Regex::new(pattern).ok().map(|re| (*tag, re)))
        .collect()
}

/// Case-insensitive "any of these keywords" test.
pub(crate) fn mentions_any(lower_text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower_text.contains(k))
}

/// Like [`mentions_any`], but single-word terms must match a whole word.
pub(crate) fn mentions_word(lower_text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| {
        if term.contains(|c: char| !c.is_alphanumeric()) {
            lower_text.contains(term)
        } else {
            lower_text
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *term)
        }
    })
}
