use crate::consensus::ConsensusItem;
use blueprint_agent::FactChecker;
use blueprint_core::{Credentials, TaskId};
use blueprint_memory::KnowledgeIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const MIN_CLAIM_CHARS: usize = 30;
const MAX_CLAIM_CHARS: usize = 300;

/// Words that make a sentence read like a factual statement.
const ASSERTIVE_MARKERS: &[&str] = &[
    " is ", " are ", " was ", " were ", " supports ", " provides ", " uses ", " requires ",
    " guarantees ", " handles ", " allows ", " costs ", " offers ",
];

/// Overall grounding result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroundingStatus {
    Pass,
    Warn,
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    KnowledgeIndex,
    FactCheck,
}

/// Support found for one claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingEvidence {
    pub claim: String,
    pub source: EvidenceSource,
    pub grounded: bool,
    /// Index similarity, when the evidence came from the index.
    pub similarity: Option<f32>,
    pub references: Vec<String>,
}

/// Claims checked for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingReport {
    pub task_id: TaskId,
    pub claims_checked: Vec<String>,
    pub ungrounded: Vec<String>,
    pub issues: Vec<String>,
    pub evidence: Vec<GroundingEvidence>,
    pub status: GroundingStatus,
}

/// Checks a handful of claims against the knowledge index, then the
/// fact-checker.
#[derive(Clone)]
pub struct GroundingValidator {
    index: Option<Arc<dyn KnowledgeIndex>>,
    fact_checker: Option<Arc<dyn FactChecker>>,
    threshold: f32,
    max_claims: usize,
    enforce: bool,
}

impl GroundingValidator {
    pub fn new(threshold: f32, max_claims: usize) -> Self {
        Self {
            index: None,
            fact_checker: None,
            threshold,
            max_claims,
            enforce: false,
        }
    }

    pub fn with_index(mut self, index: Arc<dyn KnowledgeIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_fact_checker(mut self, checker: Arc<dyn FactChecker>) -> Self {
        self.fact_checker = Some(checker);
        self
    }

    /// When set, ungrounded claims become issues and the report turns WARN.
    pub fn with_enforcement(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    /// Never fails; collaborator errors are logged and the claim stays
    /// unresolved.
    pub async fn validate(&self, item: &ConsensusItem, credentials: &Credentials) -> GroundingReport {
        let claims = extract_claims(&item.final_text, self.max_claims);
        let mut evidence = Vec::new();
        let mut ungrounded = Vec::new();

        for claim in &claims {
            if let Some(found) = self.check_index(claim).await {
                evidence.push(found);
                continue;
            }
            match self.check_fact(claim, credentials).await {
                Some(found) => {
                    let grounded = found.grounded;
                    evidence.push(found);
                    if !grounded {
                        ungrounded.push(claim.clone());
                    }
                }
                None => ungrounded.push(claim.clone()),
            }
        }

        let issues: Vec<String> = if self.enforce {
            ungrounded.iter().map(|c| format!("ungrounded claim: {c}")).collect()
        } else {
            Vec::new()
        };
        let status = if issues.is_empty() {
            GroundingStatus::Pass
        } else {
            GroundingStatus::Warn
        };

        debug!(
            task_id = %item.task_id,
            claims = claims.len(),
            ungrounded = ungrounded.len(),
            status = ?status,
            "Grounding: validated"
        );

        GroundingReport {
            task_id: item.task_id.clone(),
            claims_checked: claims,
            ungrounded,
            issues,
            evidence,
            status,
        }
    }

    async fn check_index(&self, claim: &str) -> Option<GroundingEvidence> {
        let index = self.index.as_ref()?;
        let hits = match index.search(claim, 1).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Grounding: knowledge index lookup failed");
                return None;
            }
        };
        let best = hits.into_iter().next()?;
        (best.similarity > self.threshold).then(|| GroundingEvidence {
            claim: claim.to_string(),
            source: EvidenceSource::KnowledgeIndex,
            grounded: true,
            similarity: Some(best.similarity),
            references: vec![best.source],
        })
    }

    async fn check_fact(&self, claim: &str, credentials: &Credentials) -> Option<GroundingEvidence> {
        let checker = self.fact_checker.as_ref()?;
        match checker.fact_check(claim, credentials).await {
            Ok(verdict) => Some(GroundingEvidence {
                claim: claim.to_string(),
                source: EvidenceSource::FactCheck,
                grounded: verdict.is_grounded,
                similarity: None,
                references: verdict.sources,
            }),
            Err(e) => {
                warn!(error = %e, "Grounding: fact check failed");
                None
            }
        }
    }
}

/// Up to `max` sentence-like, assertive statements from markdown text.
pub fn extract_claims(text: &str, max: usize) -> Vec<String> {
    let mut claims = Vec::new();
    if max == 0 {
        return claims;
    }
    let mut in_code = false;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code || line.is_empty() || line.starts_with('#') || line.starts_with('|') {
            continue;
        }
        let line = strip_list_marker(line);

        for sentence in split_sentences(line) {
            let len = sentence.chars().count();
            if !(MIN_CLAIM_CHARS..=MAX_CLAIM_CHARS).contains(&len) {
                continue;
            }
            let padded = format!(" {} ", sentence.to_lowercase());
            if ASSERTIVE_MARKERS.iter().any(|m| padded.contains(m)) {
                claims.push(sentence.to_string());
                if claims.len() >= max {
                    return claims;
                }
            }
        }
    }
    claims
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start();
    if let Some(rest) = line
        .strip_prefix(|c: char| matches!(c, '-' | '*' | '+'))
        .filter(|rest| rest.starts_with(char::is_whitespace))
    {
        return rest.trim_start();
    }
    let digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if digits.len() != line.len() {
        if let Some(rest) = digits
            .strip_prefix(|c: char| c == '.' || c == ')')
            .filter(|rest| rest.starts_with(char::is_whitespace))
        {
            return rest.trim_start();
        }
    }
    line
}

/// Splits on `.`, `!` or `?` only when followed by whitespace or the end of
/// the line, so decimals like `99.9` stay in one sentence.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = i + c.len_utf8();
            sentences.push(line[start..end].trim());
            start = end;
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::consensus::ConsensusEngine;
    use async_trait::async_trait;
    use blueprint_agent::FactCheckVerdict;
    use blueprint_core::{BlueprintError, BlueprintResult};
    use blueprint_memory::LocalKnowledgeIndex;

    const TEXT: &str = "\
# Storage

- PostgreSQL is a relational database with strong transactional guarantees.
- Redis provides an in-memory cache for hot reads and session data.

```sql
SELECT 1 is not a claim because it is code inside a fenced block;
```

| Table | Column |
|---|---|

Short line.";

    struct StaticChecker(bool);

    #[async_trait]
    impl FactChecker for StaticChecker {
        async fn fact_check(&self, _claim: &str, _c: &Credentials) -> BlueprintResult<FactCheckVerdict> {
            Ok(FactCheckVerdict {
                is_grounded: self.0,
                sources: vec!["https://example.org".into()],
            })
        }
    }

    struct BrokenChecker;

    #[async_trait]
    impl FactChecker for BrokenChecker {
        async fn fact_check(&self, _claim: &str, _c: &Credentials) -> BlueprintResult<FactCheckVerdict> {
            Err(BlueprintError::Http("search API error 503: unavailable".into()))
        }
    }

    async fn item(text: &str) -> ConsensusItem {
        ConsensusEngine::new()
            .score(&TaskId::from("task-4"), text, &Credentials::new("claude", "m"), None)
            .await
    }

    #[test]
    fn test_extract_claims_skips_code_tables_and_headings() {
        let claims = extract_claims(TEXT, 3);
        assert_eq!(claims.len(), 2);
        assert!(claims[0].starts_with("PostgreSQL is"));
        assert!(claims[1].starts_with("Redis provides"));
    }

    #[test]
    fn test_extract_claims_respects_max() {
        assert_eq!(extract_claims(TEXT, 1).len(), 1);
    }

    #[test]
    fn test_extract_claims_keeps_leading_numbers() {
        let text = "99.9% uptime is guaranteed by the managed database tier.\n\
                    2024 is the launch year for the public beta program.";
        let claims = extract_claims(text, 3);
        assert_eq!(
            claims,
            vec![
                "99.9% uptime is guaranteed by the managed database tier.",
                "2024 is the launch year for the public beta program.",
            ]
        );
    }

    #[test]
    fn test_extract_claims_strips_list_markers() {
        let text = "1. PostgreSQL is the primary store for tenant records.\n\
                    2) Redis is used as a cache for hot session lookups.\n\
                    * Kafka provides the event backbone between services.";
        let claims = extract_claims(text, 5);
        assert_eq!(
            claims,
            vec![
                "PostgreSQL is the primary store for tenant records.",
                "Redis is used as a cache for hot session lookups.",
                "Kafka provides the event backbone between services.",
            ]
        );
    }

    #[tokio::test]
    async fn test_loose_policy_passes_without_sources() {
        let validator = GroundingValidator::new(0.78, 3);
        let report = validator.validate(&item(TEXT).await, &Credentials::new("claude", "m")).await;
        assert_eq!(report.claims_checked.len(), 2);
        assert_eq!(report.ungrounded.len(), 2);
        assert!(report.issues.is_empty());
        assert_eq!(report.status, GroundingStatus::Pass);
    }

    #[tokio::test]
    async fn test_enforced_policy_warns() {
        let validator = GroundingValidator::new(0.78, 3).with_enforcement(true);
        let report = validator.validate(&item(TEXT).await, &Credentials::new("claude", "m")).await;
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.status, GroundingStatus::Warn);
    }

    #[tokio::test]
    async fn test_index_hit_grounds_claim() {
        let index = LocalKnowledgeIndex::new();
        index
            .add_passage(
                "postgres.md",
                "PostgreSQL is a relational database with strong transactional guarantees.",
            )
            .await;
        let validator = GroundingValidator::new(0.78, 3)
            .with_index(Arc::new(index))
            .with_fact_checker(Arc::new(StaticChecker(false)))
            .with_enforcement(true);

        let report = validator.validate(&item(TEXT).await, &Credentials::new("claude", "m")).await;
        let indexed: Vec<&GroundingEvidence> = report
            .evidence
            .iter()
            .filter(|e| e.source == EvidenceSource::KnowledgeIndex)
            .collect();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].references, vec!["postgres.md".to_string()]);
        assert_eq!(report.ungrounded.len(), 1);
        assert!(report.ungrounded[0].starts_with("Redis"));
    }

    #[tokio::test]
    async fn test_fact_checker_verdict_is_recorded() {
        let validator = GroundingValidator::new(0.78, 3)
            .with_fact_checker(Arc::new(StaticChecker(true)))
            .with_enforcement(true);
        let report = validator.validate(&item(TEXT).await, &Credentials::new("claude", "m")).await;
        assert!(report.ungrounded.is_empty());
        assert_eq!(report.evidence.len(), 2);
        assert!(report.evidence.iter().all(|e| e.source == EvidenceSource::FactCheck));
        assert_eq!(report.status, GroundingStatus::Pass);
    }

    #[tokio::test]
    async fn test_fact_checker_errors_are_not_fatal() {
        let validator = GroundingValidator::new(0.78, 3).with_fact_checker(Arc::new(BrokenChecker));
        let report = validator.validate(&item(TEXT).await, &Credentials::new("claude", "m")).await;
        assert_eq!(report.ungrounded.len(), 2);
        assert_eq!(report.status, GroundingStatus::Pass);
    }
}
