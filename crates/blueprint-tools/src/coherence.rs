use crate::api_lint::extract_endpoints;
use crate::{mentions_any, mentions_word};
use crate::report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};
use blueprint_core::{AgentRole, ArtifactSet, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DATABASES: &[(&str, &str)] = &[
    ("postgres", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mariadb", "MariaDB"),
    ("mongodb", "MongoDB"),
    ("dynamodb", "DynamoDB"),
    ("cassandra", "Cassandra"),
    ("firestore", "Firestore"),
    ("sqlite", "SQLite"),
    ("cosmos db", "Cosmos DB"),
];

const CLOUDS: &[(&str, &[&str])] = &[
    ("AWS", &["aws", "ec2", "rds", "dynamodb", "lambda", "cloudfront", "eks"]),
    ("GCP", &["gcp", "google cloud", "cloud run", "firestore", "bigquery", "gke"]),
    ("Azure", &["azure", "cosmos db", "aks"]),
];

const AUTH_TERMS: &[&str] = &["oauth", "jwt", "openid", "oidc", "saml", "session cookie", "bearer"];

/// An inconsistency between two or more artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceIssue {
    pub severity: ToolSeverity,
    pub sections: Vec<Section>,
    /// The role whose artifact should change to resolve the issue.
    pub affected_role: AgentRole,
    pub issue: String,
    pub recommendation: String,
}

fn lower(artifacts: &ArtifactSet, section: Section) -> Option<String> {
    artifacts.get(section).map(str::to_lowercase)
}

fn named(lower_text: &str, table: &[(&str, &'static str)]) -> BTreeSet<&'static str> {
    table
        .iter()
        .filter(|(needle, _)| lower_text.contains(needle))
        .map(|(_, name)| *name)
        .collect()
}

fn clouds(lower_text: &str) -> BTreeSet<&'static str> {
    CLOUDS
        .iter()
        .filter(|(_, terms)| mentions_word(lower_text, terms))
        .map(|(name, _)| *name)
        .collect()
}

fn join(set: &BTreeSet<&str>) -> String {
    set.iter().copied().collect::<Vec<_>>().join(", ")
}

/// Resource nouns from a backend contract: `/v1/orders/{id}` yields `order`.
fn resources(backend: &str) -> BTreeSet<String> {
    extract_endpoints(backend)
        .iter()
        .filter_map(|e| {
            e.path
                .split('/')
                .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()))
                .find(|s| !matches!(*s, "api" | "v1" | "v2" | "auth" | "health"))
                .map(|s| s.to_lowercase())
        })
        .map(|s| s.strip_suffix('s').map(str::to_string).unwrap_or(s))
        .filter(|s| s.len() > 2)
        .collect()
}

/// Compare the artifacts pairwise for contradictions and gaps.
pub fn check_coherence(artifacts: &ArtifactSet) -> Vec<CoherenceIssue> {
    let mut issues = Vec::new();
    let backend = lower(artifacts, Section::Backend);
    let data_model = lower(artifacts, Section::DataModel);
    let security = lower(artifacts, Section::Security);
    let platform = lower(artifacts, Section::Infrastructure);

    if let (Some(backend), Some(data_model)) = (&backend, &data_model) {
        let backend_dbs = named(backend, DATABASES);
        let model_dbs = named(data_model, DATABASES);
        if !backend_dbs.is_empty() && !model_dbs.is_empty() && backend_dbs.is_disjoint(&model_dbs) {
            issues.push(CoherenceIssue {
                severity: ToolSeverity::High,
                sections: vec![Section::Backend, Section::DataModel],
                affected_role: AgentRole::DataModel,
                issue: format!(
                    "Backend targets {} but the data model is designed for {}",
                    join(&backend_dbs),
                    join(&model_dbs)
                ),
                recommendation: "Align the data model with the database chosen by the backend."
                    .into(),
            });
        }

        let missing: Vec<String> = resources(artifacts.get(Section::Backend).unwrap_or_default())
            .into_iter()
            .filter(|r| !data_model.contains(r.as_str()))
            .collect();
        if !missing.is_empty() {
            issues.push(CoherenceIssue {
                severity: ToolSeverity::Medium,
                sections: vec![Section::Backend, Section::DataModel],
                affected_role: AgentRole::DataModel,
                issue: format!(
                    "API resources without a data model entity: {}",
                    missing.join(", ")
                ),
                recommendation: "Add entities (fields, keys, relations) for every API resource."
                    .into(),
            });
        }
    }

    if let (Some(security), Some(backend)) = (&security, &backend) {
        if mentions_any(security, AUTH_TERMS) && !mentions_any(backend, AUTH_TERMS) {
            issues.push(CoherenceIssue {
                severity: ToolSeverity::Medium,
                sections: vec![Section::Security, Section::Backend],
                affected_role: AgentRole::Backend,
                issue: "Security defines an authentication scheme the API contract never applies"
                    .into(),
                recommendation: "State which endpoints require authentication and how tokens are validated."
                    .into(),
            });
        }
    }

    if let Some(platform) = &platform {
        let platform_clouds = clouds(platform);
        for (section, text) in [(Section::Backend, &backend), (Section::DataModel, &data_model)] {
            let Some(text) = text else { continue };
            let other = clouds(text);
            if !platform_clouds.is_empty() && !other.is_empty() && platform_clouds.is_disjoint(&other) {
                issues.push(CoherenceIssue {
                    severity: ToolSeverity::High,
                    sections: vec![section, Section::Infrastructure],
                    affected_role: AgentRole::Platform,
                    issue: format!(
                        "{} relies on {} services but infrastructure deploys to {}",
                        section.title(),
                        join(&other),
                        join(&platform_clouds)
                    ),
                    recommendation: "Deploy to the cloud whose managed services the design depends on."
                        .into(),
                });
            }
        }
    }

    issues
}

/// Coherence issues wrapped as a tool report.
pub fn coherence_report(issues: &[CoherenceIssue]) -> ToolReport {
    let findings = issues
        .iter()
        .enumerate()
        .map(|(i, issue)| {
            ToolFinding::new(
                format!("COH-{}", i + 1),
                issue.severity,
                format!("Incoherent {}", issue.affected_role),
                issue.issue.clone(),
                issue.recommendation.clone(),
            )
        })
        .collect();
    ToolReport::new(ToolKind::Coherence, findings)
        .with_metrics(serde_json::json!({ "issues": issues.len() }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn artifacts(entries: &[(Section, &str)]) -> ArtifactSet {
        let mut set = ArtifactSet::new();
        for (section, text) in entries {
            set.commit(*section, *text).unwrap();
        }
        set
    }

    #[test]
    fn test_database_conflict() {
        let set = artifacts(&[
            (Section::Backend, "Node service on PostgreSQL with OAuth bearer tokens."),
            (Section::DataModel, "Collections stored in MongoDB."),
        ]);
        let issues = check_coherence(&set);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ToolSeverity::High);
        assert_eq!(issues[0].affected_role, AgentRole::DataModel);
    }

    #[test]
    fn test_missing_entity() {
        let set = artifacts(&[
            (Section::Backend, "GET /v1/orders and GET /v1/customers/{id}"),
            (Section::DataModel, "Table customer(id, name)."),
        ]);
        let issues = check_coherence(&set);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].issue.contains("order"));
        assert!(!issues[0].issue.contains("customer"));
    }

    #[test]
    fn test_auth_gap() {
        let set = artifacts(&[
            (Section::Security, "Users sign in with OAuth 2.0; APIs accept JWT."),
            (Section::Backend, "A REST service."),
        ]);
        let issues = check_coherence(&set);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].affected_role, AgentRole::Backend);
    }

    #[test]
    fn test_cloud_conflict() {
        let set = artifacts(&[
            (Section::DataModel, "Documents live in Firestore."),
            (Section::Infrastructure, "Deploy on AWS with EKS."),
        ]);
        let issues = check_coherence(&set);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].affected_role, AgentRole::Platform);
    }

    #[test]
    fn test_coherent_set_has_no_issues() {
        let set = artifacts(&[
            (Section::Backend, "GET /v1/todos on PostgreSQL, JWT required."),
            (Section::DataModel, "PostgreSQL table todo(id, title)."),
            (Section::Security, "JWT access tokens."),
            (Section::Infrastructure, "AWS RDS and ECS."),
        ]);
        assert!(check_coherence(&set).is_empty());
        let report = coherence_report(&check_coherence(&set));
        assert!(report.passed);
        assert_eq!(report.metrics["issues"], 0);
    }
}
