use crate::mentions_any;
use crate::report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};
use regex::Regex;
use std::sync::LazyLock;

static ENDPOINT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE)\s+`?(/[A-Za-z0-9_\-/{}:.]*)").ok()
});

static VERSION_SEGMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^/(?:api/)?v\d+(?:/|$)").ok());

const PATH_VERBS: &[&str] = &["get", "create", "update", "delete", "fetch", "remove", "list"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
}

/// Every "METHOD /path" mention, in order of appearance.
pub fn extract_endpoints(text: &str) -> Vec<Endpoint> {
    let Some(re) = ENDPOINT_PATTERN.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|caps| Endpoint {
            method: caps[1].to_string(),
            path: caps[2].trim_end_matches(|c: char| c == '.' || c == ':').to_string(),
        })
        .collect()
}

fn is_versioned(path: &str) -> bool {
    VERSION_SEGMENT
        .as_ref()
        .map(|re| re.is_match(path))
        .unwrap_or(false)
}

fn verb_segment(path: &str) -> Option<&str> {
    path.split('/').find(|segment| {
        let lower = segment.to_lowercase();
        PATH_VERBS.iter().any(|verb| {
            let Some(rest) = lower.strip_prefix(verb) else {
                return false;
            };
            // get_orders, get-orders, getOrders
            rest.is_empty()
                || rest.starts_with(|c: char| c == '_' || c == '-')
                || segment[verb.len()..].starts_with(|c: char| c.is_ascii_uppercase())
        })
    })
}

/// Lint the API contract described in `text`.
pub fn lint_api(text: &str) -> ToolReport {
    let endpoints = extract_endpoints(text);
    let lower = text.to_lowercase();
    let mut findings = Vec::new();
    let mut next_id = {
        let mut n = 0;
        move || {
            n += 1;
            format!("API-{n}")
        }
    };

    if endpoints.is_empty() {
        findings.push(ToolFinding::new(
            next_id(),
            ToolSeverity::Medium,
            "No endpoints documented",
            "The contract lists no 'METHOD /path' endpoints.",
            "Enumerate each endpoint with its method, path, request and response shape.",
        ));
    }

    let unversioned: Vec<&str> = endpoints
        .iter()
        .filter(|e| !is_versioned(&e.path))
        .map(|e| e.path.as_str())
        .collect();
    let header_versioned = lower.contains("api-version") || lower.contains("accept-version");
    if !unversioned.is_empty() && !header_versioned {
        findings.push(ToolFinding::new(
            next_id(),
            ToolSeverity::Low,
            "Unversioned endpoints",
            format!(
                "{} endpoint(s) lack a version prefix, e.g. {}",
                unversioned.len(),
                unversioned[0]
            ),
            "Prefix paths with /v1 or document a version header.",
        ));
    }

    for endpoint in &endpoints {
        if let Some(segment) = verb_segment(&endpoint.path) {
            findings.push(ToolFinding::new(
                next_id(),
                ToolSeverity::Medium,
                "Verb in resource path",
                format!(
                    "{} {} uses '{}' as a path segment",
                    endpoint.method, endpoint.path, segment
                ),
                "Model resources as nouns and let the HTTP method carry the action.",
            ));
        }
    }

    let documents_errors = mentions_any(
        &lower,
        &["400", "401", "403", "404", "409", "422", "error response", "problem+json"],
    );
    if !endpoints.is_empty() && !documents_errors {
        findings.push(ToolFinding::new(
            next_id(),
            ToolSeverity::Medium,
            "Error responses undocumented",
            "No 4xx status codes or error body format are described.",
            "Define a uniform error envelope and the status codes each endpoint returns.",
        ));
    }

    if !mentions_any(&lower, &["auth", "bearer", "token", "oauth", "jwt", "api key"]) {
        findings.push(ToolFinding::new(
            next_id(),
            ToolSeverity::High,
            "No authentication scheme",
            "The contract never states how callers authenticate.",
            "Specify the auth scheme (e.g. OAuth 2.0 bearer JWT) and which endpoints require it.",
        ));
    }

    let has_collection_get = endpoints
        .iter()
        .any(|e| e.method == "GET" && !e.path.contains('{') && !e.path.contains(':'));
    if has_collection_get && !mentions_any(&lower, &["paginat", "cursor", "limit", "page"]) {
        findings.push(ToolFinding::new(
            next_id(),
            ToolSeverity::Low,
            "Collections without pagination",
            "List endpoints do not describe paging.",
            "Add cursor or limit/offset parameters to collection endpoints.",
        ));
    }

    let count = endpoints.len();
    ToolReport::new(ToolKind::ApiLint, findings)
        .with_metrics(serde_json::json!({ "endpoints": count }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const GOOD_CONTRACT: &str = "\
All endpoints require an OAuth 2.0 bearer JWT.
- GET /v1/todos?cursor=...&limit=50
- POST /v1/todos
- DELETE /v1/todos/{id}
Errors use application/problem+json with 400, 404 and 422 codes.";

    #[test]
    fn test_extract_endpoints() {
        let endpoints = extract_endpoints(GOOD_CONTRACT);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].method, "GET");
        assert_eq!(endpoints[0].path, "/v1/todos");
        assert_eq!(endpoints[2].path, "/v1/todos/{id}");
    }

    #[test]
    fn test_good_contract_is_clean() {
        let report = lint_api(GOOD_CONTRACT);
        assert!(report.passed);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.metrics["endpoints"], 3);
    }

    #[test]
    fn test_flags_verbs_versions_and_auth() {
        let report = lint_api("POST /createUser\nGET /users/{id}\nReturns 404 when missing.");
        let titles: Vec<&str> = report.findings.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Verb in resource path"));
        assert!(titles.contains(&"Unversioned endpoints"));
        assert!(titles.contains(&"No authentication scheme"));
        assert!(!report.passed);
    }

    #[test]
    fn test_no_endpoints() {
        let report = lint_api("The backend uses token auth.");
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].title, "No endpoints documented");
    }

    #[test]
    fn test_verb_segment_detection() {
        assert_eq!(verb_segment("/v1/get_orders"), Some("get_orders"));
        assert_eq!(verb_segment("/v1/createOrder"), Some("createOrder"));
        assert_eq!(verb_segment("/v1/orders"), None);
        assert_eq!(verb_segment("/v1/updates"), None);
    }
}
