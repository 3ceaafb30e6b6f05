use crate::mentions_any;
use crate::report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};

const CHECKS: &[(&str, &str, &[&str], &str)] = &[
    (
        "SCALE-CACHE",
        "Caching layer",
        &["cache", "redis", "memcached", "cdn", "cloudfront"],
        "Add a cache (Redis/CDN) in front of hot read paths.",
    ),
    (
        "SCALE-LB",
        "Load balancing",
        &["load balancer", "alb", "elb", "nginx", "ingress", "traffic manager"],
        "Put stateless instances behind a load balancer.",
    ),
    (
        "SCALE-HORIZONTAL",
        "Horizontal scaling",
        &["autoscal", "auto-scal", "horizontal", "replicas", "hpa", "scale out"],
        "Define autoscaling rules on CPU/latency for the service tier.",
    ),
    (
        "SCALE-ASYNC",
        "Asynchronous processing",
        &["queue", "sqs", "kafka", "rabbitmq", "pub/sub", "event bus", "background job"],
        "Move slow or bursty work onto a queue processed by workers.",
    ),
    (
        "SCALE-DATA",
        "Database scaling",
        &["read replica", "sharding", "partition", "connection pool"],
        "Plan read replicas or partitioning and use connection pooling.",
    ),
];

const SINGLE_POINTS: &[&str] = &["single instance", "single server", "one server", "single node"];

/// Score how well the design addresses common scaling concerns.
pub fn assess_scalability(text: &str) -> ToolReport {
    let lower = text.to_lowercase();
    let mut findings = Vec::new();
    let mut satisfied = 0usize;

    for (id, title, evidence, recommendation) in CHECKS {
        if mentions_any(&lower, evidence) {
            satisfied += 1;
        } else {
            findings.push(ToolFinding::new(
                *id,
                ToolSeverity::Low,
                format!("{title} not addressed"),
                format!("No mention of {}", evidence.join(" / ")),
                *recommendation,
            ));
        }
    }

    if mentions_any(&lower, SINGLE_POINTS) {
        findings.push(ToolFinding::new(
            "SCALE-SPOF",
            ToolSeverity::High,
            "Single point of failure",
            "The design runs a critical component as a single instance.",
            "Run at least two instances across availability zones.",
        ));
    }

    let score = satisfied as f64 / CHECKS.len() as f64;
    ToolReport::new(ToolKind::Scalability, findings)
        .with_metrics(serde_json::json!({ "score": score, "satisfied": satisfied }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_well_scaled_design() {
        let report = assess_scalability(
            "Stateless pods behind an ALB with HPA autoscaling, Redis cache, SQS queue, \
             and a Postgres read replica.",
        );
        assert!(report.passed);
        assert!(report.findings.is_empty());
        assert_eq!(report.metrics["score"], 1.0);
    }

    #[test]
    fn test_single_point_of_failure() {
        let report = assess_scalability("The API runs on a single server with SQLite.");
        assert!(!report.passed);
        assert!(report.findings.iter().any(|f| f.id == "SCALE-SPOF"));
        assert_eq!(report.metrics["satisfied"], 0);
    }
}
