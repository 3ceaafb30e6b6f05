use crate::report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Flat monthly price per unit, in USD.
const PRICE_TABLE: &[(&str, f64)] = &[
    ("EC2", 40.0),
    ("RDS", 60.0),
    ("ELASTICACHE", 50.0),
    ("EKS", 73.0),
    ("ALB", 20.0),
    ("ELB", 20.0),
    ("NAT", 35.0),
    ("LAMBDA", 10.0),
    ("S3", 5.0),
    ("CLOUDFRONT", 15.0),
];

/// Monthly totals above this are flagged for review.
const BUDGET_WARNING_USD: f64 = 2_000.0;

static QUANTITY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,4})\s*(?:x\s*)?(EC2|RDS|ElastiCache|EKS|ALB|ELB|NAT|Lambda|S3|CloudFront)\b",
    )
    .ok()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub service: String,
    pub quantity: u32,
    pub unit_monthly_usd: f64,
    pub subtotal_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub items: Vec<CostLineItem>,
    pub monthly_total_usd: f64,
}

fn unit_price(service: &str) -> Option<f64> {
    PRICE_TABLE
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, price)| *price)
}

/// Sum every "<quantity> <service>" mention in the text.
pub fn estimate_cost(text: &str) -> CostEstimate {
    let mut items = Vec::new();
    if let Some(re) = QUANTITY_PATTERN.as_ref() {
        for caps in re.captures_iter(text) {
            let quantity: u32 = match caps[1].parse() {
                Ok(q) => q,
                Err(_) => continue,
            };
            let service = caps[2].to_uppercase();
            let Some(unit) = unit_price(&service) else {
                continue;
            };
            items.push(CostLineItem {
                subtotal_usd: unit * quantity as f64,
                service,
                quantity,
                unit_monthly_usd: unit,
            });
        }
    }
    let monthly_total_usd = items.iter().map(|i| i.subtotal_usd).sum();
    CostEstimate {
        items,
        monthly_total_usd,
    }
}

/// Cost estimate wrapped as a tool report.
pub fn cost_report(text: &str) -> ToolReport {
    let estimate = estimate_cost(text);
    let mut findings = Vec::new();

    if estimate.items.is_empty() {
        findings.push(ToolFinding::new(
            "COST-1",
            ToolSeverity::Low,
            "No sized infrastructure",
            "No service is mentioned with an instance count, so cost cannot be estimated.",
            "State instance counts per service (e.g. '2 EC2', '1 RDS').",
        ));
    } else {
        findings.push(ToolFinding::new(
            "COST-1",
            ToolSeverity::Info,
            "Estimated monthly cost",
            format!("${:.2}/month across {} line item(s)", estimate.monthly_total_usd, estimate.items.len()),
            "",
        ));
        if estimate.monthly_total_usd > BUDGET_WARNING_USD {
            findings.push(ToolFinding::new(
                "COST-2",
                ToolSeverity::Medium,
                "High monthly cost",
                format!(
                    "Estimated ${:.2}/month exceeds ${BUDGET_WARNING_USD:.0}",
                    estimate.monthly_total_usd
                ),
                "Consider reserved capacity, autoscaling floors, or smaller instance classes.",
            ));
        }
    }

    let metrics = serde_json::to_value(&estimate).unwrap_or(serde_json::Value::Null);
    ToolReport::new(ToolKind::CostEstimate, findings).with_metrics(metrics)
}
