use crate::mentions_any;
use crate::report::{ToolFinding, ToolKind, ToolReport, ToolSeverity};

const PERSONAL_DATA: &[&str] = &[
    "personal data",
    "pii",
    "email",
    "phone number",
    "date of birth",
    "home address",
    "full name",
    "user profile",
    "location data",
    "health data",
    "payment card",
];

struct Control {
    id: &'static str,
    severity: ToolSeverity,
    title: &'static str,
    evidence: &'static [&'static str],
    recommendation: &'static str,
}

const CONTROLS: &[Control] = &[
    Control {
        id: "GDPR-CONSENT",
        severity: ToolSeverity::High,
        title: "Lawful basis / consent",
        evidence: &["consent", "lawful basis", "legitimate interest", "opt-in"],
        recommendation: "Record the lawful basis for each processing purpose and capture consent where required.",
    },
    Control {
        id: "GDPR-RETENTION",
        severity: ToolSeverity::Medium,
        title: "Retention policy",
        evidence: &["retention", "retain", "purge", "ttl", "deleted after"],
        recommendation: "Define how long each category of personal data is kept and how it is purged.",
    },
    Control {
        id: "GDPR-ENCRYPTION",
        severity: ToolSeverity::High,
        title: "Encryption of personal data",
        evidence: &["encrypt", "tls", "aes", "kms"],
        recommendation: "Encrypt personal data in transit (TLS 1.2+) and at rest (AES-256/KMS).",
    },
    Control {
        id: "GDPR-ERASURE",
        severity: ToolSeverity::Medium,
        title: "Data subject rights",
        evidence: &["erasure", "right to be forgotten", "delete account", "data export", "subject access"],
        recommendation: "Provide account deletion and data export flows for data subject requests.",
    },
    Control {
        id: "GDPR-MINIMISATION",
        severity: ToolSeverity::Low,
        title: "Data minimisation",
        evidence: &["minimi", "pseudonym", "anonymi", "only the data"],
        recommendation: "Collect only fields needed for the stated purpose; pseudonymise analytics data.",
    },
];

/// GDPR-style checks, applied only when the text handles personal data.
pub fn check_compliance(text: &str) -> ToolReport {
    let lower = text.to_lowercase();
    let handles_personal_data = mentions_any(&lower, PERSONAL_DATA);

    let findings = if handles_personal_data {
        CONTROLS
            .iter()
            .filter(|c| !mentions_any(&lower, c.evidence))
            .map(|c| {
                ToolFinding::new(
                    c.id,
                    c.severity,
                    c.title,
                    "Personal data is processed but this control is not addressed.",
                    c.recommendation,
                )
            })
            .collect()
    } else {
        vec![ToolFinding::new(
            "GDPR-SCOPE",
            ToolSeverity::Info,
            "No personal data",
            "The artifact does not describe processing of personal data.",
            "",
        )]
    };

    ToolReport::new(ToolKind::Compliance, findings)
        .with_metrics(serde_json::json!({ "personal_data": handles_personal_data }))
}
