use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Plan,
    Dispatch,
    Consensus,
    ToolExecution,
    Grounding,
    Verify,
    Finalize,
}

/// Severity of a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Immutable trace record. Write-once; histories are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub trace_id: Uuid,
    pub job_id: Uuid,
    /// RFC 3339 / ISO-8601 on the wire.
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub event_type: String,
    pub level: EventLevel,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(
        job_id: Uuid,
        phase: Phase,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            job_id,
            timestamp: Utc::now(),
            phase,
            event_type: event_type.into(),
            level: EventLevel::Info,
            payload,
        }
    }

    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == EventLevel::Error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let env = EventEnvelope::new(
            Uuid::new_v4(),
            Phase::ToolExecution,
            "tool_report",
            serde_json::json!({"tool": "cost_estimator"}),
        )
        .with_level(EventLevel::Warn);

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["phase"], "TOOL_EXECUTION");
        assert_eq!(json["level"], "WARN");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));

        let parsed: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.trace_id, env.trace_id);
        assert!(!parsed.is_error());
    }
}
