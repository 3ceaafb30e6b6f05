use serde::{Deserialize, Serialize};

/// Role of each agent in the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Turns the raw request into product requirements.
    Product,
    /// Designs user journeys and screens.
    Ux,
    /// Designs the client-side architecture.
    Frontend,
    /// Designs services and the API surface.
    Backend,
    /// Designs entities, storage and migrations.
    DataModel,
    /// Threat model, authentication and data protection.
    Security,
    /// Infrastructure, deployment and cost.
    Platform,
    /// Test strategy and quality gates.
    Testing,
}

impl AgentRole {
    /// Every role, in pipeline order.
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Product,
        AgentRole::Ux,
        AgentRole::Frontend,
        AgentRole::Backend,
        AgentRole::DataModel,
        AgentRole::Security,
        AgentRole::Platform,
        AgentRole::Testing,
    ];

    /// The document section this role writes.
    pub fn section(self) -> Section {
        match self {
            AgentRole::Product => Section::Requirements,
            AgentRole::Ux => Section::UserExperience,
            AgentRole::Frontend => Section::Frontend,
            AgentRole::Backend => Section::Backend,
            AgentRole::DataModel => Section::DataModel,
            AgentRole::Security => Section::Security,
            AgentRole::Platform => Section::Infrastructure,
            AgentRole::Testing => Section::Testing,
        }
    }

    /// Stable identifier used in cache keys, events and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Product => "product",
            AgentRole::Ux => "ux",
            AgentRole::Frontend => "frontend",
            AgentRole::Backend => "backend",
            AgentRole::DataModel => "data_model",
            AgentRole::Security => "security",
            AgentRole::Platform => "platform",
            AgentRole::Testing => "testing",
        }
    }

    /// Lenient parse used for model-produced critiques ("Data Model", "qa", "devops", ...).
    pub fn parse_role(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "product" | "pm" | "productmanager" | "requirements" => Some(AgentRole::Product),
            "ux" | "uxdesigner" | "design" | "userexperience" => Some(AgentRole::Ux),
            "frontend" | "frontendarchitect" | "ui" => Some(AgentRole::Frontend),
            "backend" | "backendarchitect" | "api" => Some(AgentRole::Backend),
            "datamodel" | "data" | "database" | "dataarchitect" => Some(AgentRole::DataModel),
            "security" | "securityarchitect" | "sec" => Some(AgentRole::Security),
            "platform" | "devops" | "infrastructure" | "infra" => Some(AgentRole::Platform),
            "testing" | "qa" | "test" | "tester" => Some(AgentRole::Testing),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of document sections. Order of declaration is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Root section every other stage reads.
    Requirements,
    UserExperience,
    Frontend,
    Backend,
    DataModel,
    Security,
    Infrastructure,
    Testing,
}

impl Section {
    /// Heading used when the document is assembled.
    pub fn title(self) -> &'static str {
        match self {
            Section::Requirements => "Requirements",
            Section::UserExperience => "User Experience",
            Section::Frontend => "Frontend Architecture",
            Section::Backend => "Backend & API",
            Section::DataModel => "Data Model",
            Section::Security => "Security",
            Section::Infrastructure => "Infrastructure & Deployment",
            Section::Testing => "Testing Strategy",
        }
    }

    /// The role that owns this section.
    pub fn owner(self) -> AgentRole {
        match self {
            Section::Requirements => AgentRole::Product,
            Section::UserExperience => AgentRole::Ux,
            Section::Frontend => AgentRole::Frontend,
            Section::Backend => AgentRole::Backend,
            Section::DataModel => AgentRole::DataModel,
            Section::Security => AgentRole::Security,
            Section::Infrastructure => AgentRole::Platform,
            Section::Testing => AgentRole::Testing,
        }
    }

    /// Lenient parse accepting either the title or the snake_case name.
    pub fn parse_section(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "requirements" => Some(Section::Requirements),
            "userexperience" | "ux" => Some(Section::UserExperience),
            "frontend" | "frontendarchitecture" => Some(Section::Frontend),
            "backend" | "backendapi" | "api" => Some(Section::Backend),
            "datamodel" => Some(Section::DataModel),
            "security" => Some(Section::Security),
            "infrastructure" | "infrastructuredeployment" | "deployment" => {
                Some(Section::Infrastructure)
            }
            "testing" | "testingstrategy" => Some(Section::Testing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_section_roundtrip() {
        for role in AgentRole::ALL {
            assert_eq!(role.section().owner(), role);
        }
    }

    #[test]
    fn test_role_display() {
        assert_eq!(AgentRole::DataModel.to_string(), "data_model");
        assert_eq!(AgentRole::Platform.to_string(), "platform");
    }

    #[test]
    fn test_parse_role_lenient() {
        assert_eq!(AgentRole::parse_role("Data Model"), Some(AgentRole::DataModel));
        assert_eq!(AgentRole::parse_role("QA"), Some(AgentRole::Testing));
        assert_eq!(AgentRole::parse_role("DevOps"), Some(AgentRole::Platform));
        assert_eq!(AgentRole::parse_role("marketing"), None);
    }

    #[test]
    fn test_parse_section_lenient() {
        assert_eq!(Section::parse_section("Backend & API"), Some(Section::Backend));
        assert_eq!(Section::parse_section("data_model"), Some(Section::DataModel));
        assert_eq!(Section::parse_section("appendix"), None);
    }

    #[test]
    fn test_section_order_is_document_order() {
        assert!(Section::Requirements < Section::UserExperience);
        assert!(Section::Infrastructure < Section::Testing);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&AgentRole::DataModel).unwrap();
        assert_eq!(json, "\"data_model\"");
        let parsed: AgentRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AgentRole::DataModel);
    }
}
