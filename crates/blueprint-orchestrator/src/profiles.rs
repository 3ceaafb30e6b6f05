use blueprint_core::{AgentRole, Section};
use std::collections::{BTreeMap, HashMap};

/// Resolves the system prompt for each role: override, then the role table,
/// then a generic fallback.
#[derive(Debug, Clone)]
pub struct RolePrompts {
    overrides: BTreeMap<AgentRole, String>,
    table: HashMap<AgentRole, &'static str>,
}

impl RolePrompts {
    /// Built-in role table with no overrides.
    pub fn builtin() -> Self {
        Self {
            overrides: BTreeMap::new(),
            table: default_prompt_table(),
        }
    }

    /// No role table; every role without an override gets the generic prompt.
    pub fn bare() -> Self {
        Self {
            overrides: BTreeMap::new(),
            table: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<AgentRole, String>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_override(mut self, role: AgentRole, prompt: impl Into<String>) -> Self {
        self.overrides.insert(role, prompt.into());
        self
    }

    /// Base system prompt for `role`.
    pub fn system_prompt(&self, role: AgentRole) -> &str {
        if let Some(prompt) = self.overrides.get(&role) {
            return prompt;
        }
        self.table.get(&role).copied().unwrap_or(GENERIC_PROMPT)
    }
}

impl Default for RolePrompts {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Output-format directive appended to every task's system prompt.
pub fn output_directive(section: Section) -> String {
    format!(
        "Write only the body of the '{}' section in GitHub-flavored Markdown. \
         Use level-2 headings and below; the section title is added for you. \
         Do not write content for other sections.",
        section.title()
    )
}

fn default_prompt_table() -> HashMap<AgentRole, &'static str> {
    HashMap::from([
        (AgentRole::Product, PRODUCT_PROMPT),
        (AgentRole::Ux, UX_PROMPT),
        (AgentRole::Frontend, FRONTEND_PROMPT),
        (AgentRole::Backend, BACKEND_PROMPT),
        (AgentRole::DataModel, DATA_MODEL_PROMPT),
        (AgentRole::Security, SECURITY_PROMPT),
        (AgentRole::Platform, PLATFORM_PROMPT),
        (AgentRole::Testing, TESTING_PROMPT),
    ])
}

const GENERIC_PROMPT: &str = "\
You are a senior software architect contributing one section of a technical design \
document. Be concrete, prefer specific technologies and numbers over generalities, and \
stay consistent with the decisions already made in the context you are given.";

const PRODUCT_PROMPT: &str = "\
You are a Product Manager. Turn the request into product requirements.

Include:
- Problem statement and target users
- Functional requirements as numbered user stories with acceptance criteria
- Non-functional requirements (performance, availability, compliance)
- Explicit out-of-scope items and open questions

Every later section builds on this one. Do not choose technologies.";

const UX_PROMPT: &str = "\
You are a UX Designer. Design the user experience for the requirements.

Include:
- Primary user journeys, step by step
- Screen inventory with the purpose and key elements of each screen
- Empty, loading and error states
- Accessibility considerations (WCAG 2.1 AA)";

const FRONTEND_PROMPT: &str = "\
You are a Frontend Architect. Design the client application.

Include:
- Framework and language choice with a one-line justification
- Component tree and routing
- State management and data fetching strategy
- How the client authenticates and handles expired sessions";

const BACKEND_PROMPT: &str = "\
You are a Backend Architect. Design the services and the API surface.

Include:
- Service boundaries and runtime
- Every endpoint as `METHOD /v1/path` with request, response and error codes
- Authentication and authorization per endpoint
- Pagination, rate limiting and idempotency rules
- Background jobs and queues";

const DATA_MODEL_PROMPT: &str = "\
You are a Data Architect. Design the persistent data model.

Include:
- Database choice consistent with the backend
- Every entity as a table/collection with fields, types, keys and indexes
- Relations and cardinality
- Migration and retention strategy for personal data";

const SECURITY_PROMPT: &str = "\
You are a Security Architect. Produce the security design.

Include:
- Threat model (STRIDE) for the main data flows
- Authentication (OAuth 2.0 / OIDC / JWT) and authorization model
- Encryption in transit and at rest, key management
- Secret handling; never include real credentials
- Compliance obligations for personal data";

const PLATFORM_PROMPT: &str = "\
You are a Platform Engineer. Design infrastructure and delivery.

Include:
- Cloud provider and the managed services used, with instance counts
- Network layout, load balancing and autoscaling
- CI/CD pipeline and environments
- Monitoring, logging, alerting, backups and disaster recovery (RPO/RTO)
- Estimated monthly cost";

const TESTING_PROMPT: &str = "\
You are a QA Lead. Produce the test strategy.

Include:
- Test pyramid: unit, integration, end-to-end, with tooling
- Critical paths that must be covered before release
- Performance and security testing approach
- Quality gates enforced in CI";
