//! Case agents.
//!
//! An agent is one gateway capability: a prompt plus the response schema it
//! expects. Stages call agents, never providers, so tests and embedders can
//! swap any agent for a scripted one.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::gateway::InferenceError;

mod documents;
mod explanation;
mod intake;
mod readiness;
mod risk;

pub use documents::DocumentVerificationAgent;
pub use explanation::ExplanationAgent;
pub use intake::IntakeAgent;
pub use readiness::ReadinessAgent;
pub use risk::RiskAgent;

/// What an agent does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentKind {
    Intake,
    Risk,
    Explanation,
    DocumentVerification,
    Readiness,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Intake => "intake",
            AgentKind::Risk => "risk",
            AgentKind::Explanation => "explanation",
            AgentKind::DocumentVerification => "document_verification",
            AgentKind::Readiness => "readiness",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway-backed assistant used by a pipeline stage.
///
/// `input` is the JSON context the agent reasons over; the output is the
/// schema-conforming mapping the gateway returned.
#[async_trait]
pub trait CaseAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::providers::ProviderError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Returns a fixed output (or a provider failure) and records inputs.
    pub struct ScriptedAgent {
        kind: AgentKind,
        output: Option<JsonValue>,
        pub inputs: Mutex<Vec<JsonValue>>,
    }

    impl ScriptedAgent {
        pub fn returning(kind: AgentKind, output: JsonValue) -> Arc<Self> {
            Arc::new(Self {
                kind,
                output: Some(output),
                inputs: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(kind: AgentKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                output: None,
                inputs: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.inputs.lock().len()
        }
    }

    #[async_trait]
    impl CaseAgent for ScriptedAgent {
        fn kind(&self) -> AgentKind {
            self.kind
        }

        async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
            self.inputs.lock().push(input.clone());
            self.output.clone().ok_or_else(|| InferenceError::Provider {
                provider: "scripted".to_string(),
                source: ProviderError::ApiError {
                    status: 503,
                    message: "unavailable".to_string(),
                },
            })
        }
    }
}
