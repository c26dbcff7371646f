//! Decision rationale for the human agent.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{AgentKind, CaseAgent};
use crate::gateway::{Field, FieldType, Gateway, InferenceError, ResponseSchema};
use crate::prompts::EXPLANATION_PROMPT;

pub struct ExplanationAgent {
    gateway: Arc<Gateway>,
    schema: ResponseSchema,
}

impl ExplanationAgent {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            schema: Self::schema(),
        }
    }

    pub fn schema() -> ResponseSchema {
        ResponseSchema::new(
            "DecisionExplanation",
            vec![
                Field::required("summary", FieldType::String),
                Field::required("detailed_reasoning", FieldType::String),
                Field::required("recommended_action", FieldType::String),
            ],
        )
    }
}

#[async_trait]
impl CaseAgent for ExplanationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Explanation
    }

    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
        self.gateway
            .invoke(EXPLANATION_PROMPT, &self.schema, Some(input))
            .await
    }
}
