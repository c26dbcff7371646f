//! Flight and financial risk scoring.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{AgentKind, CaseAgent};
use crate::gateway::{Field, FieldType, Gateway, InferenceError, ResponseSchema};
use crate::prompts::RISK_PROMPT;

pub struct RiskAgent {
    gateway: Arc<Gateway>,
    schema: ResponseSchema,
}

impl RiskAgent {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            schema: Self::schema(),
        }
    }

    pub fn schema() -> ResponseSchema {
        ResponseSchema::new(
            "RiskAssessment",
            vec![
                Field::required("risk_score", FieldType::Integer),
                Field::required("risk_tier", FieldType::String),
                Field::required("risk_factors", FieldType::list(FieldType::String)),
                Field::required("mitigating_factors", FieldType::list(FieldType::String)),
                Field::required("recommendation", FieldType::String),
            ],
        )
    }
}

#[async_trait]
impl CaseAgent for RiskAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Risk
    }

    /// `input` is the case facts.
    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
        self.gateway.invoke(RISK_PROMPT, &self.schema, Some(input)).await
    }
}
