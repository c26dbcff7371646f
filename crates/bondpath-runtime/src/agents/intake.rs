//! Structured extraction from raw intake notes.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{AgentKind, CaseAgent};
use crate::gateway::{Field, FieldType, Gateway, InferenceError, ResponseSchema};
use crate::prompts::INTAKE_PROMPT;

pub struct IntakeAgent {
    gateway: Arc<Gateway>,
    schema: ResponseSchema,
}

impl IntakeAgent {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            schema: Self::schema(),
        }
    }

    /// Defendant and indemnitor identity, bond amount and flags.
    pub fn schema() -> ResponseSchema {
        let defendant = FieldType::Record(vec![
            Field::required("name", FieldType::String),
            Field::optional("dob", FieldType::String),
            Field::optional("jail", FieldType::String),
            Field::required("charges", FieldType::list(FieldType::String)),
        ]);
        let indemnitor = FieldType::Record(vec![
            Field::required("name", FieldType::String),
            Field::required("relationship", FieldType::String),
            Field::optional("phone", FieldType::String),
            Field::optional("income", FieldType::Number),
        ]);

        ResponseSchema::new(
            "IntakeOutput",
            vec![
                Field::required("defendant", defendant),
                Field::required("indemnitor", indemnitor),
                Field::required("bond_amount", FieldType::Number),
                Field::required("flags", FieldType::list(FieldType::String)),
                Field::required("confidence_score", FieldType::Number),
            ],
        )
    }
}

#[async_trait]
impl CaseAgent for IntakeAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Intake
    }

    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
        self.gateway
            .invoke(INTAKE_PROMPT, &self.schema, Some(input))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedProvider;
    use crate::gateway::InferenceErrorKind;
    use crate::providers::{CompletionConfig, PromptInput};
    use serde_json::json;

    #[test]
    fn test_schema_accepts_minimal_extraction() {
        let output = json!({
            "defendant": { "name": "John Doe", "charges": ["DWI"] },
            "indemnitor": { "name": "Jane Doe", "relationship": "Spouse", "income": null },
            "bond_amount": 5000,
            "flags": [],
            "confidence_score": 0.9
        });
        assert!(IntakeAgent::schema().validate(&output).is_ok());
    }

    #[tokio::test]
    async fn test_run_sends_raw_input_as_context() {
        let provider = ScriptedProvider::new(
            "primary",
            vec![Ok(json!({
                "defendant": { "name": "John Doe", "charges": [] },
                "indemnitor": { "name": "Jane Doe", "relationship": "Mother" },
                "bond_amount": 2500,
                "flags": ["out_of_county"],
                "confidence_score": 0.8
            })
            .to_string())],
        );
        let gateway = Arc::new(Gateway::new(provider.clone(), CompletionConfig::default()));
        let agent = IntakeAgent::new(gateway);

        let output = agent
            .run(&json!({ "raw_text": "John Doe held in Dallas" }))
            .await
            .unwrap();
        assert_eq!(output["bond_amount"], 2500);

        let sent = provider.requests.lock()[0].input.clone();
        match sent {
            PromptInput::Text(text) => assert!(text.ends_with(r#"Context: {"raw_text":"John Doe held in Dallas"}"#)),
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incomplete_extraction_is_schema_mismatch() {
        let provider = ScriptedProvider::new("primary", vec![Ok(json!({ "bond_amount": 1 }).to_string())]);
        let agent = IntakeAgent::new(Arc::new(Gateway::new(provider, CompletionConfig::default())));

        let err = agent.run(&json!({})).await.unwrap_err();
        assert_eq!(err.kind(), InferenceErrorKind::SchemaMismatch);
    }
}
