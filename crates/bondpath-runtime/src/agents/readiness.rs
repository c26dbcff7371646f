//! Pre-underwriting readiness review.
//!
//! Not a pipeline stage: callers run it before handing a case to an
//! underwriter. Hard checks on the case data run first and always win over
//! the model's opinion. When the model cannot be reached the caller still
//! gets a readiness payload telling them to check by hand.

use async_trait::async_trait;
use bondpath_core::facts::{is_present, number};
use bondpath_core::{facts_from_json, Facts};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use super::{AgentKind, CaseAgent};
use crate::gateway::{Field, FieldType, Gateway, InferenceError, ResponseSchema};
use crate::prompts::READINESS_PROMPT;

/// Fields an underwriter cannot work without.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "defendant_first_name",
    "defendant_last_name",
    "bond_amount",
    "jail_facility",
    "charges",
];

/// Confidence ceiling when any hard blocker was found.
pub const BLOCKED_CONFIDENCE_CAP: i64 = 40;

pub struct ReadinessAgent {
    gateway: Arc<Gateway>,
    schema: ResponseSchema,
}

impl ReadinessAgent {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            schema: Self::schema(),
        }
    }

    pub fn schema() -> ResponseSchema {
        ResponseSchema::new(
            "ReadinessOutput",
            vec![
                Field::required("ready_for_submission", FieldType::Boolean),
                Field::required("confidence_score", FieldType::Integer),
                Field::required("blockers", FieldType::list(FieldType::String)),
                Field::required("warnings", FieldType::list(FieldType::String)),
                Field::required("missing_fields", FieldType::list(FieldType::String)),
                Field::optional("quality_notes", FieldType::String),
            ],
        )
    }

    /// Required fields that are absent, blank or zero, in declaration order.
    pub fn missing_fields(case: &Facts) -> Vec<String> {
        REQUIRED_FIELDS
            .iter()
            .filter(|field| {
                !case
                    .get(**field)
                    .map(|v| is_present(v) && v.as_f64() != Some(0.0) && v != &JsonValue::Bool(false))
                    .unwrap_or(false)
            })
            .map(|field| field.to_string())
            .collect()
    }

    /// Deterministic blockers that hold regardless of the model.
    pub fn hard_blockers(case: &Facts, missing: &[String]) -> Vec<String> {
        let mut blockers = Vec::new();
        if !missing.is_empty() {
            blockers.push(format!("Missing basic info: {}", missing.join(", ")));
        }
        if number(case, "bond_amount").unwrap_or(0.0) <= 0.0 {
            blockers.push("Bond amount must be greater than 0".to_string());
        }
        blockers
    }

    /// Payload returned when the model could not be consulted.
    pub fn unavailable_payload(missing: &[String]) -> JsonValue {
        json!({
            "ready_for_submission": false,
            "confidence_score": 0,
            "blockers": ["AI Service Unavailable - Please check manually"],
            "warnings": [],
            "missing_fields": missing,
            "quality_notes": "Could not perform AI analysis."
        })
    }
}

/// Fold hard blockers into the model's assessment.
fn merge_hard_blockers(mut output: JsonValue, hard: &[String]) -> JsonValue {
    if hard.is_empty() {
        return output;
    }

    let mut blockers: Vec<String> = output["blockers"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for blocker in hard {
        if !blockers.contains(blocker) {
            blockers.push(blocker.clone());
        }
    }

    let confidence = output["confidence_score"]
        .as_i64()
        .unwrap_or(0)
        .min(BLOCKED_CONFIDENCE_CAP);

    output["blockers"] = json!(blockers);
    output["ready_for_submission"] = json!(false);
    output["confidence_score"] = json!(confidence);
    output
}

#[async_trait]
impl CaseAgent for ReadinessAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Readiness
    }

    /// `input`: the case data as a flat object.
    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
        let case = facts_from_json(input.clone());
        let missing = Self::missing_fields(&case);
        let hard = Self::hard_blockers(&case, &missing);

        let context = json!({ "case_data": input, "hard_blockers": hard });
        match self
            .gateway
            .invoke(READINESS_PROMPT, &self.schema, Some(&context))
            .await
        {
            Ok(output) => Ok(merge_hard_blockers(output, &hard)),
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind().as_str(), "Readiness review unavailable");
                Ok(Self::unavailable_payload(&missing))
            }
        }
    }
}
