//! Multimodal verification of uploaded documents.
//!
//! Not a pipeline stage: callers run it when a document is uploaded. The
//! document is fetched, attached to the call and compared against the case
//! data passed in.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use super::{AgentKind, CaseAgent};
use crate::gateway::{Field, FieldType, Gateway, InferenceError, InvocationRequest, ResponseSchema};
use crate::prompts::DOCUMENT_VERIFICATION_PROMPT;
use crate::providers::{Attachment, BinaryFetch};

pub struct DocumentVerificationAgent {
    gateway: Arc<Gateway>,
    fetcher: Arc<dyn BinaryFetch>,
    schema: ResponseSchema,
}

impl DocumentVerificationAgent {
    pub fn new(gateway: Arc<Gateway>, fetcher: Arc<dyn BinaryFetch>) -> Self {
        Self {
            gateway,
            fetcher,
            schema: Self::schema(),
        }
    }

    pub fn schema() -> ResponseSchema {
        ResponseSchema::new(
            "DocumentVerification",
            vec![
                Field::required("is_valid_document", FieldType::Boolean),
                Field::required("document_type_detected", FieldType::String),
                Field::required("extracted_data", FieldType::Map),
                Field::required("match_status", FieldType::String),
                Field::required("mismatches", FieldType::list(FieldType::String)),
                Field::required("confidence_score", FieldType::Integer),
            ],
        )
    }

    /// Payload returned when the document never reached the model.
    pub fn error_payload(reason: impl Into<String>) -> JsonValue {
        json!({
            "is_valid_document": false,
            "document_type_detected": "error",
            "extracted_data": {},
            "match_status": "ERROR",
            "mismatches": [reason.into()],
            "confidence_score": 0
        })
    }
}

#[async_trait]
impl CaseAgent for DocumentVerificationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::DocumentVerification
    }

    /// `input`: `{ "file_url" | "image_url": .., "case_data": {..}, "doc_type": .. }`.
    async fn run(&self, input: &JsonValue) -> Result<JsonValue, InferenceError> {
        let location = input
            .get("file_url")
            .or_else(|| input.get("image_url"))
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty());
        let Some(location) = location else {
            return Ok(Self::error_payload("No file URL provided"));
        };

        let doc_type = input
            .get("doc_type")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown");

        let fetched = match self.fetcher.fetch(location).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(location, error = %e, "Document fetch failed");
                return Ok(Self::error_payload(format!("Could not load file: {}", e)));
            }
        };

        let case_data = input.get("case_data").cloned().unwrap_or_else(|| json!({}));
        let request = InvocationRequest::new(DOCUMENT_VERIFICATION_PROMPT.replace("{doc_type}", doc_type))
            .with_context(case_data)
            .with_attachment(Attachment::new(fetched.media_type, fetched.data));

        self.gateway.invoke_request(&request, &self.schema).await
    }
}
