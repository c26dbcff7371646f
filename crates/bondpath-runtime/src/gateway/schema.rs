//! Structural response types for gateway calls.
//!
//! Every agent declares the shape it expects back as a [`ResponseSchema`].
//! The schema is rendered to JSON Schema twice over: once as the
//! structured-output contract sent to the provider, and once compiled with
//! `jsonschema` to validate whatever the provider actually returned.

use serde_json::{json, Map, Value as JsonValue};
use std::sync::{Arc, OnceLock};

/// Semantic type of a response field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Free-form object
    Map,
    /// Nested record with its own fields
    Record(Vec<Field>),
    /// Homogeneous list
    List(Box<FieldType>),
}

impl FieldType {
    pub fn list(item: FieldType) -> Self {
        FieldType::List(Box::new(item))
    }

    fn to_json_schema(&self) -> JsonValue {
        match self {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Number => json!({ "type": "number" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Map => json!({ "type": "object" }),
            FieldType::Record(fields) => record_schema(fields),
            FieldType::List(item) => json!({ "type": "array", "items": item.to_json_schema() }),
        }
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    /// Optional fields may be absent or `null`.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }

    fn to_json_schema(&self) -> JsonValue {
        let mut schema = self.ty.to_json_schema();
        if !self.required {
            if let Some(ty) = schema.get("type").cloned() {
                schema["type"] = json!([ty, "null"]);
            }
        }
        schema
    }
}

fn record_schema(fields: &[Field]) -> JsonValue {
    let properties: Map<String, JsonValue> = fields
        .iter()
        .map(|f| (f.name.clone(), f.to_json_schema()))
        .collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": true
    })
}

/// The expected top-level shape of a structured response.
#[derive(Clone)]
pub struct ResponseSchema {
    name: String,
    fields: Vec<Field>,
    compiled: Arc<OnceLock<Result<jsonschema::Validator, String>>>,
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            compiled: Arc::new(OnceLock::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// JSON Schema for this record.
    pub fn to_json_schema(&self) -> JsonValue {
        let mut schema = record_schema(&self.fields);
        schema["title"] = JsonValue::String(self.name.clone());
        schema
    }

    fn validator(&self) -> Result<&jsonschema::Validator, String> {
        self.compiled
            .get_or_init(|| {
                jsonschema::options()
                    .build(&self.to_json_schema())
                    .map_err(|e| format!("Failed to compile {} schema: {}", self.name, e))
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Check an already-parsed value, returning every violation.
    pub fn validate(&self, value: &JsonValue) -> Result<(), Vec<String>> {
        if !value.is_object() {
            return Err(vec![format!(
                "{} response must be a JSON object",
                self.name
            )]);
        }

        let validator = self.validator().map_err(|e| vec![e])?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parse provider text and validate it. Extra fields are kept.
    pub fn decode(&self, text: &str) -> Result<JsonValue, Vec<String>> {
        let value: JsonValue = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| vec![format!("Response is not valid JSON: {}", e)])?;
        self.validate(&value)?;
        Ok(value)
    }
}

/// Some models wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> ResponseSchema {
        ResponseSchema::new(
            "Person",
            vec![
                Field::required("name", FieldType::String),
                Field::optional("age", FieldType::Integer),
                Field::required(
                    "address",
                    FieldType::Record(vec![Field::required("city", FieldType::String)]),
                ),
                Field::required("tags", FieldType::list(FieldType::String)),
            ],
        )
    }

    #[test]
    fn test_decode_conforming() {
        let value = person()
            .decode(r#"{"name":"Ann","address":{"city":"Austin"},"tags":[],"extra":1}"#)
            .unwrap();
        assert_eq!(value["extra"], 1);
    }

    #[test]
    fn test_optional_accepts_null() {
        assert!(person()
            .decode(r#"{"name":"Ann","age":null,"address":{"city":"Austin"},"tags":["a"]}"#)
            .is_ok());
    }

    #[test]
    fn test_missing_and_mistyped_fields_reported() {
        let errors = person()
            .decode(r#"{"name":7,"address":{},"tags":"x"}"#)
            .unwrap_err();
        assert!(errors.len() >= 3, "{:?}", errors);
    }

    #[test]
    fn test_invalid_json_is_mismatch() {
        let errors = person().decode("not json").unwrap_err();
        assert!(errors[0].contains("not valid JSON"));
    }

    #[test]
    fn test_top_level_must_be_object() {
        let errors = person().decode("[1,2]").unwrap_err();
        assert!(errors[0].contains("must be a JSON object"));
    }

    #[test]
    fn test_code_fence_stripped() {
        let text = "```json\n{\"name\":\"A\",\"address\":{\"city\":\"B\"},\"tags\":[]}\n```";
        assert!(person().decode(text).is_ok());
    }

    #[test]
    fn test_rendered_schema() {
        let schema = person().to_json_schema();
        assert_eq!(schema["title"], "Person");
        assert_eq!(schema["required"], json!(["name", "address", "tags"]));
        assert_eq!(schema["properties"]["age"]["type"], json!(["integer", "null"]));
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
    }
}
