//! Document completeness rule
//!
//! **Question**: Is the paperwork underwriting needs on file?
//!
//! The required set grows with the bond tier: larger bonds need collateral
//! proof on top of the base documents.

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::facts::{number, Facts};
use crate::policy::PolicyConfig;

use super::{Rule, RuleResult};

/// Registry name of the document completeness rule.
pub const DOCUMENT_COMPLETENESS: &str = "document_completeness";

/// Required-document check.
pub struct DocumentCompletenessRule {
    policy: PolicyConfig,
}

impl DocumentCompletenessRule {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Documents required for a bond amount, in policy order.
    pub fn required_documents(&self, bond_amount: f64) -> Vec<&str> {
        let mut required: Vec<&str> = self.policy.base_documents.iter().map(String::as_str).collect();
        if bond_amount > self.policy.collateral_threshold {
            required.push(self.policy.collateral_document.as_str());
        }
        required
    }
}

impl Default for DocumentCompletenessRule {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

fn uploaded_types(facts: &Facts) -> BTreeSet<&str> {
    facts
        .get("documents")
        .and_then(JsonValue::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(|d| d.get("type").and_then(JsonValue::as_str))
                .collect()
        })
        .unwrap_or_default()
}

impl Rule for DocumentCompletenessRule {
    fn name(&self) -> &str {
        DOCUMENT_COMPLETENESS
    }

    fn description(&self) -> &str {
        "Checks if all required documents needed for underwriting are present"
    }

    fn evaluate(&self, facts: &Facts, _context: Option<&Facts>) -> RuleResult {
        let bond_amount = number(facts, "bond_amount").unwrap_or(0.0);
        let uploaded = uploaded_types(facts);

        let blockers = self
            .required_documents(bond_amount)
            .into_iter()
            .filter(|req| !uploaded.contains(req))
            .map(|req| format!("Missing required document: {}", req))
            .collect();

        RuleResult::from_findings(self.name(), blockers, vec![])
    }
}
