//! Policy rules and the registry that evaluates them.
//!
//! Each rule answers one question about a case:
//! - Qualification: can this office write this bond at all?
//! - Financial feasibility: are the payment terms workable?
//! - Document completeness: is the paperwork there for this bond tier?
//!
//! Rules are pure: identical facts and context give identical results.

mod documents;
mod financial;
mod qualification;

pub use documents::{DocumentCompletenessRule, DOCUMENT_COMPLETENESS};
pub use financial::{FinancialFeasibilityRule, FINANCIAL_FEASIBILITY};
pub use qualification::{QualificationRule, QUALIFICATION_CHECK};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::facts::Facts;
use crate::policy::PolicyConfig;

/// Errors from the rule registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The registry has no rule with this name. A misconfigured registry,
    /// not a data condition.
    #[error("Rule '{0}' not registered")]
    UnknownRule(String),
}

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Name of the rule that produced this result
    pub rule_name: String,

    /// True when there are no blockers
    pub passed: bool,

    /// Hard reasons the case cannot proceed
    #[serde(default)]
    pub blockers: Vec<String>,

    /// Soft concerns for a human to review
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Computed values worth keeping next to the verdict
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

impl RuleResult {
    /// Build a result whose pass/fail follows from the blockers.
    pub fn from_findings(
        rule_name: impl Into<String>,
        blockers: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            passed: blockers.is_empty(),
            blockers,
            warnings,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A named, versioned policy check over case facts.
///
/// Implementations must be stateless and deterministic.
pub trait Rule: Send + Sync {
    /// Registry key, e.g. `"qualification_check"`.
    fn name(&self) -> &str;

    /// Version of the rule logic, recorded alongside decisions.
    fn version(&self) -> &str {
        "1.0"
    }

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Evaluate the rule.
    fn evaluate(&self, facts: &Facts, context: Option<&Facts>) -> RuleResult;
}

/// Registry of rules, keyed by name.
///
/// Construct one at startup and share it behind an `Arc`. Evaluation takes
/// `&self`, so a registry is safe to use from concurrent pipeline runs.
#[derive(Default)]
pub struct RuleEngine {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleEngine {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the standard bail rules for a policy.
    pub fn with_bail_rules(policy: &PolicyConfig) -> Self {
        let mut engine = Self::new();
        engine.register(Arc::new(QualificationRule::new(policy.clone())));
        engine.register(Arc::new(FinancialFeasibilityRule::new(policy.clone())));
        engine.register(Arc::new(DocumentCompletenessRule::new(policy.clone())));
        engine
    }

    /// Register a rule.
    ///
    /// If a rule with the same name already exists, it is replaced.
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        let name = rule.name().to_string();
        if let Some(previous) = self.rules.insert(name.clone(), rule) {
            tracing::warn!(
                rule = %name,
                replaced_version = previous.version(),
                "Rule re-registered; last registration wins"
            );
        }
    }

    /// Evaluate a single rule by name.
    pub fn evaluate(
        &self,
        name: &str,
        facts: &Facts,
        context: Option<&Facts>,
    ) -> Result<RuleResult, RuleError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| RuleError::UnknownRule(name.to_string()))?;

        let result = rule.evaluate(facts, context);
        tracing::debug!(
            rule = name,
            version = rule.version(),
            passed = result.passed,
            blockers = result.blockers.len(),
            warnings = result.warnings.len(),
            "Rule evaluated"
        );
        Ok(result)
    }

    /// Evaluate every registered rule.
    pub fn evaluate_all(
        &self,
        facts: &Facts,
        context: Option<&Facts>,
    ) -> BTreeMap<String, RuleResult> {
        self.rules
            .iter()
            .map(|(name, rule)| (name.clone(), rule.evaluate(facts, context)))
            .collect()
    }

    /// Check if a rule is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Get a registered rule.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(name)
    }

    /// List registered rule names.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Format a dollar amount the way rule messages cite money.
pub(crate) fn dollars(amount: f64) -> String {
    format!("${:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::facts_from_json;
    use serde_json::json;

    struct FixedRule {
        name: &'static str,
        version: &'static str,
        pass: bool,
    }

    impl Rule for FixedRule {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            self.version
        }

        fn description(&self) -> &str {
            "Always returns the configured verdict"
        }

        fn evaluate(&self, _facts: &Facts, _context: Option<&Facts>) -> RuleResult {
            let blockers = if self.pass {
                vec![]
            } else {
                vec![format!("{} v{} says no", self.name, self.version)]
            };
            RuleResult::from_findings(self.name, blockers, vec![])
        }
    }

    #[test]
    fn test_unknown_rule_fails() {
        let engine = RuleEngine::new();
        let result = engine.evaluate("nope", &Facts::new(), None);
        assert_eq!(result, Err(RuleError::UnknownRule("nope".to_string())));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Rule 'nope' not registered"
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(FixedRule { name: "gate", version: "1.0", pass: true }));
        engine.register(Arc::new(FixedRule { name: "gate", version: "2.0", pass: false }));

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get("gate").unwrap().version(), "2.0");

        let result = engine.evaluate("gate", &Facts::new(), None).unwrap();
        assert!(!result.passed);
        assert_eq!(result.blockers, vec!["gate v2.0 says no"]);
    }

    #[test]
    fn test_evaluate_all_covers_every_rule() {
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(FixedRule { name: "b", version: "1.0", pass: false }));
        engine.register(Arc::new(FixedRule { name: "a", version: "1.0", pass: true }));

        let results = engine.evaluate_all(&Facts::new(), None);
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(results["a"].passed);
        assert!(!results["b"].passed);
    }

    #[test]
    fn test_bail_rules_registered() {
        let engine = RuleEngine::with_bail_rules(&PolicyConfig::default());
        assert_eq!(
            engine.rule_names(),
            vec![DOCUMENT_COMPLETENESS, FINANCIAL_FEASIBILITY, QUALIFICATION_CHECK]
        );
    }

    #[test]
    fn test_independent_registries() {
        let full = RuleEngine::with_bail_rules(&PolicyConfig::default());
        let empty = RuleEngine::new();
        let facts = facts_from_json(json!({ "bond_amount": 1 }));

        assert!(full.evaluate(QUALIFICATION_CHECK, &facts, None).is_ok());
        assert!(empty.evaluate(QUALIFICATION_CHECK, &facts, None).is_err());
    }

    #[test]
    fn test_result_serialization() {
        let result = RuleResult::from_findings("x", vec![], vec!["careful".into()])
            .with_metadata("ratio", 0.2);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["warnings"][0], "careful");
        assert_eq!(value["metadata"]["ratio"], 0.2);
    }
}
