//! Qualification rule
//!
//! **Question**: Can this office write this bond at all?
//!
//! Checks the bond amount is positive and under the ceiling, and the
//! jurisdiction is one the office is licensed in.

use crate::facts::{number, text, Facts};
use crate::policy::PolicyConfig;

use super::{dollars, Rule, RuleResult};

/// Registry name of the qualification rule.
pub const QUALIFICATION_CHECK: &str = "qualification_check";

/// Basic qualification criteria.
pub struct QualificationRule {
    policy: PolicyConfig,
}

impl QualificationRule {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }
}

impl Default for QualificationRule {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl Rule for QualificationRule {
    fn name(&self) -> &str {
        QUALIFICATION_CHECK
    }

    fn description(&self) -> &str {
        "Checks if the case meets basic qualification criteria"
    }

    fn evaluate(&self, facts: &Facts, _context: Option<&Facts>) -> RuleResult {
        let mut blockers = Vec::new();

        // Missing or unreadable amounts count as zero
        let bond_amount = number(facts, "bond_amount").unwrap_or(0.0);
        let jurisdiction = text(facts, "state_jurisdiction").unwrap_or("");

        if bond_amount <= 0.0 {
            blockers.push("Bond amount must be greater than 0".to_string());
        }
        if bond_amount > self.policy.max_bond_amount {
            blockers.push(format!(
                "Bond amount {} exceeds limit of {}",
                dollars(bond_amount),
                dollars(self.policy.max_bond_amount)
            ));
        }

        if !self.policy.allows_jurisdiction(jurisdiction) {
            blockers.push(format!("Jurisdiction '{}' not supported", jurisdiction));
        }

        RuleResult::from_findings(self.name(), blockers, vec![])
            .with_metadata("bond_amount", bond_amount)
    }
}
