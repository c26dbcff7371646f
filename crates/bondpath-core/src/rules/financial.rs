//! Financial feasibility rule
//!
//! **Question**: Can the indemnitor actually carry these payment terms?
//!
//! The down payment floor is a hard rule. The income ratio is a warning:
//! underwriters still write high-ratio bonds, they just look harder.

use crate::facts::{nested_number, number, Facts};
use crate::policy::PolicyConfig;

use super::{dollars, Rule, RuleResult};

/// Registry name of the financial feasibility rule.
pub const FINANCIAL_FEASIBILITY: &str = "financial_feasibility";

/// Down payment floor and payment-to-income check.
pub struct FinancialFeasibilityRule {
    policy: PolicyConfig,
}

impl FinancialFeasibilityRule {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }
}

impl Default for FinancialFeasibilityRule {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

/// Flat key first, then the nested shape stored cases use.
fn amount(facts: &Facts, flat: &str, outer: &str, inner: &str) -> f64 {
    number(facts, flat)
        .or_else(|| nested_number(facts, outer, inner))
        .unwrap_or(0.0)
}

impl Rule for FinancialFeasibilityRule {
    fn name(&self) -> &str {
        FINANCIAL_FEASIBILITY
    }

    fn description(&self) -> &str {
        "Checks if the proposed payment terms are financially feasible"
    }

    fn evaluate(&self, facts: &Facts, _context: Option<&Facts>) -> RuleResult {
        let mut blockers = Vec::new();
        let mut warnings = Vec::new();

        let bond_amount = number(facts, "bond_amount").unwrap_or(0.0);
        let down_payment = amount(facts, "down_payment", "financial", "down_payment");
        let monthly_payment = amount(facts, "monthly_payment", "financial", "monthly_payment");
        let income = amount(facts, "indemnitor_income", "indemnitor", "income");

        let min_down = bond_amount * self.policy.min_down_payment_ratio;
        if down_payment < min_down {
            blockers.push(format!(
                "Down payment {} is below minimum requirement of {} ({:.0}%)",
                dollars(down_payment),
                dollars(min_down),
                self.policy.min_down_payment_ratio * 100.0
            ));
        }

        let mut ratio = None;
        if income > 0.0 {
            let r = monthly_payment / income;
            if r > self.policy.max_income_ratio {
                warnings.push(format!(
                    "Monthly payment is {:.1}% of income (High Risk > {:.0}%)",
                    r * 100.0,
                    self.policy.max_income_ratio * 100.0
                ));
            }
            ratio = Some(r);
        }

        let mut result = RuleResult::from_findings(self.name(), blockers, warnings)
            .with_metadata("minimum_down_payment", min_down);
        if let Some(r) = ratio {
            result = result.with_metadata("income_ratio", r);
        }
        result
    }
}
