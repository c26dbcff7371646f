//! # bondpath-core
//!
//! Deterministic case model and policy rule engine for BondPath.
//!
//! This crate answers the questions a bail-bond case must clear before any
//! human or AI assistant spends time on it:
//! - Does the case qualify at all?
//! - Are the proposed payment terms feasible?
//! - Is the document set complete for the bond tier?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same facts always produce the same `RuleResult`
//! 2. **No I/O**: No network, storage, or inference calls
//! 3. **Explicit registry**: Rules live in a `RuleEngine` value, never a global
//!
//! ## Example
//!
//! ```rust
//! use bondpath_core::{facts_from_json, PolicyConfig, RuleEngine};
//!
//! let engine = RuleEngine::with_bail_rules(&PolicyConfig::default());
//! let facts = facts_from_json(serde_json::json!({
//!     "bond_amount": 10000,
//!     "state_jurisdiction": "TX",
//! }));
//!
//! let result = engine.evaluate("qualification_check", &facts, None).unwrap();
//! assert!(result.passed);
//! ```

pub mod case;
pub mod facts;
pub mod identity;
pub mod policy;
pub mod rules;

// Re-export main types at crate root
pub use case::{CaseState, CaseStatus};
pub use facts::{facts_from_json, Facts};
pub use identity::DefendantIdentity;
pub use policy::{PolicyConfig, PolicyError};
pub use rules::{
    DocumentCompletenessRule, FinancialFeasibilityRule, QualificationRule, Rule, RuleEngine,
    RuleError, RuleResult, DOCUMENT_COMPLETENESS, FINANCIAL_FEASIBILITY, QUALIFICATION_CHECK,
};
