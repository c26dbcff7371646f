//! Case state carried through one pipeline run.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::facts::Facts;
use crate::rules::RuleResult;

/// Workflow position of a case.
///
/// The pipeline only ever moves a case from `Intake` to `Qualified`; the
/// later states are owned by advisor and underwriting flows outside this
/// crate and are modelled so stored cases round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    #[default]
    Intake,
    Qualified,
    AdvisorActive,
    UnderwritingReview,
    Approved,
}

impl CaseStatus {
    /// Wire name, e.g. `"INTAKE"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Intake => "INTAKE",
            CaseStatus::Qualified => "QUALIFIED",
            CaseStatus::AdvisorActive => "ADVISOR_ACTIVE",
            CaseStatus::UnderwritingReview => "UNDERWRITING_REVIEW",
            CaseStatus::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable record one pipeline run works on.
///
/// A `CaseState` is owned by exactly one run at a time. Stages mutate it in
/// place and in graph order, so `history` reads back in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseState {
    /// Identifier of the case in the external store
    pub case_id: String,

    /// Current workflow position
    pub current_state: CaseStatus,

    /// Known and extracted case information
    #[serde(default)]
    pub facts: Facts,

    /// Values computed from facts or assistant output
    #[serde(default)]
    pub derived_facts: Facts,

    /// Hard reasons the case cannot proceed
    #[serde(default)]
    pub blockers: Vec<String>,

    /// What a human should do next
    #[serde(default)]
    pub next_actions: Vec<String>,

    /// Assistant output keyed by stage name
    #[serde(default)]
    pub agent_outputs: BTreeMap<String, JsonValue>,

    /// Rule results keyed by rule name
    #[serde(default)]
    pub rule_results: BTreeMap<String, RuleResult>,

    /// Append-only log of what the pipeline did
    #[serde(default)]
    pub history: Vec<String>,
}

impl CaseState {
    /// Create a case at the pipeline entry point.
    pub fn new(case_id: impl Into<String>, facts: Facts) -> Self {
        Self {
            case_id: case_id.into(),
            current_state: CaseStatus::Intake,
            facts,
            derived_facts: Facts::new(),
            blockers: Vec::new(),
            next_actions: Vec::new(),
            agent_outputs: BTreeMap::new(),
            rule_results: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Read a fact as a string slice.
    pub fn fact_str(&self, key: &str) -> Option<&str> {
        self.facts.get(key).and_then(JsonValue::as_str)
    }

    /// Append a line to the history log.
    pub fn record(&mut self, line: impl Into<String>) {
        self.history.push(line.into());
    }

    /// Whether a stage has stored output.
    pub fn has_output(&self, stage: &str) -> bool {
        self.agent_outputs.contains_key(stage)
    }
}
