//! Pipeline stages and the graph that connects them.
//!
//! Each stage does one unit of work on the case and leaves exactly one
//! history line and one audit record behind. Assistant and lookup failures
//! are absorbed here and turned into blockers or history; only a missing
//! rule escapes, because that is a wiring bug rather than a case problem.

use bondpath_core::{
    CaseState, CaseStatus, DefendantIdentity, RuleEngine, RuleError, QUALIFICATION_CHECK,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

use crate::agents::CaseAgent;
use crate::dedup::DedupDetector;
use crate::store::AuditLogger;

/// Intent that sends a case straight to risk scoring.
pub const URGENT_INTENT: &str = "GET_OUT_TODAY";

/// A node in the stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Intake,
    Dedup,
    Decision,
    Risk,
    Explanation,
}

impl Stage {
    pub const ENTRY: Stage = Stage::Intake;

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Dedup => "dedup",
            Stage::Decision => "decision",
            Stage::Risk => "risk",
            Stage::Explanation => "explanation",
        }
    }

    /// Outgoing edge. `None` after the terminal stage.
    pub fn next(&self, state: &CaseState) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::Dedup),
            Stage::Dedup => Some(Stage::Decision),
            Stage::Decision => Some(route_after_decision(state)),
            Stage::Risk => Some(Stage::Explanation),
            Stage::Explanation => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one conditional edge: urgent or qualified cases get a risk score,
/// everything else goes straight to explanation.
pub fn route_after_decision(state: &CaseState) -> Stage {
    if state.fact_str("intent_signal") == Some(URGENT_INTENT) {
        return Stage::Risk;
    }
    if state.current_state == CaseStatus::Qualified {
        Stage::Risk
    } else {
        Stage::Explanation
    }
}

fn to_details<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or_default()
}

/// Collaborators the stages work with.
#[derive(Clone)]
pub(crate) struct StageRunner {
    pub intake: Arc<dyn CaseAgent>,
    pub risk: Arc<dyn CaseAgent>,
    pub explanation: Arc<dyn CaseAgent>,
    pub rules: Arc<RuleEngine>,
    pub dedup: DedupDetector,
    pub audit: AuditLogger,
}

impl StageRunner {
    pub async fn run(&self, stage: Stage, state: &mut CaseState) -> Result<(), RuleError> {
        match stage {
            Stage::Intake => self.intake(state).await,
            Stage::Dedup => self.dedup(state).await,
            Stage::Decision => self.decision(state).await?,
            Stage::Risk => self.risk(state).await,
            Stage::Explanation => self.explanation(state).await,
        }
        Ok(())
    }

    async fn intake(&self, state: &mut CaseState) {
        let raw_input = state
            .facts
            .get("raw_input")
            .filter(|v| bondpath_core::facts::is_present(v))
            .cloned();

        let Some(raw_input) = raw_input else {
            state.record("Intake skipped: no raw input");
            self.audit
                .log(&state.case_id, "INTAKE_SKIPPED", json!({}))
                .await;
            return;
        };

        match self.intake.run(&raw_input).await {
            Ok(output) => {
                if let Some(extracted) = output.as_object() {
                    for (key, value) in extracted {
                        state.facts.insert(key.clone(), value.clone());
                    }
                }
                state.agent_outputs.insert(Stage::Intake.as_str().to_string(), output.clone());
                state.record("Intake Agent ran");
                tracing::info!(case_id = %state.case_id, stage = "intake", "Intake extracted");
                self.audit
                    .log(&state.case_id, "INTAKE_PROCESSED", output)
                    .await;
            }
            Err(e) => {
                tracing::warn!(case_id = %state.case_id, stage = "intake", error = %e, "Intake failed");
                state.blockers.push(format!("Intake Error: {}", e));
                state.record(format!("Intake Agent Failed: {}", e));
                self.audit
                    .log(
                        &state.case_id,
                        "INTAKE_ERROR",
                        json!({ "error": e.to_string(), "kind": e.kind().as_str() }),
                    )
                    .await;
            }
        }
    }

    async fn dedup(&self, state: &mut CaseState) {
        let Some(identity) = DefendantIdentity::from_facts(&state.facts) else {
            state.record("Dedup skipped: no defendant identity");
            self.audit
                .log(&state.case_id, "DEDUP_SKIPPED", json!({}))
                .await;
            return;
        };

        match self.dedup.find_duplicate(&identity, &state.case_id).await {
            Ok(Some(found)) => {
                let data = found.to_fact();
                tracing::info!(
                    case_id = %state.case_id,
                    existing_case_id = %found.existing_case_id,
                    "Potential duplicate"
                );
                state.record(format!(
                    "Potential Duplicate Found: Case ID {} matches Defendant {}",
                    found.existing_case_id,
                    identity.full_name()
                ));
                state
                    .facts
                    .insert("potential_duplicate".to_string(), data.clone());
                self.audit
                    .log(&state.case_id, "DUPLICATE_DETECTED", data)
                    .await;
            }
            Ok(None) => {
                state.record("No duplicate found");
                self.audit
                    .log(
                        &state.case_id,
                        "DEDUP_CLEAR",
                        json!({
                            "first_name": identity.first_name,
                            "last_name": identity.last_name,
                        }),
                    )
                    .await;
            }
            Err(e) => {
                tracing::warn!(case_id = %state.case_id, stage = "dedup", error = %e, "Dedup failed");
                state.record(format!("Deduplication Check Failed: {}", e));
                self.audit
                    .log(&state.case_id, "DEDUP_ERROR", json!({ "error": e.to_string() }))
                    .await;
            }
        }
    }

    /// Runs `qualification_check` and moves the case to `QUALIFIED` or
    /// `BLOCKED`. Rule blockers are appended to the case's existing blockers
    /// rather than replacing them, so an earlier `Intake Error` stays visible.
    async fn decision(&self, state: &mut CaseState) -> Result<(), RuleError> {
        let result = self
            .rules
            .evaluate(QUALIFICATION_CHECK, &state.facts, Some(&state.derived_facts))?;
        let details = to_details(&result);

        if result.passed {
            state.current_state = CaseStatus::Qualified;
            state.next_actions = vec!["ASSIGN_ADVISOR".to_string()];
            state.record(format!(
                "Transition: {} -> {}",
                CaseStatus::Intake,
                CaseStatus::Qualified
            ));
            tracing::info!(case_id = %state.case_id, stage = "decision", "Case qualified");
            self.audit
                .log(&state.case_id, "CASE_QUALIFIED", details)
                .await;
        } else {
            state.blockers.extend(result.blockers.iter().cloned());
            state.record(format!("Blocked at {}", state.current_state));
            tracing::info!(
                case_id = %state.case_id,
                stage = "decision",
                blockers = result.blockers.len(),
                "Qualification failed"
            );
            self.audit
                .log(&state.case_id, "QUALIFICATION_FAILED", details)
                .await;
        }

        state
            .rule_results
            .insert(QUALIFICATION_CHECK.to_string(), result);
        Ok(())
    }

    async fn risk(&self, state: &mut CaseState) {
        let facts = JsonValue::Object(state.facts.clone());
        match self.risk.run(&facts).await {
            Ok(output) => {
                for key in ["risk_score", "risk_tier"] {
                    if let Some(value) = output.get(key) {
                        state.derived_facts.insert(key.to_string(), value.clone());
                    }
                }
                state.agent_outputs.insert(Stage::Risk.as_str().to_string(), output.clone());
                state.record("Risk Agent ran");
                tracing::info!(
                    case_id = %state.case_id,
                    stage = "risk",
                    risk_score = ?output.get("risk_score"),
                    "Risk assessed"
                );
                self.audit.log(&state.case_id, "RISK_ASSESSED", output).await;
            }
            Err(e) => {
                tracing::warn!(case_id = %state.case_id, stage = "risk", error = %e, "Risk agent failed");
                state.record(format!("Risk Agent Failed: {}", e));
                self.audit
                    .log(
                        &state.case_id,
                        "RISK_AGENT_ERROR",
                        json!({ "error": e.to_string(), "kind": e.kind().as_str() }),
                    )
                    .await;
            }
        }
    }

    async fn explanation(&self, state: &mut CaseState) {
        let context = json!({
            "current_state": state.current_state,
            "facts": state.facts,
            "rule_results": state.rule_results,
            "risk_score": state.agent_outputs.get(Stage::Risk.as_str()).cloned().unwrap_or_else(|| json!({})),
            "blockers": state.blockers,
        });

        match self.explanation.run(&context).await {
            Ok(output) => {
                let summary = output.get("summary").cloned().unwrap_or_default();
                state
                    .agent_outputs
                    .insert(Stage::Explanation.as_str().to_string(), output);
                state.record("Explanation Agent ran");
                tracing::info!(case_id = %state.case_id, stage = "explanation", "Explanation generated");
                self.audit
                    .log(
                        &state.case_id,
                        "EXPLANATION_GENERATED",
                        json!({ "summary": summary }),
                    )
                    .await;
            }
            Err(e) => {
                tracing::warn!(case_id = %state.case_id, stage = "explanation", error = %e, "Explanation agent failed");
                state.record(format!("Explanation Agent Failed: {}", e));
                self.audit
                    .log(
                        &state.case_id,
                        "EXPLANATION_ERROR",
                        json!({ "error": e.to_string(), "kind": e.kind().as_str() }),
                    )
                    .await;
            }
        }
    }
}
