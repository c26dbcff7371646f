//! Pipeline orchestrator.
//!
//! Walks the stage graph for one case at a time:
//! - Intake -> Dedup -> Decision, then Risk (urgent or qualified) or straight
//!   to Explanation
//! - Stages run strictly in order on the invoking task
//! - Stage failures are absorbed by the stage; only contract violations abort
//!
//! Independent cases can be run concurrently with [`Orchestrator::run_many`];
//! each run owns its own [`CaseState`].

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use bondpath_core::{CaseState, CaseStatus, RuleEngine, RuleError, QUALIFICATION_CHECK};

use crate::agents::{AgentKind, CaseAgent, ExplanationAgent, IntakeAgent, RiskAgent};
use crate::config::RuntimeConfig;
use crate::dedup::DedupDetector;
use crate::gateway::Gateway;
use crate::providers::{ProviderError, ProviderRegistry};
use crate::stages::{Stage, StageRunner};
use crate::store::{AuditLogger, AuditSink, CaseStore};

/// A run that could not be carried out.
///
/// Both variants hand back the case exactly as it was submitted so it can be
/// triaged manually.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Pipeline contract violated for case '{}': {reason}", .state.case_id)]
    Contract {
        reason: String,
        state: Box<CaseState>,
    },

    #[error("Pipeline aborted for case '{}': {source}", .state.case_id)]
    Rule {
        #[source]
        source: RuleError,
        state: Box<CaseState>,
    },
}

impl OrchestratorError {
    /// The case as submitted, before any stage ran.
    pub fn pre_run_state(&self) -> &CaseState {
        match self {
            OrchestratorError::Contract { state, .. } | OrchestratorError::Rule { state, .. } => {
                state
            }
        }
    }

    pub fn into_pre_run_state(self) -> CaseState {
        match self {
            OrchestratorError::Contract { state, .. } | OrchestratorError::Rule { state, .. } => {
                *state
            }
        }
    }
}

/// Errors from assembling an orchestrator.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Orchestrator requires a {0}")]
    Missing(&'static str),

    #[error("No {0} agent registered and no gateway to build one")]
    MissingAgent(AgentKind),
}

/// Runs cases through the stage graph.
pub struct Orchestrator {
    stages: StageRunner,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("rules", &self.stages.rules.rule_names())
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run one case from intake to explanation.
    ///
    /// # Execution Flow
    /// 1. Check the run contract (case id, entry state, qualification rule)
    /// 2. Walk the graph from [`Stage::ENTRY`] until the terminal stage
    /// 3. Return the mutated case
    pub async fn run_pipeline(&self, state: CaseState) -> Result<CaseState, OrchestratorError> {
        if let Err(reason) = self.check_contract(&state) {
            tracing::error!(case_id = %state.case_id, %reason, "Pipeline contract violated");
            return Err(OrchestratorError::Contract {
                reason,
                state: Box::new(state),
            });
        }

        let snapshot = state.clone();
        let mut state = state;
        let mut next = Some(Stage::ENTRY);

        while let Some(stage) = next {
            tracing::debug!(case_id = %state.case_id, %stage, "Running stage");
            if let Err(source) = self.stages.run(stage, &mut state).await {
                tracing::error!(case_id = %state.case_id, %stage, error = %source, "Pipeline aborted");
                return Err(OrchestratorError::Rule {
                    source,
                    state: Box::new(snapshot),
                });
            }

            next = stage.next(&state);
            if let (Stage::Decision, Some(to)) = (stage, next) {
                tracing::debug!(case_id = %state.case_id, from = %stage, %to, "Routed");
            }
        }

        tracing::info!(
            case_id = %state.case_id,
            state = %state.current_state,
            blockers = state.blockers.len(),
            "Pipeline complete"
        );
        Ok(state)
    }

    /// Run independent cases concurrently. Results keep input order.
    pub async fn run_many(
        &self,
        states: Vec<CaseState>,
    ) -> Vec<Result<CaseState, OrchestratorError>> {
        futures::future::join_all(states.into_iter().map(|s| self.run_pipeline(s))).await
    }

    fn check_contract(&self, state: &CaseState) -> Result<(), String> {
        if state.case_id.trim().is_empty() {
            return Err("case_id must not be empty".to_string());
        }
        if state.current_state != CaseStatus::Intake {
            return Err(format!(
                "case must enter the pipeline at {}, found {}",
                CaseStatus::Intake,
                state.current_state
            ));
        }
        if !self.stages.rules.contains(QUALIFICATION_CHECK) {
            return Err(format!("rule '{}' is not registered", QUALIFICATION_CHECK));
        }
        Ok(())
    }
}

/// Builder for [`Orchestrator`].
///
/// Agents not registered explicitly are built over the gateway.
#[derive(Default)]
pub struct OrchestratorBuilder {
    gateway: Option<Arc<Gateway>>,
    rules: Option<Arc<RuleEngine>>,
    store: Option<Arc<dyn CaseStore>>,
    audit: Option<Arc<dyn AuditSink>>,
    agents: BTreeMap<AgentKind, Arc<dyn CaseAgent>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway and bail rules from runtime configuration.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, ProviderError> {
        let gateway = Gateway::from_config(&config.gateway, registry)?;
        Ok(Self::new()
            .gateway(Arc::new(gateway))
            .rules(Arc::new(RuleEngine::with_bail_rules(&config.policy))))
    }

    pub fn gateway(mut self, gateway: Arc<Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn rules(mut self, rules: Arc<RuleEngine>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn store(mut self, store: Arc<dyn CaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Register an agent, replacing the default for its kind.
    pub fn agent(mut self, agent: Arc<dyn CaseAgent>) -> Self {
        self.agents.insert(agent.kind(), agent);
        self
    }

    pub fn build(mut self) -> Result<Orchestrator, BuildError> {
        let rules = self.rules.take().ok_or(BuildError::Missing("rule engine"))?;
        let store = self.store.take().ok_or(BuildError::Missing("case store"))?;
        let audit = self.audit.take().ok_or(BuildError::Missing("audit sink"))?;

        Ok(Orchestrator {
            stages: StageRunner {
                intake: self.agent_for(AgentKind::Intake)?,
                risk: self.agent_for(AgentKind::Risk)?,
                explanation: self.agent_for(AgentKind::Explanation)?,
                rules,
                dedup: DedupDetector::new(store),
                audit: AuditLogger::new(audit),
            },
        })
    }

    fn agent_for(&mut self, kind: AgentKind) -> Result<Arc<dyn CaseAgent>, BuildError> {
        if let Some(agent) = self.agents.remove(&kind) {
            return Ok(agent);
        }
        let gateway = self
            .gateway
            .clone()
            .ok_or(BuildError::MissingAgent(kind))?;
        let agent: Arc<dyn CaseAgent> = match kind {
            AgentKind::Intake => Arc::new(IntakeAgent::new(gateway)),
            AgentKind::Risk => Arc::new(RiskAgent::new(gateway)),
            AgentKind::Explanation => Arc::new(ExplanationAgent::new(gateway)),
            AgentKind::DocumentVerification | AgentKind::Readiness => {
                return Err(BuildError::MissingAgent(kind))
            }
        };
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedAgent;
    use crate::gateway::testing::ScriptedProvider;
    use crate::providers::CompletionConfig;
    use crate::store::{InMemoryCaseStore, MemoryAuditSink};
    use bondpath_core::{facts_from_json, PolicyConfig};
    use serde_json::json;

    fn scripted_builder(sink: Arc<MemoryAuditSink>) -> OrchestratorBuilder {
        Orchestrator::builder()
            .rules(Arc::new(RuleEngine::with_bail_rules(&PolicyConfig::default())))
            .store(Arc::new(InMemoryCaseStore::new()))
            .audit(sink)
            .agent(ScriptedAgent::returning(AgentKind::Intake, json!({})))
            .agent(ScriptedAgent::returning(AgentKind::Risk, json!({ "risk_score": 20, "risk_tier": "Low Risk" })))
            .agent(ScriptedAgent::returning(AgentKind::Explanation, json!({ "summary": "done" })))
    }

    #[test]
    fn test_build_requires_collaborators() {
        assert!(matches!(
            Orchestrator::builder().build(),
            Err(BuildError::Missing("rule engine"))
        ));

        let missing_agent = Orchestrator::builder()
            .rules(Arc::new(RuleEngine::new()))
            .store(Arc::new(InMemoryCaseStore::new()))
            .audit(Arc::new(MemoryAuditSink::new()))
            .build();
        assert!(matches!(
            missing_agent,
            Err(BuildError::MissingAgent(AgentKind::Intake))
        ));
    }

    #[test]
    fn test_default_agents_from_gateway() {
        let provider = ScriptedProvider::new("primary", vec![]);
        let orchestrator = Orchestrator::builder()
            .gateway(Arc::new(Gateway::new(provider, CompletionConfig::default())))
            .rules(Arc::new(RuleEngine::with_bail_rules(&PolicyConfig::default())))
            .store(Arc::new(InMemoryCaseStore::new()))
            .audit(Arc::new(MemoryAuditSink::new()))
            .build()
            .unwrap();
        assert_eq!(orchestrator.stages.intake.kind(), AgentKind::Intake);
        assert_eq!(orchestrator.stages.risk.kind(), AgentKind::Risk);
    }

    #[tokio::test]
    async fn test_wrong_entry_state_is_contract_error() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = scripted_builder(sink.clone()).build().unwrap();

        let mut input = CaseState::new("c1", facts_from_json(json!({ "bond_amount": 100 })));
        input.current_state = CaseStatus::Qualified;

        let err = orchestrator.run_pipeline(input.clone()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Contract { .. }));
        assert_eq!(err.into_pre_run_state(), input);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_missing_qualification_rule_is_contract_error() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = scripted_builder(sink)
            .rules(Arc::new(RuleEngine::new()))
            .build()
            .unwrap();

        let input = CaseState::new("c1", facts_from_json(json!({ "bond_amount": 100 })));
        let err = orchestrator.run_pipeline(input.clone()).await.unwrap_err();
        assert!(err.to_string().contains("qualification_check"));
        assert_eq!(err.pre_run_state(), &input);
    }

    #[tokio::test]
    async fn test_urgent_intent_runs_risk_even_when_blocked() {
        let sink = Arc::new(MemoryAuditSink::new());
        let orchestrator = scripted_builder(sink.clone()).build().unwrap();

        let input = CaseState::new(
            "c1",
            facts_from_json(json!({
                "bond_amount": 0,
                "state_jurisdiction": "TX",
                "intent_signal": "GET_OUT_TODAY"
            })),
        );
        let out = orchestrator.run_pipeline(input).await.unwrap();

        assert_eq!(out.current_state, CaseStatus::Intake);
        assert!(out.has_output("risk"));
        assert!(out.has_output("explanation"));
        assert_eq!(
            sink.actions_for("c1"),
            vec![
                "INTAKE_SKIPPED",
                "DEDUP_SKIPPED",
                "QUALIFICATION_FAILED",
                "RISK_ASSESSED",
                "EXPLANATION_GENERATED"
            ]
        );
        assert_eq!(out.history.len(), 5);
    }

    #[tokio::test]
    async fn test_run_many_keeps_order() {
        let orchestrator = scripted_builder(Arc::new(MemoryAuditSink::new()))
            .build()
            .unwrap();

        let results = orchestrator
            .run_many(vec![
                CaseState::new("a", facts_from_json(json!({ "bond_amount": 100, "state_jurisdiction": "TX" }))),
                CaseState::new("", facts_from_json(json!({}))),
                CaseState::new("c", facts_from_json(json!({ "bond_amount": 0 }))),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().current_state, CaseStatus::Qualified);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().case_id, "c");
    }
}
