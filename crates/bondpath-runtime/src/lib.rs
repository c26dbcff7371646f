//! # bondpath-runtime
//!
//! Case decision pipeline for BondPath.
//!
//! This crate drives a case through the stage graph:
//!
//! ```text
//! Intake -> Dedup -> Decision -+-> Risk -> Explanation
//!                              +---------> Explanation
//! ```
//!
//! Qualification itself is deterministic and lives in `bondpath-core`. The
//! stages around it call AI agents through a [`Gateway`] that retries
//! rate-limited calls with exponential backoff and falls back to a secondary
//! provider.
//!
//! ## Failure Model
//!
//! - Agent failures are recorded as history lines and never abort a run
//! - Audit writes are best effort
//! - Only a broken run contract returns an error, with the submitted case
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bondpath_runtime::{
//!     InMemoryCaseStore, MemoryAuditSink, Orchestrator, OrchestratorBuilder, ProviderRegistry,
//!     RuntimeConfig,
//! };
//!
//! let config = RuntimeConfig::from_yaml_file("bondpath.yaml")?;
//! let orchestrator = OrchestratorBuilder::from_config(&config, &ProviderRegistry::with_defaults())?
//!     .store(Arc::new(InMemoryCaseStore::new()))
//!     .audit(Arc::new(MemoryAuditSink::new()))
//!     .build()?;
//!
//! let case = orchestrator.run_pipeline(case).await?;
//! println!("{}: {:?}", case.current_state, case.blockers);
//! ```

pub mod agents;
pub mod config;
pub mod dedup;
pub mod gateway;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod stages;
pub mod store;
pub mod telemetry;

pub use agents::{AgentKind, CaseAgent, DocumentVerificationAgent, ReadinessAgent};
pub use config::{GatewayConfig, ProviderSettings, RuntimeConfig};
pub use dedup::{DedupDetector, DedupError, DuplicateMatch};
pub use gateway::{
    Gateway, InferenceError, InferenceErrorKind, InvocationRequest, ResponseSchema, RetryPolicy,
};
pub use orchestrator::{BuildError, Orchestrator, OrchestratorBuilder, OrchestratorError};
pub use providers::{
    BinaryFetcher, CompletionConfig, LlmProvider, ProviderError, ProviderRegistry,
};
pub use stages::{Stage, URGENT_INTENT};
pub use store::{
    AuditLogger, AuditRecord, AuditSink, CaseRecord, CaseStore, InMemoryCaseStore,
    MemoryAuditSink, StoreError,
};
