//! Case store and audit trail collaborators.
//!
//! The pipeline reads existing cases (for duplicate detection) and writes an
//! audit record per stage. Real deployments back these traits with a
//! database; the in-memory versions here serve tests and embedding.

use async_trait::async_trait;
use bondpath_core::{CaseState, CaseStatus, DefendantIdentity, Facts};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Actor recorded on audit entries written by the pipeline.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Errors from a case store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Case not found: {0}")]
    NotFound(String),

    #[error("Case already exists: {0}")]
    AlreadyExists(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A stored case as the store sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub state: CaseStatus,
    pub defendant_first_name: Option<String>,
    pub defendant_last_name: Option<String>,
    pub defendant_dob: Option<String>,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub version: u64,
}

impl CaseRecord {
    /// Record for a case at intake, with identity derived from its facts.
    pub fn from_state(state: &CaseState) -> Self {
        let mut record = Self {
            id: state.case_id.clone(),
            state: state.current_state,
            defendant_first_name: None,
            defendant_last_name: None,
            defendant_dob: None,
            facts: Facts::new(),
            version: 0,
        };
        record.apply(state);
        record
    }

    /// Copy the outcome of a pipeline run onto this record.
    pub fn apply(&mut self, state: &CaseState) {
        self.state = state.current_state;
        self.facts = state.facts.clone();
        if let Some(identity) = DefendantIdentity::from_facts(&state.facts) {
            self.defendant_first_name = Some(identity.first_name);
            self.defendant_last_name = Some(identity.last_name);
            self.defendant_dob = identity.dob;
        }
    }

    /// Identity on file, when both name parts are known.
    pub fn identity(&self) -> Option<DefendantIdentity> {
        match (&self.defendant_first_name, &self.defendant_last_name) {
            (Some(first), Some(last)) => Some(DefendantIdentity::new(
                first.clone(),
                last.clone(),
                self.defendant_dob.clone(),
            )),
            _ => None,
        }
    }
}

/// Persistent case storage.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get(&self, case_id: &str) -> Result<Option<CaseRecord>, StoreError>;

    /// Cases whose defendant name matches case-insensitively, excluding
    /// `exclude_id`. When `dob` is given only records with that DOB match.
    async fn list_by_identity(
        &self,
        first_name: &str,
        last_name: &str,
        exclude_id: &str,
        dob: Option<&str>,
    ) -> Result<Vec<CaseRecord>, StoreError>;

    async fn create(&self, record: CaseRecord) -> Result<CaseRecord, StoreError>;

    async fn update(&self, record: CaseRecord) -> Result<CaseRecord, StoreError>;
}

/// Case store backed by an ordered map. Identity lookups return cases in
/// creation order.
#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    records: RwLock<BTreeMap<String, (u64, CaseRecord)>>,
    sequence: RwLock<u64>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn get(&self, case_id: &str) -> Result<Option<CaseRecord>, StoreError> {
        Ok(self.records.read().get(case_id).map(|(_, r)| r.clone()))
    }

    async fn list_by_identity(
        &self,
        first_name: &str,
        last_name: &str,
        exclude_id: &str,
        dob: Option<&str>,
    ) -> Result<Vec<CaseRecord>, StoreError> {
        let wanted = DefendantIdentity::new(first_name, last_name, dob.map(str::to_string));
        let records = self.records.read();
        let mut matches: Vec<&(u64, CaseRecord)> = records
            .values()
            .filter(|(_, r)| r.id != exclude_id)
            .filter(|(_, r)| match (&r.defendant_first_name, &r.defendant_last_name) {
                (Some(first), Some(last)) => {
                    wanted.matches(first, last, r.defendant_dob.as_deref())
                }
                _ => false,
            })
            .collect();
        // Oldest first, so "first match" means the earliest case on file.
        matches.sort_by_key(|(seq, _)| *seq);
        Ok(matches.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn create(&self, record: CaseRecord) -> Result<CaseRecord, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        let seq = {
            let mut sequence = self.sequence.write();
            *sequence += 1;
            *sequence
        };
        let mut stored = record;
        stored.version = 1;
        records.insert(stored.id.clone(), (seq, stored.clone()));
        Ok(stored)
    }

    async fn update(&self, record: CaseRecord) -> Result<CaseRecord, StoreError> {
        let mut records = self.records.write();
        let Some((_, existing)) = records.get_mut(&record.id) else {
            return Err(StoreError::NotFound(record.id));
        };
        let version = existing.version + 1;
        *existing = CaseRecord { version, ..record };
        Ok(existing.clone())
    }
}

/// Errors from an audit sink.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit write failed: {0}")]
    WriteFailed(String),
}

/// One entry in a case's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub case_id: String,
    pub action: String,
    pub details: JsonValue,
    pub performed_by: String,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(
        &self,
        case_id: &str,
        action: &str,
        details: JsonValue,
        performed_by: &str,
    ) -> Result<(), AuditError>;
}

/// Audit sink that keeps records in memory, in write order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Actions recorded for one case, in order.
    pub fn actions_for(&self, case_id: &str) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter(|r| r.case_id == case_id)
            .map(|r| r.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log(
        &self,
        case_id: &str,
        action: &str,
        details: JsonValue,
        performed_by: &str,
    ) -> Result<(), AuditError> {
        self.records.write().push(AuditRecord {
            case_id: case_id.to_string(),
            action: action.to_string(),
            details,
            performed_by: performed_by.to_string(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

/// Fire-and-forget front for an [`AuditSink`].
///
/// A failed audit write is logged and dropped; it never changes the outcome
/// of the stage that produced it.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn log(&self, case_id: &str, action: &str, details: JsonValue) {
        if let Err(e) = self.sink.log(case_id, action, details, SYSTEM_ACTOR).await {
            tracing::error!(case_id, action, error = %e, "Failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bondpath_core::facts_from_json;
    use serde_json::json;

    fn record(id: &str, first: &str, last: &str, dob: Option<&str>) -> CaseRecord {
        CaseRecord {
            id: id.to_string(),
            state: CaseStatus::Intake,
            defendant_first_name: Some(first.to_string()),
            defendant_last_name: Some(last.to_string()),
            defendant_dob: dob.map(str::to_string),
            facts: Facts::new(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_create_and_update_versions() {
        let store = InMemoryCaseStore::new();
        let created = store.create(record("c1", "John", "Doe", None)).await.unwrap();
        assert_eq!(created.version, 1);

        let mut changed = created.clone();
        changed.state = CaseStatus::Qualified;
        let updated = store.update(changed).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(
            store.get("c1").await.unwrap().unwrap().state,
            CaseStatus::Qualified
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_and_update_unknown_rejected() {
        let store = InMemoryCaseStore::new();
        store.create(record("c1", "John", "Doe", None)).await.unwrap();
        assert!(matches!(
            store.create(record("c1", "A", "B", None)).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.update(record("c9", "A", "B", None)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_identity_filters() {
        let store = InMemoryCaseStore::new();
        store.create(record("c1", "John", "Doe", Some("1990-01-01"))).await.unwrap();
        store.create(record("c2", "JOHN", "doe", None)).await.unwrap();
        store.create(record("c3", "Jane", "Doe", None)).await.unwrap();

        let all = store.list_by_identity("john", "DOE", "c9", None).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["c1", "c2"]);

        let excluded = store.list_by_identity("john", "doe", "c1", None).await.unwrap();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].id, "c2");

        let by_dob = store
            .list_by_identity("john", "doe", "c9", Some("1990-01-01"))
            .await
            .unwrap();
        assert_eq!(by_dob.len(), 1);
        assert_eq!(by_dob[0].id, "c1");
    }

    #[tokio::test]
    async fn test_list_by_identity_folds_accented_names() {
        let store = InMemoryCaseStore::new();
        store.create(record("c1", "José", "Núñez", None)).await.unwrap();

        let found = store.list_by_identity("JOSÉ", "NÚÑEZ", "c9", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c1");
    }

    #[test]
    fn test_record_from_state_derives_identity() {
        let state = CaseState::new(
            "c1",
            facts_from_json(json!({ "defendant_name": "John Q Doe", "defendant_dob": "1990-01-01" })),
        );
        let record = CaseRecord::from_state(&state);
        assert_eq!(record.defendant_first_name.as_deref(), Some("John"));
        assert_eq!(record.defendant_last_name.as_deref(), Some("Doe"));
        assert_eq!(record.defendant_dob.as_deref(), Some("1990-01-01"));
        assert_eq!(record.facts["defendant_name"], "John Q Doe");
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn log(&self, _: &str, _: &str, _: JsonValue, _: &str) -> Result<(), AuditError> {
            Err(AuditError::WriteFailed("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_audit_logger_swallows_sink_errors() {
        AuditLogger::new(Arc::new(BrokenSink))
            .log("c1", "CASE_QUALIFIED", json!({}))
            .await;
    }

    #[tokio::test]
    async fn test_memory_sink_records_in_order() {
        let sink = Arc::new(MemoryAuditSink::new());
        let logger = AuditLogger::new(sink.clone());
        logger.log("c1", "INTAKE_SKIPPED", json!({})).await;
        logger.log("c2", "INTAKE_SKIPPED", json!({})).await;
        logger.log("c1", "DEDUP_CLEAR", json!({})).await;

        assert_eq!(sink.actions_for("c1"), vec!["INTAKE_SKIPPED", "DEDUP_CLEAR"]);
        assert!(sink.records().iter().all(|r| r.performed_by == SYSTEM_ACTOR));
    }
}
