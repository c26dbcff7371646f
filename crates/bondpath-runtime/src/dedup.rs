//! Duplicate case detection.
//!
//! A match is informational: it is attached to the case facts and audited,
//! but qualification never consults it.

use bondpath_core::{CaseStatus, DefendantIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use thiserror::Error;

use crate::store::{CaseStore, StoreError};

/// Errors from duplicate lookup.
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Duplicate lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// An existing case that appears to be about the same defendant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub existing_case_id: String,
    pub existing_case_state: CaseStatus,
}

impl DuplicateMatch {
    /// Fact payload stored under `potential_duplicate`.
    pub fn to_fact(&self) -> JsonValue {
        json!({
            "is_duplicate": true,
            "existing_case_id": self.existing_case_id,
            "existing_case_state": self.existing_case_state,
        })
    }
}

/// Identity lookup against the case store.
#[derive(Clone)]
pub struct DedupDetector {
    store: Arc<dyn CaseStore>,
}

impl DedupDetector {
    pub fn new(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    /// First existing case matching `candidate`, other than `exclude_case_id`.
    ///
    /// Names match case-insensitively; the DOB must match too when the
    /// candidate has one. The store's pre-filter is re-checked here.
    pub async fn find_duplicate(
        &self,
        candidate: &DefendantIdentity,
        exclude_case_id: &str,
    ) -> Result<Option<DuplicateMatch>, DedupError> {
        let records = self
            .store
            .list_by_identity(
                &candidate.first_name,
                &candidate.last_name,
                exclude_case_id,
                candidate.dob.as_deref(),
            )
            .await?;

        let found = records.into_iter().find(|record| {
            record.id != exclude_case_id
                && record
                    .identity()
                    .map(|existing| {
                        candidate.matches(
                            &existing.first_name,
                            &existing.last_name,
                            existing.dob.as_deref(),
                        )
                    })
                    .unwrap_or(false)
        });

        Ok(found.map(|record| DuplicateMatch {
            existing_case_id: record.id,
            existing_case_state: record.state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CaseRecord, InMemoryCaseStore};
    use async_trait::async_trait;
    use bondpath_core::Facts;

    fn record(id: &str, first: &str, last: &str, dob: Option<&str>) -> CaseRecord {
        CaseRecord {
            id: id.to_string(),
            state: CaseStatus::Qualified,
            defendant_first_name: Some(first.to_string()),
            defendant_last_name: Some(last.to_string()),
            defendant_dob: dob.map(str::to_string),
            facts: Facts::new(),
            version: 0,
        }
    }

    async fn detector_with(records: Vec<CaseRecord>) -> DedupDetector {
        let store = Arc::new(InMemoryCaseStore::new());
        for r in records {
            store.create(r).await.unwrap();
        }
        DedupDetector::new(store)
    }

    #[tokio::test]
    async fn test_name_match_without_dob() {
        let detector = detector_with(vec![record("c1", "John", "Doe", None)]).await;
        let found = detector
            .find_duplicate(&DefendantIdentity::new("JOHN", "doe", None), "c2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.existing_case_id, "c1");
        assert_eq!(found.existing_case_state, CaseStatus::Qualified);
    }

    #[tokio::test]
    async fn test_candidate_dob_must_match() {
        let detector = detector_with(vec![
            record("c1", "John", "Doe", Some("1990-01-01")),
            record("c2", "John", "Doe", None),
        ])
        .await;
        let candidate = DefendantIdentity::new("John", "Doe", Some("1991-01-01".into()));
        assert!(detector.find_duplicate(&candidate, "c9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_own_case_excluded() {
        let detector = detector_with(vec![record("c1", "John", "Doe", None)]).await;
        let candidate = DefendantIdentity::new("John", "Doe", None);
        assert!(detector.find_duplicate(&candidate, "c1").await.unwrap().is_none());
    }

    /// Returns everything it holds, ignoring the filter arguments.
    struct LooseStore(Vec<CaseRecord>);

    #[async_trait]
    impl CaseStore for LooseStore {
        async fn get(&self, _: &str) -> Result<Option<CaseRecord>, StoreError> {
            Ok(None)
        }
        async fn list_by_identity(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<Vec<CaseRecord>, StoreError> {
            Ok(self.0.clone())
        }
        async fn create(&self, r: CaseRecord) -> Result<CaseRecord, StoreError> {
            Ok(r)
        }
        async fn update(&self, r: CaseRecord) -> Result<CaseRecord, StoreError> {
            Ok(r)
        }
    }

    #[tokio::test]
    async fn test_loose_store_cannot_widen_policy() {
        let detector = DedupDetector::new(Arc::new(LooseStore(vec![
            record("c1", "Jane", "Doe", None),
            record("c2", "John", "Doe", Some("1990-01-01")),
            record("c3", "John", "Doe", Some("1985-05-05")),
        ])));
        let candidate = DefendantIdentity::new("John", "Doe", Some("1985-05-05".into()));
        let found = detector.find_duplicate(&candidate, "c9").await.unwrap().unwrap();
        assert_eq!(found.existing_case_id, "c3");
    }

    #[test]
    fn test_fact_payload() {
        let m = DuplicateMatch {
            existing_case_id: "c1".into(),
            existing_case_state: CaseStatus::Intake,
        };
        assert_eq!(
            m.to_fact(),
            json!({ "is_duplicate": true, "existing_case_id": "c1", "existing_case_state": "INTAKE" })
        );
    }
}
