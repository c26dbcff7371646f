//! Policy thresholds for the bail rules.
//!
//! Thresholds are configuration, not code: a deployment can widen the
//! jurisdiction allow-list or move the collateral tier without touching rule
//! logic. Policies are parsed from YAML the same way stored cases are parsed
//! from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

/// Thresholds consulted by the bail rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Largest bond the office will write
    pub max_bond_amount: f64,

    /// States the office is licensed in
    pub allowed_jurisdictions: Vec<String>,

    /// Minimum down payment as a fraction of the bond
    pub min_down_payment_ratio: f64,

    /// Monthly payment above this fraction of indemnitor income is flagged
    pub max_income_ratio: f64,

    /// Bonds above this amount need collateral proof
    pub collateral_threshold: f64,

    /// Documents required for every bond
    pub base_documents: Vec<String>,

    /// Extra document required above the collateral threshold
    pub collateral_document: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_bond_amount: 500_000.0,
            allowed_jurisdictions: vec!["TX".to_string()],
            min_down_payment_ratio: 0.05,
            max_income_ratio: 0.15,
            collateral_threshold: 50_000.0,
            base_documents: vec!["indemnitor_id".to_string(), "proof_of_income".to_string()],
            collateral_document: "collateral_proof".to_string(),
        }
    }
}

impl PolicyConfig {
    /// Parse a policy from a YAML string. Missing keys take defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let policy: PolicyConfig = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check thresholds are usable.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(self.max_bond_amount > 0.0) {
            return Err(PolicyError::Invalid(
                "max_bond_amount must be greater than 0".to_string(),
            ));
        }
        for (name, ratio) in [
            ("min_down_payment_ratio", self.min_down_payment_ratio),
            ("max_income_ratio", self.max_income_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PolicyError::Invalid(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.allowed_jurisdictions.is_empty() {
            return Err(PolicyError::Invalid(
                "allowed_jurisdictions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a jurisdiction code is on the allow-list.
    pub fn allows_jurisdiction(&self, code: &str) -> bool {
        self.allowed_jurisdictions.iter().any(|j| j == code)
    }
}
