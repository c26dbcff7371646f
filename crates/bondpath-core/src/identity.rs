//! Defendant identity derived from case facts.

use serde::{Deserialize, Serialize};

use crate::facts::{nested_text, text, Facts};

/// Who a case is about, as far as duplicate detection is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefendantIdentity {
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<String>,
}

impl DefendantIdentity {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        dob: Option<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob,
        }
    }

    /// Derive an identity from facts.
    ///
    /// Explicit `defendant_first_name` / `defendant_last_name` win. Otherwise
    /// a combined `defendant_name` (or `defendant.name` from extraction) is
    /// split on whitespace: first token, last token. A single-token name has
    /// no last name and yields `None`.
    pub fn from_facts(facts: &Facts) -> Option<Self> {
        let combined = text(facts, "defendant_name").or_else(|| nested_text(facts, "defendant", "name"));
        let (split_first, split_last) = match combined {
            Some(name) => split_name(name),
            None => (None, None),
        };

        let first = text(facts, "defendant_first_name").or(split_first)?;
        let last = text(facts, "defendant_last_name").or(split_last)?;

        let dob = text(facts, "defendant_dob")
            .or_else(|| nested_text(facts, "defendant", "dob"))
            .map(str::to_string);

        Some(Self::new(first, last, dob))
    }

    /// Case-insensitive name comparison plus DOB when this identity has one.
    pub fn matches(&self, first_name: &str, last_name: &str, dob: Option<&str>) -> bool {
        if !same_name(&self.first_name, first_name) || !same_name(&self.last_name, last_name) {
            return false;
        }
        match &self.dob {
            Some(expected) => dob.map(str::trim) == Some(expected.as_str()),
            None => true,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Unicode-aware case-insensitive comparison, so `Núñez` matches `NÚÑEZ`.
fn same_name(a: &str, b: &str) -> bool {
    a.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .eq(b.trim().chars().flat_map(char::to_lowercase))
}

fn split_name(name: &str) -> (Option<&str>, Option<&str>) {
    let mut parts = name.split_whitespace();
    let first = parts.next();
    let last = parts.last();
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::facts_from_json;
    use serde_json::json;

    #[test]
    fn test_explicit_fields_win() {
        let facts = facts_from_json(json!({
            "defendant_first_name": "Jane",
            "defendant_last_name": "Roe",
            "defendant_name": "Someone Else",
            "defendant_dob": "1990-01-01"
        }));
        let id = DefendantIdentity::from_facts(&facts).unwrap();
        assert_eq!(id, DefendantIdentity::new("Jane", "Roe", Some("1990-01-01".into())));
    }

    #[test]
    fn test_combined_name_split() {
        let facts = facts_from_json(json!({ "defendant_name": "John  Q  Public" }));
        let id = DefendantIdentity::from_facts(&facts).unwrap();
        assert_eq!(id.first_name, "John");
        assert_eq!(id.last_name, "Public");
        assert_eq!(id.dob, None);
    }

    #[test]
    fn test_nested_extraction_shape() {
        let facts = facts_from_json(json!({
            "defendant": { "name": "Maria Lopez", "dob": "1985-05-05" }
        }));
        let id = DefendantIdentity::from_facts(&facts).unwrap();
        assert_eq!(id.full_name(), "Maria Lopez");
        assert_eq!(id.dob.as_deref(), Some("1985-05-05"));
    }

    #[test]
    fn test_single_token_has_no_identity() {
        let facts = facts_from_json(json!({ "defendant_name": "John" }));
        assert!(DefendantIdentity::from_facts(&facts).is_none());
        assert!(DefendantIdentity::from_facts(&Facts::new()).is_none());
    }

    #[test]
    fn test_matching_policy() {
        let no_dob = DefendantIdentity::new("John", "Doe", None);
        assert!(no_dob.matches("JOHN", "doe", None));
        assert!(no_dob.matches("john", "Doe", Some("2000-01-01")));
        assert!(!no_dob.matches("Jon", "Doe", None));

        let with_dob = DefendantIdentity::new("John", "Doe", Some("2000-01-01".into()));
        assert!(with_dob.matches("john", "doe", Some("2000-01-01")));
        assert!(!with_dob.matches("john", "doe", Some("2000-01-02")));
        assert!(!with_dob.matches("john", "doe", None));

        let accented = DefendantIdentity::new("José", "Núñez", None);
        assert!(accented.matches("JOSÉ", "NÚÑEZ", None));
        assert!(accented.matches("josé", "núñez", None));
        assert!(!accented.matches("JOSE", "NUNEZ", None));
    }
}
