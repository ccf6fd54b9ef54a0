//! Per-field evaluation results.
//!
//! A [`FieldResult`] is the outcome of comparing one field (or one line-item
//! subfield) once. Its score is tied to its weight: a correct field scores
//! exactly its weight, an incorrect one scores zero. The invariants are
//! checked on construction and on deserialization.

use crate::analysis::FieldAnalysis;
use crate::error::{AccuracyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of evaluating a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldResult")]
pub struct FieldResult {
    field_name: String,
    expected_value: Value,
    actual_value: Value,
    weight: f64,
    score: f64,
    is_correct: bool,
    item_index: Option<usize>,
    details: Option<Map<String, Value>>,
}

/// Unvalidated wire form; converted through [`FieldResult::new`].
#[derive(Deserialize)]
struct RawFieldResult {
    field_name: String,
    #[serde(default)]
    expected_value: Value,
    #[serde(default)]
    actual_value: Value,
    weight: f64,
    score: f64,
    is_correct: bool,
    #[serde(default)]
    item_index: Option<usize>,
    #[serde(default)]
    details: Option<Map<String, Value>>,
}

impl TryFrom<RawFieldResult> for FieldResult {
    type Error = AccuracyError;

    fn try_from(raw: RawFieldResult) -> Result<Self> {
        let result = FieldResult::new(
            raw.field_name,
            raw.expected_value,
            raw.actual_value,
            raw.weight,
            raw.score,
            raw.is_correct,
        )?;
        let result = match raw.item_index {
            Some(index) => result.with_item_index(index),
            None => result,
        };
        Ok(match raw.details {
            Some(details) => result.with_details(details),
            None => result,
        })
    }
}

impl FieldResult {
    /// Create a result, validating the score/weight invariants.
    pub fn new(
        field_name: impl Into<String>,
        expected_value: Value,
        actual_value: Value,
        weight: f64,
        score: f64,
        is_correct: bool,
    ) -> Result<Self> {
        let field_name = field_name.into();

        if !(weight >= 0.0) || !weight.is_finite() {
            return Err(AccuracyError::NegativeWeight {
                field: field_name,
                weight,
            });
        }
        if !(score >= 0.0) {
            return Err(AccuracyError::invalid_result(
                &field_name,
                format!("score must be non-negative, got {score}"),
            ));
        }
        if is_correct && score != weight {
            return Err(AccuracyError::invalid_result(
                &field_name,
                format!("a correct field must score its weight ({weight}), got {score}"),
            ));
        }
        if !is_correct && score != 0.0 {
            return Err(AccuracyError::invalid_result(
                &field_name,
                format!("an incorrect field must score 0, got {score}"),
            ));
        }

        Ok(Self {
            field_name,
            expected_value,
            actual_value,
            weight,
            score,
            is_correct,
            item_index: None,
            details: None,
        })
    }

    /// A correct result: score equals weight.
    pub fn correct(
        field_name: impl Into<String>,
        expected_value: Value,
        actual_value: Value,
        weight: f64,
    ) -> Result<Self> {
        Self::new(field_name, expected_value, actual_value, weight, weight, true)
    }

    /// An incorrect result: score is zero.
    pub fn incorrect(
        field_name: impl Into<String>,
        expected_value: Value,
        actual_value: Value,
        weight: f64,
    ) -> Result<Self> {
        Self::new(field_name, expected_value, actual_value, weight, 0.0, false)
    }

    /// Build a correct or incorrect result from a match decision.
    pub fn from_match(
        field_name: impl Into<String>,
        expected_value: Value,
        actual_value: Value,
        weight: f64,
        matched: bool,
    ) -> Result<Self> {
        if matched {
            Self::correct(field_name, expected_value, actual_value, weight)
        } else {
            Self::incorrect(field_name, expected_value, actual_value, weight)
        }
    }

    /// Tag the result with the line item it belongs to.
    pub fn with_item_index(mut self, index: usize) -> Self {
        self.item_index = Some(index);
        self
    }

    /// Attach auxiliary data. Never affects scoring.
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn expected_value(&self) -> &Value {
        &self.expected_value
    }

    pub fn actual_value(&self) -> &Value {
        &self.actual_value
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn item_index(&self) -> Option<usize> {
        self.item_index
    }

    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }

    /// `field` for top-level fields, `field[index]` for line-item fields.
    pub fn display_name(&self) -> String {
        match self.item_index {
            Some(index) => format!("{}[{}]", self.field_name, index),
            None => self.field_name.clone(),
        }
    }
}

/// Ordered results of one evaluation, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldResultCollection {
    results: Vec<FieldResult>,
}

impl FieldResultCollection {
    pub fn new(results: Vec<FieldResult>) -> Self {
        Self { results }
    }

    /// Read-only analysis over the collection.
    pub fn analysis(&self) -> FieldAnalysis<'_> {
        FieldAnalysis::new(&self.results)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[FieldResult] {
        &self.results
    }

    pub fn into_vec(self) -> Vec<FieldResult> {
        self.results
    }

    /// Serialize to a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.results)?)
    }
}

impl IntoIterator for FieldResultCollection {
    type Item = FieldResult;
    type IntoIter = std::vec::IntoIter<FieldResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldResultCollection {
    type Item = &'a FieldResult;
    type IntoIter = std::slice::Iter<'a, FieldResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl FromIterator<FieldResult> for FieldResultCollection {
    fn from_iter<I: IntoIterator<Item = FieldResult>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_correct_scores_its_weight() {
        let result = FieldResult::correct("total_price", json!(1000), json!("1,000"), 3.0).unwrap();
        assert!(result.is_correct());
        assert_eq!(result.score(), 3.0);
        assert_eq!(result.weight(), 3.0);
        assert_eq!(result.item_index(), None);
        assert_eq!(result.display_name(), "total_price");
    }

    #[test]
    fn test_incorrect_scores_zero() {
        let result = FieldResult::incorrect("tax_price", json!(100), json!(90), 2.0).unwrap();
        assert!(!result.is_correct());
        assert_eq!(result.score(), 0.0);
        assert_eq!(result.weight(), 2.0);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let err = FieldResult::correct("x", Value::Null, Value::Null, -1.0).unwrap_err();
        assert!(matches!(err, AccuracyError::NegativeWeight { ref field, .. } if field == "x"));

        assert!(FieldResult::incorrect("x", Value::Null, Value::Null, f64::NAN).is_err());
        assert!(FieldResult::incorrect("x", Value::Null, Value::Null, f64::INFINITY).is_err());
    }

    #[test]
    fn test_rejects_inconsistent_scores() {
        assert!(FieldResult::new("x", Value::Null, Value::Null, 2.0, 1.0, true).is_err());
        assert!(FieldResult::new("x", Value::Null, Value::Null, 2.0, 2.0, false).is_err());
        assert!(FieldResult::new("x", Value::Null, Value::Null, 2.0, -0.5, false).is_err());
        assert!(FieldResult::new("x", Value::Null, Value::Null, 0.0, 0.0, true).is_ok());
    }

    #[test]
    fn test_item_display_name() {
        let result = FieldResult::correct("items.name", json!("bolt"), json!("bolt"), 3.0)
            .unwrap()
            .with_item_index(2);
        assert_eq!(result.item_index(), Some(2));
        assert_eq!(result.display_name(), "items.name[2]");
    }

    #[test]
    fn test_serialized_shape() {
        let result = FieldResult::incorrect("items.price", json!(500), json!(450), 2.0)
            .unwrap()
            .with_item_index(1);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            json!({
                "field_name": "items.price",
                "expected_value": 500,
                "actual_value": 450,
                "weight": 2.0,
                "score": 0.0,
                "is_correct": false,
                "item_index": 1,
                "details": null,
            })
        );
    }

    #[test]
    fn test_deserialization_is_validated() {
        let ok = json!({
            "field_name": "doc_date",
            "expected_value": "2024-01-15",
            "actual_value": null,
            "weight": 1.0,
            "score": 0.0,
            "is_correct": false,
            "item_index": null,
            "details": {"comparator": "date"},
        });
        let result: FieldResult = serde_json::from_value(ok).unwrap();
        assert_eq!(result.details().unwrap()["comparator"], "date");

        let broken = json!({
            "field_name": "doc_date",
            "weight": 1.0,
            "score": 0.5,
            "is_correct": true,
        });
        assert!(serde_json::from_value::<FieldResult>(broken).is_err());
    }

    #[test]
    fn test_collection_preserves_order() {
        let collection: FieldResultCollection = ["b", "a", "c"]
            .into_iter()
            .map(|name| FieldResult::correct(name, Value::Null, Value::Null, 1.0).unwrap())
            .collect();

        let names: Vec<&str> = collection.iter().map(FieldResult::field_name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(collection.len(), 3);

        let json = collection.to_json().unwrap();
        let parsed: FieldResultCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, collection);
    }
}
