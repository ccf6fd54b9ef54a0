//! Record-level evaluation.
//!
//! The [`Evaluator`] walks the fields of an expected/actual record pair,
//! scores scalar fields with the comparator the registry assigns to them and
//! hands repeated groups to the [`GroupAligner`].

use crate::aligner::{AlignmentStrategy, GroupAligner};
use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::field_result::{FieldResult, FieldResultCollection};
use crate::registry::CalculatorRegistry;
use crate::weights::WeightTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// A structured record: field name to value.
pub type Record = Map<String, Value>;

/// Which field names drive the evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    /// Fields of the expected record.
    #[default]
    Expected,
    /// Fields of either record; extra fields in the actual record are
    /// scored against a missing expected value.
    Union,
    /// Fields listed in the weight table.
    Weights,
}

impl FieldSet {
    /// Parse a field set name (`expected`, `union`, `weights`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "expected" => Some(FieldSet::Expected),
            "union" => Some(FieldSet::Union),
            "weights" => Some(FieldSet::Weights),
            _ => None,
        }
    }
}

/// Scores actual records against expected ones.
///
/// Immutable once built, so a single evaluator can be shared across threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: CalculatorRegistry,
    weights: WeightTable,
    field_set: FieldSet,
    alignment: AlignmentStrategy,
    group_subfields: BTreeMap<String, Vec<String>>,
}

impl Evaluator {
    pub fn new(registry: CalculatorRegistry, weights: WeightTable) -> Self {
        Self {
            registry,
            weights,
            field_set: FieldSet::default(),
            alignment: AlignmentStrategy::default(),
            group_subfields: BTreeMap::new(),
        }
    }

    /// Build an evaluator from a loaded configuration.
    pub fn from_config(config: &EvaluationConfig) -> Result<Self> {
        let mut evaluator = Self::new(config.registry()?, config.weight_table()?)
            .with_field_set(config.field_set)
            .with_alignment(config.alignment);
        for (group, subfields) in config.group_subfields() {
            evaluator = evaluator.with_group_subfields(group, subfields);
        }
        Ok(evaluator)
    }

    pub fn with_field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn with_alignment(mut self, alignment: AlignmentStrategy) -> Self {
        self.alignment = alignment;
        self
    }

    /// Fix the subfields scored for a group instead of discovering them
    /// from the items.
    pub fn with_group_subfields(
        mut self,
        group: impl Into<String>,
        subfields: Vec<String>,
    ) -> Self {
        self.group_subfields.insert(group.into(), subfields);
        self
    }

    pub fn registry(&self) -> &CalculatorRegistry {
        &self.registry
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Score every field of the pair.
    pub fn evaluate(&self, expected: &Record, actual: &Record) -> Result<FieldResultCollection> {
        let fields = self.field_names(expected, actual);
        let mut results = Vec::with_capacity(fields.len());

        for field in &fields {
            let expected_value = expected.get(*field).unwrap_or(&Value::Null);
            let actual_value = actual.get(*field).unwrap_or(&Value::Null);

            match self.registry.get_calculator(field).comparator() {
                Some(comparator) => {
                    let weight = self.weights.weight_for(field);
                    let outcome = comparator.compare(expected_value, actual_value);
                    trace!(field, matched = outcome.matched, weight, "scored field");

                    let result = FieldResult::from_match(
                        *field,
                        expected_value.clone(),
                        actual_value.clone(),
                        weight,
                        outcome.matched,
                    )?;
                    results.push(match outcome.details {
                        Some(details) => result.with_details(details),
                        None => result,
                    });
                }
                None => {
                    let declared = self.group_subfields.get(*field).map(Vec::as_slice);
                    let items = GroupAligner::new(&self.registry, &self.weights)
                        .with_strategy(self.alignment)
                        .align(field, expected_value, actual_value, declared)?;
                    results.extend(items);
                }
            }
        }

        debug!(
            fields = fields.len(),
            results = results.len(),
            field_set = ?self.field_set,
            "evaluated record"
        );

        Ok(FieldResultCollection::new(results))
    }

    /// Sorted field names to visit. Group fields present on either side are
    /// always included; subfield keys from the weight table never are.
    fn field_names<'r>(&'r self, expected: &'r Record, actual: &'r Record) -> BTreeSet<&'r str> {
        let mut fields: BTreeSet<&str> = match self.field_set {
            FieldSet::Expected => expected.keys().map(String::as_str).collect(),
            FieldSet::Union => expected
                .keys()
                .chain(actual.keys())
                .map(String::as_str)
                .collect(),
            FieldSet::Weights => self
                .weights
                .fields()
                .filter(|field| !self.is_group_subfield(field))
                .collect(),
        };

        fields.extend(
            self.registry
                .group_fields()
                .filter(|group| expected.contains_key(*group) || actual.contains_key(*group)),
        );

        fields
    }

    fn is_group_subfield(&self, field: &str) -> bool {
        field
            .split_once('.')
            .is_some_and(|(group, _)| self.registry.is_group(group))
    }
}

/// Evaluate one pair with default options: expected-record fields and
/// positional item alignment.
pub fn evaluate(
    expected: &Record,
    actual: &Record,
    registry: &CalculatorRegistry,
    weights: &WeightTable,
) -> Result<FieldResultCollection> {
    Evaluator::new(registry.clone(), weights.clone()).evaluate(expected, actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn invoice_registry() -> CalculatorRegistry {
        let mut registry = CalculatorRegistry::new();
        registry.add_mapping("total_price", "amount").unwrap();
        registry.add_mapping("tax_price", "amount").unwrap();
        registry.add_mapping("doc_date", "date").unwrap();
        registry.add_mapping("items", "group").unwrap();
        registry.add_mapping("items.price", "amount").unwrap();
        registry.add_mapping("items.quantity", "amount").unwrap();
        registry
    }

    #[test]
    fn test_weighted_totals() {
        let weights = WeightTable::uniform(1.0)
            .unwrap()
            .with_weight("total_price", 3.0)
            .unwrap()
            .with_weight("tax_price", 2.0)
            .unwrap();
        let expected = record(json!({"total_price": 1000, "tax_price": 100}));
        let actual = record(json!({"total_price": 1000, "tax_price": 90}));

        let results = evaluate(&expected, &actual, &invoice_registry(), &weights).unwrap();

        assert_eq!(results.len(), 2);
        let analysis = results.analysis();
        assert_eq!(analysis.by_field_name("total_price")[0].score(), 3.0);
        assert_eq!(analysis.by_field_name("tax_price")[0].score(), 0.0);
        assert!((analysis.overall_accuracy() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_line_item_summary() {
        let weights = WeightTable::uniform(1.0)
            .unwrap()
            .with_weight("items.price", 3.0)
            .unwrap()
            .with_weight("items.name", 2.0)
            .unwrap()
            .with_weight("items.quantity", 2.0)
            .unwrap();
        let expected = record(json!({
            "items": [
                {"name": "Pump", "price": 12000, "quantity": 1},
                {"name": "Hose", "price": 800, "quantity": 5},
            ]
        }));
        let actual = record(json!({
            "items": [
                {"name": "pump", "price": "12,000", "quantity": "1"},
                {"name": "Hose", "price": "900", "quantity": 5},
            ]
        }));

        let results = evaluate(&expected, &actual, &invoice_registry(), &weights).unwrap();
        let summary = results.analysis().item_summary();

        assert_eq!(results.len(), 6);
        assert_eq!(summary[&0].accuracy, 1.0);
        assert!((summary[&1].accuracy - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_actual_field_is_incorrect() {
        let expected = record(json!({"customer_id": "C12345", "total_price": "10000"}));
        let actual = record(json!({"total_price": "10,000"}));

        let weights = WeightTable::default();
        let results = evaluate(&expected, &actual, &invoice_registry(), &weights).unwrap();
        let customer = results.analysis().by_field_name("customer_id")[0];

        assert!(!customer.is_correct());
        assert_eq!(customer.expected_value(), &json!("C12345"));
        assert_eq!(customer.actual_value(), &Value::Null);
        assert!(results.analysis().by_field_name("total_price")[0].is_correct());
    }

    #[test]
    fn test_field_set_choices() {
        let registry = invoice_registry();
        let weights = WeightTable::uniform(1.0)
            .unwrap()
            .with_weight("doc_date", 1.0)
            .unwrap()
            .with_weight("items.name", 2.0)
            .unwrap();
        let expected = record(json!({"total_price": 10}));
        let actual = record(json!({"total_price": 10, "vendor": "ACME"}));

        let names = |field_set| {
            Evaluator::new(registry.clone(), weights.clone())
                .with_field_set(field_set)
                .evaluate(&expected, &actual)
                .unwrap()
                .iter()
                .map(|r| r.field_name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(FieldSet::Expected), vec!["total_price"]);
        assert_eq!(names(FieldSet::Union), vec!["total_price", "vendor"]);
        assert_eq!(names(FieldSet::Weights), vec!["doc_date"]);
    }

    #[test]
    fn test_group_fields_visited_from_either_side() {
        let expected = record(json!({"total_price": 10}));
        let actual = record(json!({"total_price": 10, "items": [{"name": "extra"}]}));

        let weights = WeightTable::default();
        let results = evaluate(&expected, &actual, &invoice_registry(), &weights).unwrap();
        let items = results.analysis().items_results();
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_correct());
        assert_eq!(results.analysis().items_accuracy(), 0.0);
    }

    #[test]
    fn test_declared_subfields() {
        let evaluator = Evaluator::new(invoice_registry(), WeightTable::default())
            .with_group_subfields("items", vec!["name".to_string(), "price".to_string()]);
        let expected = record(json!({"items": [{"name": "a", "price": 1, "memo": "x"}]}));
        let actual = record(json!({"items": [{"name": "a", "price": 1}]}));

        let results = evaluator.evaluate(&expected, &actual).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.analysis().overall_accuracy(), 1.0);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let evaluator = Evaluator::new(invoice_registry(), WeightTable::default());
        let expected = record(json!({
            "doc_date": "2024-01-15",
            "items": [{"name": "a"}],
            "memo": "x",
        }));
        let actual = record(json!({"doc_date": "2024年1月15日", "items": [], "memo": "X "}));

        let first = evaluator.evaluate(&expected, &actual).unwrap();
        let second = evaluator.evaluate(&expected, &actual).unwrap();
        assert_eq!(first, second);

        let accuracy = first.analysis().overall_accuracy();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_shared_across_threads() {
        let evaluator = Evaluator::new(invoice_registry(), WeightTable::default());
        let expected = record(json!({"total_price": 100, "memo": "a"}));
        let actual = record(json!({"total_price": "100", "memo": "b"}));

        let (evaluator, expected, actual) = (&evaluator, &expected, &actual);

        let accuracies: Vec<f64> = std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for _ in 0..4 {
                handles.push(scope.spawn(move || {
                    evaluator
                        .evaluate(expected, actual)
                        .unwrap()
                        .analysis()
                        .overall_accuracy()
                }));
            }
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(accuracies.iter().all(|a| *a == 0.5));
    }
}
