//! Aggregation over a fixed set of field results.

use crate::field_result::FieldResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accuracy of one line item across its subfields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Weighted accuracy (score / weight).
    pub accuracy: f64,
    pub total_weight: f64,
    pub total_score: f64,
    pub field_count: usize,
    pub correct_count: usize,
}

/// Accuracy of one field name, merged across all item indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccuracy {
    /// Unweighted fraction of correct results.
    pub accuracy: f64,
    /// Score / weight ratio.
    pub weighted_accuracy: f64,
    pub correct_count: usize,
    pub total_count: usize,
    pub total_score: f64,
    pub total_weight: f64,
}

/// Stateless, read-only view over a slice of field results.
#[derive(Debug, Clone, Copy)]
pub struct FieldAnalysis<'a> {
    results: &'a [FieldResult],
}

impl<'a> FieldAnalysis<'a> {
    pub fn new(results: &'a [FieldResult]) -> Self {
        Self { results }
    }

    /// All results for a field name, across item indices.
    pub fn by_field_name(&self, name: &str) -> Vec<&'a FieldResult> {
        self.results
            .iter()
            .filter(|r| r.field_name() == name)
            .collect()
    }

    /// All results belonging to one line item.
    pub fn by_item_index(&self, index: usize) -> Vec<&'a FieldResult> {
        self.results
            .iter()
            .filter(|r| r.item_index() == Some(index))
            .collect()
    }

    pub fn by_field_and_item(&self, name: &str, index: usize) -> Option<&'a FieldResult> {
        self.results
            .iter()
            .find(|r| r.field_name() == name && r.item_index() == Some(index))
    }

    /// Results that belong to a line item.
    pub fn items_results(&self) -> Vec<&'a FieldResult> {
        self.results
            .iter()
            .filter(|r| r.item_index().is_some())
            .collect()
    }

    /// Top-level field results.
    pub fn non_items_results(&self) -> Vec<&'a FieldResult> {
        self.results
            .iter()
            .filter(|r| r.item_index().is_none())
            .collect()
    }

    pub fn total_score(&self) -> f64 {
        self.results.iter().map(FieldResult::score).sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.results.iter().map(FieldResult::weight).sum()
    }

    pub fn correct_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct()).count()
    }

    /// Mismatched results, in emission order.
    pub fn incorrect_results(&self) -> Vec<&'a FieldResult> {
        self.results.iter().filter(|r| !r.is_correct()).collect()
    }

    /// Total score over total weight; zero when nothing carries weight.
    pub fn overall_accuracy(&self) -> f64 {
        weighted_ratio(self.results.iter())
    }

    /// Same ratio as [`overall_accuracy`](Self::overall_accuracy), over line items only.
    pub fn items_accuracy(&self) -> f64 {
        weighted_ratio(self.results.iter().filter(|r| r.item_index().is_some()))
    }

    /// Per-item accuracy, keyed by item index.
    pub fn item_summary(&self) -> BTreeMap<usize, ItemSummary> {
        let mut groups: BTreeMap<usize, Vec<&FieldResult>> = BTreeMap::new();
        for result in self.results {
            if let Some(index) = result.item_index() {
                groups.entry(index).or_default().push(result);
            }
        }

        groups
            .into_iter()
            .map(|(index, results)| {
                let total_score: f64 = results.iter().map(|r| r.score()).sum();
                let total_weight: f64 = results.iter().map(|r| r.weight()).sum();
                let summary = ItemSummary {
                    accuracy: ratio(total_score, total_weight),
                    total_weight,
                    total_score,
                    field_count: results.len(),
                    correct_count: results.iter().filter(|r| r.is_correct()).count(),
                };
                (index, summary)
            })
            .collect()
    }

    /// Per-field accuracy, merging every item index under its field name
    /// (all `items.name[*]` roll up into `items.name`).
    pub fn field_accuracy_summary(&self) -> BTreeMap<String, FieldAccuracy> {
        let mut summary: BTreeMap<String, FieldAccuracy> = BTreeMap::new();

        for result in self.results {
            let entry = summary
                .entry(result.field_name().to_string())
                .or_insert(FieldAccuracy {
                    accuracy: 0.0,
                    weighted_accuracy: 0.0,
                    correct_count: 0,
                    total_count: 0,
                    total_score: 0.0,
                    total_weight: 0.0,
                });
            entry.total_count += 1;
            entry.total_score += result.score();
            entry.total_weight += result.weight();
            if result.is_correct() {
                entry.correct_count += 1;
            }
        }

        for field in summary.values_mut() {
            field.accuracy = ratio(field.correct_count as f64, field.total_count as f64);
            field.weighted_accuracy = ratio(field.total_score, field.total_weight);
        }

        summary
    }

    /// Correctness per result instance, keyed by display name.
    pub fn field_accuracies(&self) -> BTreeMap<String, bool> {
        self.results
            .iter()
            .map(|r| (r.display_name(), r.is_correct()))
            .collect()
    }
}

fn weighted_ratio<'r>(results: impl Iterator<Item = &'r FieldResult>) -> f64 {
    let (score, weight) = results.fold((0.0, 0.0), |(score, weight), r| {
        (score + r.score(), weight + r.weight())
    });
    ratio(score, weight)
}

pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn field(name: &str, weight: f64, correct: bool) -> FieldResult {
        FieldResult::from_match(name, Value::Null, Value::Null, weight, correct).unwrap()
    }

    fn item(name: &str, index: usize, weight: f64, correct: bool) -> FieldResult {
        field(name, weight, correct).with_item_index(index)
    }

    /// Two line items: the first fully correct, the second with a wrong price.
    fn line_items() -> Vec<FieldResult> {
        vec![
            field("total_price", 3.0, true),
            item("items.name", 0, 2.0, true),
            item("items.price", 0, 3.0, true),
            item("items.quantity", 0, 2.0, true),
            item("items.name", 1, 2.0, true),
            item("items.price", 1, 3.0, false),
            item("items.quantity", 1, 2.0, true),
        ]
    }

    #[test]
    fn test_item_summary() {
        let results = line_items();
        let analysis = FieldAnalysis::new(&results);
        let summary = analysis.item_summary();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[&0].accuracy, 1.0);
        assert_eq!(summary[&0].correct_count, 3);
        assert!((summary[&1].accuracy - 4.0 / 7.0).abs() < 1e-9);
        assert_eq!(summary[&1].total_weight, 7.0);
        assert_eq!(summary[&1].total_score, 4.0);
        assert_eq!(summary[&1].field_count, 3);
        assert_eq!(summary[&1].correct_count, 2);
    }

    #[test]
    fn test_partition_by_item_index() {
        let results = line_items();
        let analysis = FieldAnalysis::new(&results);

        assert_eq!(analysis.items_results().len(), 6);
        assert_eq!(analysis.non_items_results().len(), 1);
        assert!((analysis.items_accuracy() - 11.0 / 14.0).abs() < 1e-9);
        assert!((analysis.overall_accuracy() - 14.0 / 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookups() {
        let results = line_items();
        let analysis = FieldAnalysis::new(&results);

        assert_eq!(analysis.by_field_name("items.price").len(), 2);
        assert_eq!(analysis.by_item_index(1).len(), 3);
        assert!(!analysis.by_field_and_item("items.price", 1).unwrap().is_correct());
        assert!(analysis.by_field_and_item("items.price", 5).is_none());
        assert!(analysis.by_field_and_item("total_price", 0).is_none());
        assert_eq!(analysis.incorrect_results().len(), 1);
    }

    #[test]
    fn test_field_accuracy_summary_merges_items() {
        let results = line_items();
        let summary = FieldAnalysis::new(&results).field_accuracy_summary();

        let price = &summary["items.price"];
        assert_eq!(price.total_count, 2);
        assert_eq!(price.correct_count, 1);
        assert_eq!(price.accuracy, 0.5);
        assert_eq!(price.weighted_accuracy, 0.5);
        assert_eq!(summary["total_price"].accuracy, 1.0);
        assert_eq!(summary.len(), 4);
    }

    #[test]
    fn test_field_accuracies_use_display_names() {
        let results = line_items();
        let flags = FieldAnalysis::new(&results).field_accuracies();

        assert_eq!(flags.len(), 7);
        assert_eq!(flags["items.price[1]"], false);
        assert_eq!(flags["items.price[0]"], true);
        assert_eq!(flags["total_price"], true);
    }

    #[test]
    fn test_zero_weight_yields_zero_accuracy() {
        let empty: Vec<FieldResult> = Vec::new();
        assert_eq!(FieldAnalysis::new(&empty).overall_accuracy(), 0.0);

        let weightless = vec![field("memo", 0.0, true)];
        let analysis = FieldAnalysis::new(&weightless);
        assert_eq!(analysis.overall_accuracy(), 0.0);
        assert_eq!(analysis.items_accuracy(), 0.0);
        assert_eq!(analysis.field_accuracy_summary()["memo"].accuracy, 1.0);
    }

    #[test]
    fn test_summary_serializes() {
        let results = line_items();
        let summary = FieldAnalysis::new(&results).item_summary();
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["0"]["field_count"], json!(3));
    }
}
