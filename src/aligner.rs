//! Line-item alignment.
//!
//! Two ordered lists of sub-records are paired up and every pair is expanded
//! into one [`FieldResult`] per subfield, tagged with the pair's index. The
//! shorter side is padded with empty records, so a missing or extra item
//! costs the full weight of its non-null subfields.

use crate::comparator::Comparator;
use crate::error::Result;
use crate::field_result::FieldResult;
use crate::matching::ItemMatcher;
use crate::registry::CalculatorRegistry;
use crate::weights::WeightTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// One line item; `None` stands for an empty record.
pub type Item<'v> = Option<&'v Map<String, Value>>;

/// How expected and actual items are paired before scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStrategy {
    /// Item `i` is compared with item `i`.
    #[default]
    Positional,
    /// Actual items are first reordered to their most similar expected item.
    BestMatch,
}

impl AlignmentStrategy {
    /// Parse a strategy name (`positional`, `best_match`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "positional" => Some(AlignmentStrategy::Positional),
            "best_match" => Some(AlignmentStrategy::BestMatch),
            _ => None,
        }
    }
}

/// Scores a repeated group of sub-records.
#[derive(Debug, Clone, Copy)]
pub struct GroupAligner<'a> {
    registry: &'a CalculatorRegistry,
    weights: &'a WeightTable,
    strategy: AlignmentStrategy,
}

impl<'a> GroupAligner<'a> {
    pub fn new(registry: &'a CalculatorRegistry, weights: &'a WeightTable) -> Self {
        Self {
            registry,
            weights,
            strategy: AlignmentStrategy::Positional,
        }
    }

    pub fn with_strategy(mut self, strategy: AlignmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Align the items of `group` and score every subfield of every pair.
    ///
    /// `declared` fixes the subfield set; when it is `None` or empty the
    /// sorted union of keys found on either side is used instead.
    pub fn align(
        &self,
        group: &str,
        expected: &Value,
        actual: &Value,
        declared: Option<&[String]>,
    ) -> Result<Vec<FieldResult>> {
        let expected_items = items_of(group, expected);
        let actual_items = items_of(group, actual);

        let subfields: Vec<String> = match declared {
            Some(fields) if !fields.is_empty() => fields.to_vec(),
            _ => discover_subfields(&expected_items, &actual_items),
        };

        let pairs = match self.strategy {
            AlignmentStrategy::Positional => positional_pairs(&expected_items, &actual_items),
            AlignmentStrategy::BestMatch => {
                ItemMatcher::new(self.registry, self.weights, group, &subfields)
                    .pairs(&expected_items, &actual_items)
            }
        };

        debug!(
            group,
            expected = expected_items.len(),
            actual = actual_items.len(),
            aligned = pairs.len(),
            subfields = subfields.len(),
            strategy = ?self.strategy,
            "aligned line items"
        );

        let mut results = Vec::with_capacity(pairs.len() * subfields.len());
        for (index, (expected_item, actual_item)) in pairs.into_iter().enumerate() {
            for subfield in &subfields {
                let key = subfield_key(group, subfield);
                let expected_value = subfield_value(expected_item, subfield);
                let actual_value = subfield_value(actual_item, subfield);

                let comparator = subfield_comparator(self.registry, &key);
                let weight = self.weights.weight_for(&key);
                let outcome = comparator.compare(&expected_value, &actual_value);

                trace!(field = %key, index, matched = outcome.matched, "scored subfield");

                let result = FieldResult::from_match(
                    key,
                    expected_value,
                    actual_value,
                    weight,
                    outcome.matched,
                )?
                .with_item_index(index);
                results.push(match outcome.details {
                    Some(details) => result.with_details(details),
                    None => result,
                });
            }
        }

        Ok(results)
    }
}

/// Namespaced identifier of a subfield, e.g. `items.price`.
pub fn subfield_key(group: &str, subfield: &str) -> String {
    format!("{group}.{subfield}")
}

/// Comparator for a subfield; nested groups are compared as text.
pub(crate) fn subfield_comparator(registry: &CalculatorRegistry, key: &str) -> Comparator {
    registry
        .get_calculator(key)
        .comparator()
        .unwrap_or(Comparator::Text)
}

pub(crate) fn subfield_value(item: Item<'_>, subfield: &str) -> Value {
    item.and_then(|record| record.get(subfield))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Items of a group value. Anything that is not a list counts as no items,
/// and a list element that is not an object counts as an empty record.
fn items_of<'v>(group: &str, value: &'v Value) -> Vec<Item<'v>> {
    match value {
        Value::Array(items) => items.iter().map(Value::as_object).collect(),
        Value::Null => Vec::new(),
        _ => {
            debug!(group, "group value is not a list, treating it as empty");
            Vec::new()
        }
    }
}

fn discover_subfields(expected: &[Item<'_>], actual: &[Item<'_>]) -> Vec<String> {
    expected
        .iter()
        .chain(actual)
        .flatten()
        .flat_map(|record| record.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn positional_pairs<'v>(expected: &[Item<'v>], actual: &[Item<'v>]) -> Vec<(Item<'v>, Item<'v>)> {
    let len = expected.len().max(actual.len());
    (0..len)
        .map(|i| {
            (
                expected.get(i).copied().flatten(),
                actual.get(i).copied().flatten(),
            )
        })
        .collect()
}
