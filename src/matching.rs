//! Similarity-based pairing of line items.
//!
//! Used by [`AlignmentStrategy::BestMatch`](crate::aligner::AlignmentStrategy).
//! Each expected item, in order, takes the most similar actual item that has
//! not been taken yet. Similarity is the weighted share of subfields that
//! match under the same comparators and weights used for scoring, except
//! that a `name` subfield also accepts partial matches (see [`names_match`]).
//! The looser name rule only affects pairing, never the scores.

use crate::aligner::{Item, subfield_comparator, subfield_key, subfield_value};
use crate::comparator::render;
use crate::registry::CalculatorRegistry;
use crate::weights::WeightTable;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::trace;
use unicode_normalization::UnicodeNormalization;

/// Subfield compared with [`names_match`] while pairing.
const NAME_SUBFIELD: &str = "name";

/// Share of the shorter name's words that must appear in the other name.
const NAME_WORD_OVERLAP: f64 = 0.5;

/// Greedy best-match pairing for one group.
pub struct ItemMatcher<'a> {
    registry: &'a CalculatorRegistry,
    weights: &'a WeightTable,
    group: &'a str,
    subfields: &'a [String],
}

impl<'a> ItemMatcher<'a> {
    pub fn new(
        registry: &'a CalculatorRegistry,
        weights: &'a WeightTable,
        group: &'a str,
        subfields: &'a [String],
    ) -> Self {
        Self {
            registry,
            weights,
            group,
            subfields,
        }
    }

    /// Weighted share of matching subfields, ignoring subfields that are
    /// empty (null, blank or zero) on both sides. Zero when nothing is
    /// comparable.
    pub fn similarity(&self, expected: Item<'_>, actual: Item<'_>) -> f64 {
        let mut total_weight = 0.0;
        let mut matched_weight = 0.0;

        for subfield in self.subfields {
            let expected_value = subfield_value(expected, subfield);
            let actual_value = subfield_value(actual, subfield);
            if is_empty(&expected_value) && is_empty(&actual_value) {
                continue;
            }

            let key = subfield_key(self.group, subfield);
            let weight = self.weights.weight_for(&key);
            total_weight += weight;
            let matched = if subfield == NAME_SUBFIELD {
                names_match(&expected_value, &actual_value)
            } else {
                subfield_comparator(self.registry, &key).matches(&expected_value, &actual_value)
            };
            if matched {
                matched_weight += weight;
            }
        }

        if total_weight > 0.0 {
            matched_weight / total_weight
        } else {
            0.0
        }
    }

    /// Pair expected items with their best actual items.
    ///
    /// Expected items keep their order; those without a candidate (no
    /// remaining item with similarity above zero) are paired with an empty
    /// record. Actual items left over are appended in their original order.
    pub fn pairs<'v>(
        &self,
        expected: &[Item<'v>],
        actual: &[Item<'v>],
    ) -> Vec<(Item<'v>, Item<'v>)> {
        let mut used = vec![false; actual.len()];
        let mut pairs = Vec::with_capacity(expected.len().max(actual.len()));

        for (expected_index, expected_item) in expected.iter().enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (actual_index, actual_item) in actual.iter().enumerate() {
                if used[actual_index] {
                    continue;
                }
                let score = self.similarity(*expected_item, *actual_item);
                if score > best.map_or(0.0, |(_, s)| s) {
                    best = Some((actual_index, score));
                }
            }

            match best {
                Some((actual_index, score)) => {
                    trace!(
                        group = self.group,
                        expected_index,
                        actual_index,
                        score,
                        "matched line item"
                    );
                    used[actual_index] = true;
                    pairs.push((*expected_item, actual[actual_index]));
                }
                None => pairs.push((*expected_item, None)),
            }
        }

        for (actual_index, actual_item) in actual.iter().enumerate() {
            if !used[actual_index] {
                pairs.push((None, *actual_item));
            }
        }

        pairs
    }
}

/// Loose item-name match: equal, or one contains the other (also after
/// NFKC folding without kana voicing marks), or at least half of the
/// shorter name's words appear in the other.
pub fn names_match(expected: &Value, actual: &Value) -> bool {
    if expected.is_null() || actual.is_null() {
        return false;
    }

    let expected = render(expected).trim().to_lowercase();
    let actual = render(actual).trim().to_lowercase();
    if expected.is_empty() || actual.is_empty() {
        return false;
    }
    if contains_either(&expected, &actual) {
        return true;
    }

    let (expected_folded, actual_folded) = (fold(&expected), fold(&actual));
    if !expected_folded.is_empty()
        && !actual_folded.is_empty()
        && contains_either(&expected_folded, &actual_folded)
    {
        return true;
    }

    let (expected_words, actual_words) = (words(&expected), words(&actual));
    let shorter = expected_words.len().min(actual_words.len());
    if shorter == 0 {
        return false;
    }
    let common = expected_words.intersection(&actual_words).count();
    common as f64 / shorter as f64 >= NAME_WORD_OVERLAP
}

fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn fold(name: &str) -> String {
    name.nfkc()
        .filter(|c| !matches!(*c, '\u{3099}' | '\u{309A}' | '゛' | '゜'))
        .collect()
}

fn words(name: &str) -> BTreeSet<&str> {
    name.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}
