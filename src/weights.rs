//! Field weight table.

use crate::error::{AccuracyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default weight for fields absent from the table.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Maps field identifiers (dotted for line-item subfields, e.g. `items.price`)
/// to weights, with a fallback for unlisted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: BTreeMap<String, f64>,
    default_weight: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight: DEFAULT_WEIGHT,
        }
    }
}

impl WeightTable {
    /// Create a table, rejecting negative or non-finite weights.
    pub fn new(weights: BTreeMap<String, f64>, default_weight: f64) -> Result<Self> {
        check_weight("default_weight", default_weight)?;
        for (field, weight) in &weights {
            check_weight(field, *weight)?;
        }
        Ok(Self {
            weights,
            default_weight,
        })
    }

    /// An empty table where every field gets `default_weight`.
    pub fn uniform(default_weight: f64) -> Result<Self> {
        Self::new(BTreeMap::new(), default_weight)
    }

    /// Set the weight of one field.
    pub fn with_weight(mut self, field: impl Into<String>, weight: f64) -> Result<Self> {
        let field = field.into();
        check_weight(&field, weight)?;
        self.weights.insert(field, weight);
        Ok(self)
    }

    /// Weight for a field, falling back to the default.
    pub fn weight_for(&self, field: &str) -> f64 {
        self.weights
            .get(field)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    /// Explicitly weighted field identifiers, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.weights.contains_key(field)
    }
}

fn check_weight(field: &str, weight: f64) -> Result<()> {
    if weight >= 0.0 && weight.is_finite() {
        Ok(())
    } else {
        Err(AccuracyError::NegativeWeight {
            field: field.to_string(),
            weight,
        })
    }
}
