//! Maps field identifiers to the strategy that scores them.

use crate::comparator::Comparator;
use crate::error::{AccuracyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a field is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorKind {
    Text,
    Amount,
    Date,
    /// Repeated sub-records, scored by the group aligner.
    Group,
}

impl CalculatorKind {
    /// The scalar comparator for this kind; `None` for groups.
    pub fn comparator(&self) -> Option<Comparator> {
        match self {
            CalculatorKind::Text => Some(Comparator::Text),
            CalculatorKind::Amount => Some(Comparator::Amount),
            CalculatorKind::Date => Some(Comparator::Date),
            CalculatorKind::Group => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CalculatorKind::Text => "text",
            CalculatorKind::Amount => "amount",
            CalculatorKind::Date => "date",
            CalculatorKind::Group => "group",
        }
    }
}

/// Field-to-calculator configuration.
///
/// Kind names must be registered before mappings can refer to them. The
/// built-in names are `text`, `simple` (an alias of `text`), `amount`,
/// `date` and `group`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorRegistry {
    kinds: BTreeMap<String, CalculatorKind>,
    mappings: BTreeMap<String, CalculatorKind>,
    default_kind: CalculatorKind,
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculatorRegistry {
    /// A registry with the built-in kind names, no mappings, and `text` as
    /// the fallback.
    pub fn new() -> Self {
        let kinds = [
            ("text", CalculatorKind::Text),
            ("simple", CalculatorKind::Text),
            ("amount", CalculatorKind::Amount),
            ("date", CalculatorKind::Date),
            ("group", CalculatorKind::Group),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self {
            kinds,
            mappings: BTreeMap::new(),
            default_kind: CalculatorKind::Text,
        }
    }

    /// Register an additional kind name (e.g. `quantity` scored as an amount).
    pub fn register_kind(mut self, name: impl Into<String>, kind: CalculatorKind) -> Self {
        self.kinds.insert(name.into().to_lowercase(), kind);
        self
    }

    /// Override the kind used for unmapped fields.
    pub fn with_default(mut self, kind: CalculatorKind) -> Self {
        self.default_kind = kind;
        self
    }

    /// Map a field to a registered kind name.
    pub fn add_mapping(&mut self, field_name: impl Into<String>, kind_name: &str) -> Result<()> {
        let kind = self.resolve_kind(kind_name)?;
        self.mappings.insert(field_name.into(), kind);
        Ok(())
    }

    /// Map a field directly to a kind.
    pub fn map_field(&mut self, field_name: impl Into<String>, kind: CalculatorKind) {
        self.mappings.insert(field_name.into(), kind);
    }

    /// Look up a registered kind by name (case-insensitive).
    pub fn resolve_kind(&self, kind_name: &str) -> Result<CalculatorKind> {
        self.kinds
            .get(&kind_name.trim().to_lowercase())
            .copied()
            .ok_or_else(|| AccuracyError::UnknownCalculatorKind(kind_name.to_string()))
    }

    /// The kind responsible for a field, or the default when unmapped.
    pub fn get_calculator(&self, field_name: &str) -> CalculatorKind {
        self.mappings
            .get(field_name)
            .copied()
            .unwrap_or(self.default_kind)
    }

    pub fn is_group(&self, field_name: &str) -> bool {
        self.get_calculator(field_name) == CalculatorKind::Group
    }

    /// Fields explicitly mapped to the group kind.
    pub fn group_fields(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|(_, kind)| **kind == CalculatorKind::Group)
            .map(|(field, _)| field.as_str())
    }

    pub fn default_kind(&self) -> CalculatorKind {
        self.default_kind
    }

    /// All explicit mappings, sorted by field.
    pub fn mappings(&self) -> impl Iterator<Item = (&str, CalculatorKind)> {
        self.mappings
            .iter()
            .map(|(field, kind)| (field.as_str(), *kind))
    }
}
