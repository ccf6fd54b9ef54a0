//! Configuration for the accuracy engine.
//!
//! Weights and field types come from a YAML file; environment variables
//! take precedence over config file values for the scalar settings.
//!
//! ```yaml
//! default_weight: 1.0
//! field_set: expected
//! alignment: positional
//! field_weights:
//!   total_price: 3.0
//!   items:
//!     name: 3.0
//!     price: 2.0
//! field_types:
//!   total_price: amount
//!   doc_date: date
//!   items:
//!     name: text
//!     price: amount
//! ```

use crate::aligner::{AlignmentStrategy, subfield_key};
use crate::error::{AccuracyError, Result};
use crate::evaluator::FieldSet;
use crate::registry::{CalculatorKind, CalculatorRegistry};
use crate::weights::{DEFAULT_WEIGHT, WeightTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A weight, or a nested table of subfield weights for a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightEntry {
    Weight(f64),
    Nested(BTreeMap<String, f64>),
}

/// A calculator kind name, or a nested table declaring a group and the
/// kinds of its subfields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeEntry {
    Kind(String),
    Nested(BTreeMap<String, String>),
}

/// Full evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Weight for fields missing from `field_weights`.
    pub default_weight: f64,

    /// Which fields drive the evaluation.
    pub field_set: FieldSet,

    /// How line items are paired.
    pub alignment: AlignmentStrategy,

    /// Field weights; nested tables flatten to `group.subfield`.
    pub field_weights: BTreeMap<String, WeightEntry>,

    /// Field calculator kinds; nested tables declare groups.
    pub field_types: BTreeMap<String, TypeEntry>,
}

impl Default for EvaluationConfig {
    /// The invoice schema: amount and date fields plus an `items` group
    /// whose prices, subtotals and quantities are amounts.
    fn default() -> Self {
        let field_types = [
            ("total_price", "amount"),
            ("tax_price", "amount"),
            ("sub_total", "amount"),
            ("doc_date", "date"),
            ("expiration_date", "date"),
            ("items", "group"),
            ("items.price", "amount"),
            ("items.sub_total", "amount"),
            ("items.quantity", "amount"),
        ]
        .into_iter()
        .map(|(field, kind)| (field.to_string(), TypeEntry::Kind(kind.to_string())))
        .collect();

        Self {
            default_weight: DEFAULT_WEIGHT,
            field_set: FieldSet::default(),
            alignment: AlignmentStrategy::default(),
            field_weights: BTreeMap::new(),
            field_types,
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    default_weight: Option<f64>,
    field_set: Option<FieldSet>,
    alignment: Option<AlignmentStrategy>,
    field_weights: Option<BTreeMap<String, WeightEntry>>,
    field_types: Option<BTreeMap<String, TypeEntry>>,
}

/// Where [`EvaluationConfig::load_with`] looks for a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation<'a> {
    /// A path the user asked for; it must exist.
    Explicit(&'a Path),
    /// The platform default path; it may be absent.
    Default(&'a Path),
    /// No file, built-in defaults only.
    Builtin,
}

impl EvaluationConfig {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (ACCURACY_DEFAULT_WEIGHT, ACCURACY_FIELD_SET,
    ///    ACCURACY_ALIGNMENT)
    /// 2. Config file (ACCURACY_CONFIG, else ~/.config/extraction-accuracy/config.yaml)
    /// 3. Default values
    ///
    /// A file named by ACCURACY_CONFIG must exist.
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| env::var(key).ok();
        if let Some(path) = env::var_os("ACCURACY_CONFIG") {
            return Self::load_with(ConfigLocation::Explicit(Path::new(&path)), lookup);
        }
        match Self::config_file_path() {
            Some(path) => Self::load_with(ConfigLocation::Default(&path), lookup),
            None => Self::load_with(ConfigLocation::Builtin, lookup),
        }
    }

    /// Load from `location` with environment overrides, then validate.
    pub fn load_with(
        location: ConfigLocation<'_>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match location {
            ConfigLocation::Explicit(path) => Self::load_from_file(path)?,
            ConfigLocation::Default(path) if path.exists() => Self::load_from_file(path)?,
            ConfigLocation::Default(path) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            ConfigLocation::Builtin => Self::default(),
        };

        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// Sections present in the file replace the defaults wholesale; a file
    /// with its own `field_types` does not inherit the invoice schema.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AccuracyError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| AccuracyError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = EvaluationConfig::default();

        if let Some(default_weight) = file_config.default_weight {
            config.default_weight = default_weight;
        }
        if let Some(field_set) = file_config.field_set {
            config.field_set = field_set;
        }
        if let Some(alignment) = file_config.alignment {
            config.alignment = alignment;
        }
        if let Some(field_weights) = file_config.field_weights {
            config.field_weights = field_weights;
        }
        if let Some(field_types) = file_config.field_types {
            config.field_types = field_types;
        }

        Ok(config)
    }

    /// Apply `ACCURACY_*` overrides. Unparsable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("ACCURACY_DEFAULT_WEIGHT") {
            match value.trim().parse() {
                Ok(weight) => self.default_weight = weight,
                Err(_) => warn!(%value, "ignoring unparsable ACCURACY_DEFAULT_WEIGHT"),
            }
        }

        if let Some(value) = lookup("ACCURACY_FIELD_SET") {
            match FieldSet::from_name(&value) {
                Some(field_set) => self.field_set = field_set,
                None => warn!(%value, "ignoring unknown ACCURACY_FIELD_SET"),
            }
        }

        if let Some(value) = lookup("ACCURACY_ALIGNMENT") {
            match AlignmentStrategy::from_name(&value) {
                Some(alignment) => self.alignment = alignment,
                None => warn!(%value, "ignoring unknown ACCURACY_ALIGNMENT"),
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "extraction-accuracy")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate weights and field types.
    pub fn validate(&self) -> Result<()> {
        self.weight_table()
            .map_err(|e| AccuracyError::InvalidConfig(e.to_string()))?;
        self.registry()
            .map_err(|e| AccuracyError::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    /// Flattened weight table (`items: {name: 3}` becomes `items.name`).
    pub fn weight_table(&self) -> Result<WeightTable> {
        let mut weights = BTreeMap::new();
        for (field, entry) in &self.field_weights {
            match entry {
                WeightEntry::Weight(weight) => {
                    weights.insert(field.clone(), *weight);
                }
                WeightEntry::Nested(nested) => {
                    for (subfield, weight) in nested {
                        weights.insert(subfield_key(field, subfield), *weight);
                    }
                }
            }
        }
        WeightTable::new(weights, self.default_weight)
    }

    /// Registry built from `field_types`; fails on unknown kind names.
    pub fn registry(&self) -> Result<CalculatorRegistry> {
        let mut registry = CalculatorRegistry::new();
        for (field, entry) in &self.field_types {
            match entry {
                TypeEntry::Kind(kind) => registry.add_mapping(field.clone(), kind)?,
                TypeEntry::Nested(nested) => {
                    registry.map_field(field.clone(), CalculatorKind::Group);
                    for (subfield, kind) in nested {
                        registry.add_mapping(subfield_key(field, subfield), kind)?;
                    }
                }
            }
        }
        Ok(registry)
    }

    /// Declared subfields of each group given as a nested `field_types` table.
    pub fn group_subfields(&self) -> BTreeMap<String, Vec<String>> {
        self.field_types
            .iter()
            .filter_map(|(field, entry)| match entry {
                TypeEntry::Nested(nested) => {
                    Some((field.clone(), nested.keys().cloned().collect()))
                }
                TypeEntry::Kind(_) => None,
            })
            .collect()
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert_eq!(config.default_weight, 1.0);
        assert_eq!(config.field_set, FieldSet::Expected);
        assert_eq!(config.alignment, AlignmentStrategy::Positional);
        assert!(config.validate().is_ok());

        let registry = config.registry().unwrap();
        assert_eq!(registry.get_calculator("total_price"), CalculatorKind::Amount);
        assert_eq!(registry.get_calculator("doc_date"), CalculatorKind::Date);
        assert_eq!(registry.get_calculator("items.quantity"), CalculatorKind::Amount);
        assert!(registry.is_group("items"));
        assert!(config.group_subfields().is_empty());
    }

    #[test]
    fn test_nested_tables_flatten() {
        let config = EvaluationConfig::from_yaml(
            r#"
default_weight: 0.5
alignment: best_match
field_weights:
  total_price: 3
  items:
    name: 3.0
    price: 2.0
field_types:
  total_price: amount
  items:
    name: text
    price: amount
"#,
        )
        .unwrap();

        assert_eq!(config.alignment, AlignmentStrategy::BestMatch);

        let weights = config.weight_table().unwrap();
        assert_eq!(weights.weight_for("total_price"), 3.0);
        assert_eq!(weights.weight_for("items.name"), 3.0);
        assert_eq!(weights.weight_for("items.price"), 2.0);
        assert_eq!(weights.weight_for("memo"), 0.5);

        let registry = config.registry().unwrap();
        assert!(registry.is_group("items"));
        assert_eq!(registry.get_calculator("items.price"), CalculatorKind::Amount);
        // File tables replace the defaults.
        assert_eq!(registry.get_calculator("doc_date"), CalculatorKind::Text);

        assert_eq!(
            config.group_subfields()["items"],
            vec!["name".to_string(), "price".to_string()]
        );
    }

    #[test]
    fn test_validation_rejects_bad_tables() {
        let config = EvaluationConfig::from_yaml("field_weights:\n  total_price: -1\n").unwrap();
        assert!(matches!(config.validate(), Err(AccuracyError::InvalidConfig(_))));

        let config =
            EvaluationConfig::from_yaml("field_types:\n  total_price: currency\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("currency"));
        assert!(matches!(
            config.registry(),
            Err(AccuracyError::UnknownCalculatorKind(_))
        ));
    }

    #[test]
    fn test_unparsable_yaml() {
        assert!(matches!(
            EvaluationConfig::from_yaml("field_weights: [1, 2"),
            Err(AccuracyError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ACCURACY_DEFAULT_WEIGHT", "2.5"),
            ("ACCURACY_FIELD_SET", "union"),
            ("ACCURACY_ALIGNMENT", "sideways"),
        ]
        .into_iter()
        .collect();

        let mut config = EvaluationConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_weight, 2.5);
        assert_eq!(config.field_set, FieldSet::Union);
        assert_eq!(config.alignment, AlignmentStrategy::Positional);
    }

    #[test]
    fn test_load_with_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "default_weight: 2.0\nfield_set: weights\n").unwrap();

        let config =
            EvaluationConfig::load_with(ConfigLocation::Explicit(&path), |_| None).unwrap();
        assert_eq!(config.default_weight, 2.0);
        assert_eq!(config.field_set, FieldSet::Weights);

        let config =
            EvaluationConfig::load_with(ConfigLocation::Default(&path), |_| None).unwrap();
        assert_eq!(config.field_set, FieldSet::Weights);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let typo = dir.path().join("confg.yaml");

        let result = EvaluationConfig::load_with(ConfigLocation::Explicit(&typo), |_| None);
        assert!(matches!(result, Err(AccuracyError::Io { ref path, .. }) if *path == typo));
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("config.yaml");

        let config =
            EvaluationConfig::load_with(ConfigLocation::Default(&absent), |_| None).unwrap();
        assert_eq!(config, EvaluationConfig::default());

        let config = EvaluationConfig::load_with(ConfigLocation::Builtin, |_| None).unwrap();
        assert_eq!(config, EvaluationConfig::default());
    }

    #[test]
    fn test_load_with_rejects_negative_env_weight() {
        let result = EvaluationConfig::load_with(ConfigLocation::Builtin, |key| {
            (key == "ACCURACY_DEFAULT_WEIGHT").then(|| "-3".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_round_trip_keeps_nesting() {
        let config =
            EvaluationConfig::from_yaml("field_weights:\n  items:\n    name: 3.0\n").unwrap();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("items:"));
        assert_eq!(EvaluationConfig::from_yaml(&yaml).unwrap(), config);
    }
}
