//! Extraction Accuracy - field-level scoring of structured document extraction.
//!
//! Given the record a human expected and the record an extractor produced,
//! every field is scored with a comparator chosen by its semantic type
//! (text, amount, date). Repeated groups such as invoice line items are
//! aligned item by item and scored per subfield. Each field carries a weight,
//! and accuracy is the ratio of earned score to total weight.
//!
//! # Quick Start
//!
//! ```
//! use extraction_accuracy::{EvaluationConfig, Evaluator, Record};
//! use serde_json::json;
//!
//! fn main() -> extraction_accuracy::Result<()> {
//!     let evaluator = Evaluator::from_config(&EvaluationConfig::default())?;
//!
//!     let expected: Record = serde_json::from_value(json!({
//!         "total_price": 1000,
//!         "vendor": "ACME",
//!     }))?;
//!     let actual: Record = serde_json::from_value(json!({
//!         "total_price": "1,000",
//!         "vendor": "Acme Inc",
//!     }))?;
//!
//!     let results = evaluator.evaluate(&expected, &actual)?;
//!     let analysis = results.analysis();
//!
//!     assert_eq!(analysis.overall_accuracy(), 0.5);
//!     for result in analysis.incorrect_results() {
//!         println!(
//!             "{}: {} != {}",
//!             result.display_name(),
//!             result.expected_value(),
//!             result.actual_value()
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Comparator**: decides whether two scalar values match
//! - **CalculatorRegistry**: maps field names to comparator kinds
//! - **WeightTable**: per-field weights with a default
//! - **GroupAligner**: pairs line items and scores their subfields
//! - **Evaluator**: walks a record pair and emits field results
//! - **FieldAnalysis**: accuracy summaries over a result collection
//! - **RunReport**: aggregation over many documents

pub mod aligner;
pub mod analysis;
pub mod cases;
pub mod comparator;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod field_result;
pub mod matching;
pub mod registry;
pub mod report;
pub mod telemetry;
pub mod weights;

// Re-export commonly used types
pub use aligner::{AlignmentStrategy, GroupAligner};
pub use analysis::{FieldAccuracy, FieldAnalysis, ItemSummary};
pub use cases::{EvaluationCase, discover_cases, load_case};
pub use comparator::Comparator;
pub use config::{ConfigLocation, EvaluationConfig};
pub use error::{AccuracyError, Result};
pub use evaluator::{Evaluator, FieldSet, Record, evaluate};
pub use field_result::{FieldResult, FieldResultCollection};
pub use registry::{CalculatorKind, CalculatorRegistry};
pub use report::{DocumentEvaluation, RunReport};
pub use weights::WeightTable;
