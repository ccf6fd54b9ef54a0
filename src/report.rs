//! Run-level aggregation across evaluated documents.

use crate::analysis::ratio;
use crate::field_result::FieldResultCollection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of evaluating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvaluation {
    /// Document identifier.
    pub document_id: String,
    /// Field results, when evaluation succeeded.
    pub results: Option<FieldResultCollection>,
    /// Error message if any.
    pub error: Option<String>,
}

impl DocumentEvaluation {
    pub fn success(document_id: impl Into<String>, results: FieldResultCollection) -> Self {
        Self {
            document_id: document_id.into(),
            results: Some(results),
            error: None,
        }
    }

    pub fn failure(document_id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            document_id: document_id.into(),
            results: None,
            error: Some(error.to_string()),
        }
    }
}

/// Per-document line of a run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub overall_accuracy: f64,
    pub items_accuracy: f64,
    pub total_score: f64,
    pub total_weight: f64,
    pub field_count: usize,
    pub correct_count: usize,
    pub error: Option<String>,
}

/// One field name aggregated over every document of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRollup {
    /// Fraction of correct evaluations.
    pub accuracy: f64,
    /// Score / weight ratio.
    pub weighted_accuracy: f64,
    /// Mean weight per evaluation.
    pub avg_weight: f64,
    /// Number of evaluations (one per document, or per line item).
    pub evaluations: usize,
}

/// Aggregated results of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run name.
    pub name: String,
    pub total_documents: usize,
    pub successful_documents: usize,
    pub failed_documents: usize,
    /// Total score over total weight across successful documents.
    pub overall_accuracy: f64,
    pub documents: Vec<DocumentSummary>,
    pub field_summary: BTreeMap<String, FieldRollup>,
}

#[derive(Default)]
struct Tally {
    correct: usize,
    count: usize,
    score: f64,
    weight: f64,
}

impl RunReport {
    /// Build a report from evaluated documents.
    pub fn from_documents(name: &str, documents: &[DocumentEvaluation]) -> Self {
        let mut summaries = Vec::with_capacity(documents.len());
        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        let mut successful = 0;
        let mut total_score = 0.0;
        let mut total_weight = 0.0;

        for document in documents {
            let Some(results) = &document.results else {
                summaries.push(DocumentSummary {
                    document_id: document.document_id.clone(),
                    overall_accuracy: 0.0,
                    items_accuracy: 0.0,
                    total_score: 0.0,
                    total_weight: 0.0,
                    field_count: 0,
                    correct_count: 0,
                    error: document.error.clone(),
                });
                continue;
            };

            successful += 1;
            let analysis = results.analysis();
            total_score += analysis.total_score();
            total_weight += analysis.total_weight();

            for (field, accuracy) in analysis.field_accuracy_summary() {
                let tally = tallies.entry(field).or_default();
                tally.correct += accuracy.correct_count;
                tally.count += accuracy.total_count;
                tally.score += accuracy.total_score;
                tally.weight += accuracy.total_weight;
            }

            summaries.push(DocumentSummary {
                document_id: document.document_id.clone(),
                overall_accuracy: analysis.overall_accuracy(),
                items_accuracy: analysis.items_accuracy(),
                total_score: analysis.total_score(),
                total_weight: analysis.total_weight(),
                field_count: results.len(),
                correct_count: analysis.correct_count(),
                error: document.error.clone(),
            });
        }

        let field_summary = tallies
            .into_iter()
            .map(|(field, tally)| {
                let rollup = FieldRollup {
                    accuracy: ratio(tally.correct as f64, tally.count as f64),
                    weighted_accuracy: ratio(tally.score, tally.weight),
                    avg_weight: ratio(tally.weight, tally.count as f64),
                    evaluations: tally.count,
                };
                (field, rollup)
            })
            .collect();

        Self {
            name: name.to_string(),
            total_documents: documents.len(),
            successful_documents: successful,
            failed_documents: documents.len() - successful,
            overall_accuracy: ratio(total_score, total_weight),
            documents: summaries,
            field_summary,
        }
    }

    /// Fields ordered from least to most accurate.
    pub fn weakest_fields(&self) -> Vec<(&str, &FieldRollup)> {
        let mut fields: Vec<_> = self
            .field_summary
            .iter()
            .map(|(name, rollup)| (name.as_str(), rollup))
            .collect();
        fields.sort_by(|a, b| a.1.weighted_accuracy.total_cmp(&b.1.weighted_accuracy));
        fields
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Accuracy Report ==========");
        println!("Run: {}", self.name);
        println!(
            "Documents: {} ({} ok, {} failed)",
            self.total_documents, self.successful_documents, self.failed_documents
        );
        println!("Overall accuracy: {:.1}%", self.overall_accuracy * 100.0);
        println!("--------------------------------------");

        for document in &self.documents {
            match &document.error {
                Some(error) => println!("  {:<30} FAILED: {}", document.document_id, error),
                None => println!(
                    "  {:<30} {:>6.1}%  ({}/{} fields)",
                    document.document_id,
                    document.overall_accuracy * 100.0,
                    document.correct_count,
                    document.field_count
                ),
            }
        }

        if !self.field_summary.is_empty() {
            println!("--------------------------------------");
            println!("  {:<30} {:>7} {:>7} {:>6}", "field", "acc", "w.acc", "n");
            for (field, rollup) in self.weakest_fields() {
                println!(
                    "  {:<30} {:>6.1}% {:>6.1}% {:>6}",
                    field,
                    rollup.accuracy * 100.0,
                    rollup.weighted_accuracy * 100.0,
                    rollup.evaluations
                );
            }
        }
        println!("======================================\n");
    }
}
