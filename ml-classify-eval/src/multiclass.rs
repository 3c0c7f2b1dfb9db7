//! Multiclass classification metrics

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ml_classify_core::{DataType, Error, Result, ViewRef};

const PROBABILITY_CLAMP: f64 = 1e-15;

/// Per-class breakdown of a multiclass evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    /// Dictionary value of the class
    pub label: String,

    /// Ground-truth rows of this class
    pub rows: usize,

    /// Fraction of this class's rows predicted correctly
    pub accuracy: f64,

    /// Mean negative log-likelihood over this class's rows
    pub log_loss: f64,
}

/// Aggregate quality metrics for a multiclass classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassClassificationMetrics {
    /// Fraction of all rows predicted correctly
    pub micro_accuracy: f64,

    /// Unweighted mean of per-class accuracies, over classes that have
    /// rows
    pub macro_accuracy: f64,

    /// Mean negative log-likelihood of the true class over all rows
    pub log_loss: f64,

    /// Per-class breakdown; classes with no rows are excluded
    pub per_class: Vec<ClassSummary>,
}

impl fmt::Display for MulticlassClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Micro accuracy: {:.4}", self.micro_accuracy)?;
        writeln!(f, "Macro accuracy: {:.4}", self.macro_accuracy)?;
        writeln!(f, "Log loss:       {:.4}", self.log_loss)?;
        for class in &self.per_class {
            writeln!(
                f,
                "  {}: rows {}, accuracy {:.4}, log loss {:.4}",
                class.label, class.rows, class.accuracy, class.log_loss
            )?;
        }
        Ok(())
    }
}

/// Compute multiclass metrics over a scored view
///
/// `label_column` must be a key column; `probability_column` must hold
/// one probability per dictionary entry, in key order. The predicted
/// class is the argmax of the probability vector.
pub fn evaluate_multiclass(
    view: &ViewRef,
    label_column: &str,
    probability_column: &str,
) -> Result<MulticlassClassificationMetrics> {
    let schema = view.schema();
    let label_index = schema.index_of(label_column)?;
    let probability_index = schema.index_of(probability_column)?;

    let dictionary = match schema.field(label_index).data_type() {
        DataType::Key { dictionary } => dictionary.clone(),
        other => {
            return Err(Error::InvalidConfiguration(format!(
                "Column '{}' has type {} but multiclass evaluation requires a key column",
                label_column, other
            )))
        }
    };
    match schema.field(probability_index).data_type() {
        DataType::FloatVector(length) if *length == dictionary.len() => {}
        other => {
            return Err(Error::SchemaMismatch(format!(
                "Column '{}' has type {} but the label dictionary has {} classes",
                probability_column,
                other,
                dictionary.len()
            )))
        }
    }

    let classes = dictionary.len();
    let mut class_rows = vec![0usize; classes];
    let mut class_correct = vec![0usize; classes];
    let mut class_log_loss = vec![0.0f64; classes];
    let mut total = 0usize;

    view.for_each_row(&mut |row| {
        // Rows can come from host-supplied views, so the key range and
        // vector length are re-checked per row rather than assumed.
        let truth = row.key_at(label_index)? as usize;
        if truth >= classes {
            return Err(Error::SchemaMismatch(format!(
                "Label ordinal {} out of range for a dictionary of {} classes",
                truth, classes
            )));
        }
        let probabilities = row.vector_at(probability_index)?;
        let p_raw = probabilities.get(truth).copied().ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "Probability vector has {} entries but the label dictionary has {} classes",
                probabilities.len(),
                classes
            ))
        })?;

        let predicted = argmax(probabilities);
        let p_truth = f64::from(p_raw).clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP);

        total += 1;
        class_rows[truth] += 1;
        if predicted == truth {
            class_correct[truth] += 1;
        }
        class_log_loss[truth] -= p_truth.ln();
        Ok(())
    })?;

    if total == 0 {
        return Err(Error::InvalidConfiguration(
            "Cannot evaluate over an empty view".to_string(),
        ));
    }

    let per_class: Vec<ClassSummary> = (0..classes)
        .filter(|&c| class_rows[c] > 0)
        .map(|c| ClassSummary {
            label: dictionary[c].clone(),
            rows: class_rows[c],
            accuracy: class_correct[c] as f64 / class_rows[c] as f64,
            log_loss: class_log_loss[c] / class_rows[c] as f64,
        })
        .collect();

    let micro_accuracy = class_correct.iter().sum::<usize>() as f64 / total as f64;
    let macro_accuracy =
        per_class.iter().map(|c| c.accuracy).sum::<f64>() / per_class.len() as f64;
    let log_loss = class_log_loss.iter().sum::<f64>() / total as f64;

    debug!(rows = total, micro_accuracy, "multiclass evaluation complete");

    Ok(MulticlassClassificationMetrics {
        micro_accuracy,
        macro_accuracy,
        log_loss,
        per_class,
    })
}

/// Index of the largest probability; the first wins on ties
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = index;
        }
    }
    best
}
