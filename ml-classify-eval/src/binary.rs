//! Binary classification metrics

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ml_classify_core::{Error, Result, ViewRef};

/// Probabilities are clamped away from 0 and 1 so log loss stays finite
const PROBABILITY_CLAMP: f64 = 1e-15;

/// Decision threshold for the derived hard prediction
const DECISION_THRESHOLD: f64 = 0.5;

/// Aggregate quality metrics for a binary classifier
///
/// Computed from ground-truth boolean labels and calibrated positive-class
/// probabilities; the hard prediction is `probability >= 0.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryClassificationMetrics {
    /// Fraction of rows where the hard prediction equals the label
    pub accuracy: f64,

    /// Area under the ROC curve, trapezoidal
    pub auc: f64,

    /// Area under the precision-recall curve, trapezoidal
    pub auprc: f64,

    /// F1 score of the positive class at the decision threshold
    pub f1_score: f64,

    /// Mean negative log-likelihood of the labels under the predicted
    /// probabilities
    pub log_loss: f64,

    /// Relative improvement of `log_loss` over always predicting the
    /// label prior
    pub log_loss_reduction: f64,

    /// Precision of the positive class
    pub positive_precision: f64,

    /// Recall of the positive class
    pub positive_recall: f64,

    /// Precision of the negative class
    pub negative_precision: f64,

    /// Recall of the negative class
    pub negative_recall: f64,
}

impl fmt::Display for BinaryClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy:          {:.4}", self.accuracy)?;
        writeln!(f, "AUC:               {:.4}", self.auc)?;
        writeln!(f, "AUPRC:             {:.4}", self.auprc)?;
        writeln!(f, "F1 score:          {:.4}", self.f1_score)?;
        writeln!(f, "Log loss:          {:.4}", self.log_loss)?;
        writeln!(f, "Log loss redu.:    {:.4}", self.log_loss_reduction)?;
        writeln!(f, "Precision (+/-):   {:.4} / {:.4}", self.positive_precision, self.negative_precision)?;
        write!(f, "Recall (+/-):      {:.4} / {:.4}", self.positive_recall, self.negative_recall)
    }
}

/// Compute binary metrics over a scored view
///
/// `label_column` must hold booleans and `probability_column` the
/// positive-class probability. The view must contain at least one row of
/// each class, otherwise ranking metrics are undefined and an
/// `InvalidConfiguration` error is returned.
pub fn evaluate_binary(
    view: &ViewRef,
    label_column: &str,
    probability_column: &str,
) -> Result<BinaryClassificationMetrics> {
    let schema = view.schema();
    let label_index = schema.index_of(label_column)?;
    let probability_index = schema.index_of(probability_column)?;

    let mut samples: Vec<(bool, f64)> = Vec::new();
    view.for_each_row(&mut |row| {
        samples.push((
            row.bool_at(label_index)?,
            f64::from(row.float_at(probability_index)?),
        ));
        Ok(())
    })?;

    let positives = samples.iter().filter(|(label, _)| *label).count();
    let negatives = samples.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "Binary evaluation requires both classes; got {} positive and {} negative rows",
            positives, negatives
        )));
    }

    let mut true_positives = 0usize;
    let mut false_positives = 0usize;
    let mut true_negatives = 0usize;
    let mut false_negatives = 0usize;
    let mut log_loss_sum = 0.0f64;

    for &(label, probability) in &samples {
        let p = probability.clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP);
        log_loss_sum -= if label { p.ln() } else { (1.0 - p).ln() };

        match (label, probability >= DECISION_THRESHOLD) {
            (true, true) => true_positives += 1,
            (true, false) => false_negatives += 1,
            (false, true) => false_positives += 1,
            (false, false) => true_negatives += 1,
        }
    }

    let total = samples.len() as f64;
    let accuracy = (true_positives + true_negatives) as f64 / total;
    let log_loss = log_loss_sum / total;

    // Log loss of always predicting the label prior
    let prior = positives as f64 / total;
    let prior_entropy = -(prior * prior.ln() + (1.0 - prior) * (1.0 - prior).ln());
    let log_loss_reduction = (prior_entropy - log_loss) / prior_entropy;

    let positive_precision = safe_ratio(true_positives, true_positives + false_positives);
    let positive_recall = true_positives as f64 / positives as f64;
    let negative_precision = safe_ratio(true_negatives, true_negatives + false_negatives);
    let negative_recall = true_negatives as f64 / negatives as f64;
    let f1_score = if positive_precision + positive_recall > 0.0 {
        2.0 * positive_precision * positive_recall / (positive_precision + positive_recall)
    } else {
        0.0
    };

    let (auc, auprc) = ranking_areas(&mut samples, positives, negatives);

    debug!(rows = samples.len(), accuracy, auc, "binary evaluation complete");

    Ok(BinaryClassificationMetrics {
        accuracy,
        auc,
        auprc,
        f1_score,
        log_loss,
        log_loss_reduction,
        positive_precision,
        positive_recall,
        negative_precision,
        negative_recall,
    })
}

fn safe_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Trapezoidal areas under the ROC and precision-recall curves
///
/// Rows tied on probability are folded into one curve point so ties do
/// not depend on input order.
fn ranking_areas(samples: &mut [(bool, f64)], positives: usize, negatives: usize) -> (f64, f64) {
    samples.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut true_positives = 0usize;
    let mut false_positives = 0usize;

    let mut prev_fpr = 0.0f64;
    let mut prev_tpr = 0.0f64;
    let mut prev_recall = 0.0f64;
    let mut prev_precision = 1.0f64;
    let mut auc = 0.0f64;
    let mut auprc = 0.0f64;

    let mut index = 0;
    while index < samples.len() {
        // Consume the whole tie group at this probability
        let probability = samples[index].1;
        while index < samples.len() && samples[index].1 == probability {
            if samples[index].0 {
                true_positives += 1;
            } else {
                false_positives += 1;
            }
            index += 1;
        }

        let tpr = true_positives as f64 / positives as f64;
        let fpr = false_positives as f64 / negatives as f64;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;

        let recall = tpr;
        let precision =
            true_positives as f64 / (true_positives + false_positives) as f64;
        auprc += (recall - prev_recall) * (precision + prev_precision) / 2.0;

        prev_fpr = fpr;
        prev_tpr = tpr;
        prev_recall = recall;
        prev_precision = precision;
    }

    (auc, auprc)
}
