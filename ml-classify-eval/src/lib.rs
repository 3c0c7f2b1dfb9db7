//! Classification metrics over scored row views
//!
//! Evaluation consumes the output view of a fitted pipeline: a label
//! column plus the probability column the trainer appended. Binary
//! evaluation reads a boolean label and a positive-class probability;
//! multiclass evaluation reads a key label and a per-class probability
//! vector.

#![warn(missing_docs)]

pub mod binary;
pub mod multiclass;

pub use binary::{evaluate_binary, BinaryClassificationMetrics};
pub use multiclass::{evaluate_multiclass, ClassSummary, MulticlassClassificationMetrics};
