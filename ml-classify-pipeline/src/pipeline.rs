//! Ordered composition of estimators into one fit-able unit

use std::sync::Arc;

use tracing::{debug, info};

use ml_classify_core::{Error, Result, Schema, ViewRef};

use crate::stage::{apply_stage, Estimator, FittedStage};

/// An unfit pipeline: an ordered sequence of stage specifications
///
/// Fitting executes each specification against the cumulative output view
/// of all prior stages, in declaration order, and freezes any
/// data-dependent statistics.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Estimator>>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage specification
    pub fn append(mut self, estimator: impl Estimator + 'static) -> Self {
        self.stages.push(Box::new(estimator));
        self
    }

    /// Number of stage specifications
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if this pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Fit every stage against the training view
    ///
    /// Each stage's declared input columns are validated against the
    /// cumulative schema before that stage fits, so a missing column
    /// aborts the whole fit rather than failing per row.
    pub fn fit(&self, view: &ViewRef) -> Result<FittedPipeline> {
        let input_schema = view.schema();
        let mut current = view.clone();
        let mut stages: Vec<Arc<dyn FittedStage>> = Vec::with_capacity(self.stages.len());

        for estimator in &self.stages {
            let schema = current.schema();
            for column in estimator.input_columns() {
                if !schema.contains(&column) {
                    return Err(Error::PipelineSchema {
                        stage: estimator.name().to_string(),
                        column,
                    });
                }
            }

            debug!(stage = estimator.name(), "fitting pipeline stage");
            let fitted = estimator.fit(&current)?;
            current = apply_stage(fitted.clone(), current);
            stages.push(fitted);
        }

        info!(stages = stages.len(), "pipeline fitted");

        Ok(FittedPipeline {
            input_schema,
            stages,
        })
    }
}

/// A fitted pipeline: frozen stages applied lazily in fit order
///
/// Immutable and reusable across any number of transform or prediction
/// calls.
pub struct FittedPipeline {
    input_schema: Arc<Schema>,
    stages: Vec<Arc<dyn FittedStage>>,
}

impl FittedPipeline {
    /// Reassemble a fitted pipeline from its parts (used when loading a
    /// persisted artifact)
    pub(crate) fn from_parts(input_schema: Arc<Schema>, stages: Vec<Arc<dyn FittedStage>>) -> Self {
        Self {
            input_schema,
            stages,
        }
    }

    /// Schema the pipeline was fitted against
    pub fn input_schema(&self) -> Arc<Schema> {
        self.input_schema.clone()
    }

    /// Schema of the rows the pipeline produces
    pub fn output_schema(&self) -> Arc<Schema> {
        self.stages
            .last()
            .map(|s| s.output_schema())
            .unwrap_or_else(|| self.input_schema.clone())
    }

    /// The frozen stages, in fit order
    pub fn stages(&self) -> &[Arc<dyn FittedStage>] {
        &self.stages
    }

    /// Apply every frozen stage lazily, row by row, in fit order
    ///
    /// The view's schema must match the schema the pipeline was fitted
    /// against.
    pub fn transform(&self, view: &ViewRef) -> Result<ViewRef> {
        if view.schema().as_ref() != self.input_schema.as_ref() {
            return Err(Error::SchemaMismatch(
                "View schema does not match the schema the pipeline was fitted against".to_string(),
            ));
        }

        let mut current = view.clone();
        for stage in &self.stages {
            current = apply_stage(stage.clone(), current);
        }
        Ok(current)
    }
}
