//! Low-latency single-row inference over a fitted pipeline

use std::sync::Arc;

use ml_classify_core::{Result, Row, Schema};

use crate::pipeline::FittedPipeline;
use crate::stage::FittedStage;

/// Single-row prediction engine wrapping a fitted pipeline
///
/// Runs the same per-stage mapping logic as the batch path, but over one
/// row at a time, ping-ponging between two owned scratch rows so the row
/// containers are reused across calls in a tight loop.
///
/// `predict` takes `&mut self`: one engine serves one caller at a time.
/// Give each concurrent caller its own engine instance instead of sharing
/// one behind a lock.
pub struct PredictionEngine {
    stages: Vec<Arc<dyn FittedStage>>,
    input_schema: Arc<Schema>,
    output_schema: Arc<Schema>,
    scratch_in: Row,
    scratch_out: Row,
}

impl PredictionEngine {
    /// Create an engine over a fitted pipeline
    pub fn new(pipeline: &FittedPipeline) -> Self {
        Self {
            stages: pipeline.stages().to_vec(),
            input_schema: pipeline.input_schema(),
            output_schema: pipeline.output_schema(),
            scratch_in: Row::empty(),
            scratch_out: Row::empty(),
        }
    }

    /// Schema of the rows this engine accepts
    pub fn input_schema(&self) -> Arc<Schema> {
        self.input_schema.clone()
    }

    /// Schema of the rows this engine produces
    pub fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    /// Score a single row
    ///
    /// Produces output identical to running the same row through the
    /// batch transform path. The returned reference points into the
    /// engine's scratch buffer and is valid until the next call.
    pub fn predict(&mut self, row: &Row) -> Result<&Row> {
        row.conforms_to(&self.input_schema)?;

        self.scratch_in.reset_from(row);
        for stage in &self.stages {
            stage.map_into(&self.scratch_in, &mut self.scratch_out)?;
            std::mem::swap(&mut self.scratch_in, &mut self.scratch_out);
        }

        Ok(&self.scratch_in)
    }
}
