//! Cache checkpoint stage

use std::sync::Arc;

use ml_classify_core::{Result, Row, Schema, ViewRef};

use crate::stage::{Estimator, FittedStage, StageState};

/// Inserts a materializing checkpoint into the pipeline
///
/// Downstream passes read the materialized snapshot, so expensive
/// upstream stages are evaluated exactly once per row regardless of how
/// many traversals follow (fit, evaluate, save). In the single-row
/// prediction path the checkpoint degenerates to an identity mapping.
pub struct CacheCheckpoint;

impl Estimator for CacheCheckpoint {
    fn name(&self) -> &str {
        "cache"
    }

    fn input_columns(&self) -> Vec<String> {
        Vec::new()
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        Ok(Arc::new(CacheStage {
            schema: view.schema(),
        }))
    }
}

/// Fitted cache checkpoint
pub struct CacheStage {
    schema: Arc<Schema>,
}

impl CacheStage {
    /// Rebuild the stage for the given input schema
    pub fn from_schema(schema: &Arc<Schema>) -> Self {
        Self {
            schema: schema.clone(),
        }
    }
}

impl FittedStage for CacheStage {
    fn name(&self) -> &str {
        "cache"
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);
        Ok(())
    }

    fn caches(&self) -> bool {
        true
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::Cache)
    }
}
