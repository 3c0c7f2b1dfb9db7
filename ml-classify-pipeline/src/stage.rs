//! Estimator and fitted-stage traits for transform stages

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ml_classify_core::view::RowVisitor;
use ml_classify_core::{CacheView, DataView, Result, Row, Schema, ViewRef};

/// An unfit transform stage: an immutable specification that can be fit
/// against a training view
///
/// Stages that need global statistics perform one full pass over the view
/// during [`Estimator::fit`] and freeze the result into the returned
/// fitted stage; statistics are never recomputed afterwards.
pub trait Estimator: Send + Sync {
    /// Name of this stage, used in error and log context
    fn name(&self) -> &str;

    /// Input columns this stage declares it requires
    ///
    /// The pipeline checks these against the cumulative schema before
    /// fitting, so a missing column fails fast rather than per row.
    fn input_columns(&self) -> Vec<String>;

    /// Fit this stage against the cumulative output view of all prior
    /// stages
    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>>;
}

/// A fitted transform stage: frozen parameters plus a pure row mapping
///
/// The mapping appends this stage's output columns after the input
/// columns; the same input row always yields the same output row,
/// independent of call order.
pub trait FittedStage: Send + Sync {
    /// Name of this stage
    fn name(&self) -> &str;

    /// Schema of the rows this stage produces (input columns followed by
    /// this stage's output columns)
    fn output_schema(&self) -> Arc<Schema>;

    /// Map one input row into the caller-supplied output row
    ///
    /// The output row is cleared and refilled, so a caller in a tight
    /// loop can reuse one scratch row across calls.
    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()>;

    /// Whether this stage materializes its input instead of mapping rows
    fn caches(&self) -> bool {
        false
    }

    /// Frozen state of this stage for persistence
    fn state(&self) -> Result<StageState>;
}

/// Persisted specification of one fitted stage
///
/// Custom mappings and trainer plugins cannot carry executable code into
/// the artifact; they persist a contract name (or plugin kind) that the
/// loading process re-binds through a resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageState {
    /// Column concatenation into one float vector
    Concat {
        /// Output column name
        output: String,
        /// Input column names, in concatenation order
        inputs: Vec<String>,
    },

    /// Mean/variance normalization with frozen statistics
    Normalize {
        /// Input column name
        input: String,
        /// Output column name
        output: String,
        /// Frozen per-slot means
        means: Vec<f32>,
        /// Frozen per-slot standard deviations
        stds: Vec<f32>,
    },

    /// Text-to-key mapping with its frozen dictionary
    ValueToKey {
        /// Input column name
        input: String,
        /// Output column name
        output: String,
        /// Frozen value dictionary, ordered by value
        dictionary: Vec<String>,
    },

    /// Key-to-text mapping; the dictionary is read from the input
    /// column's key type at load time
    KeyToValue {
        /// Input column name
        input: String,
        /// Output column name
        output: String,
    },

    /// Custom mapping identified by contract name only
    CustomMapping {
        /// Contract name re-bound by the loading process
        contract: String,
    },

    /// Cache checkpoint
    Cache,

    /// Opaque trainer plugin state
    Plugin {
        /// Plugin kind re-bound by the loading process
        kind: String,
        /// Serialized plugin model
        payload: Vec<u8>,
    },
}

/// Build the lazy output view of a fitted stage over an upstream view
///
/// Cache checkpoints become a materializing [`CacheView`]; every other
/// stage becomes a per-pass row-mapping view.
pub fn apply_stage(stage: Arc<dyn FittedStage>, upstream: ViewRef) -> ViewRef {
    if stage.caches() {
        Arc::new(CacheView::new(upstream))
    } else {
        Arc::new(StageView { upstream, stage })
    }
}

/// Lazy view applying one fitted stage to each upstream row
///
/// Derived rows are recomputed on every pass; a pass reuses one scratch
/// row for all of its rows.
struct StageView {
    upstream: ViewRef,
    stage: Arc<dyn FittedStage>,
}

impl DataView for StageView {
    fn schema(&self) -> Arc<Schema> {
        self.stage.output_schema()
    }

    fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()> {
        let mut scratch = Row::empty();
        self.upstream.for_each_row(&mut |row| {
            self.stage.map_into(row, &mut scratch)?;
            visitor(&scratch)
        })
    }

    fn row_count_hint(&self) -> Option<usize> {
        self.upstream.row_count_hint()
    }
}
