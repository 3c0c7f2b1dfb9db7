//! Composable transform pipelines over row views
//!
//! A [`Pipeline`] is an ordered sequence of estimators. Fitting freezes
//! each stage's data-dependent statistics in order, producing a
//! [`FittedPipeline`] whose stages map rows lazily: batch transforms go
//! through views, single rows through a [`PredictionEngine`]. Fitted
//! pipelines persist to a bincode artifact via [`store::save`] and come
//! back through [`store::load`], with custom mappings and trainer
//! plugins re-bound by contract name through a
//! [`store::StageResolver`].
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = Pipeline::new()
//!     .append(ColumnConcatenator::new("features", &["height", "weight"]))
//!     .append(MeanVarianceNormalizer::new("features", "features_norm"))
//!     .append(my_trainer);
//! let fitted = pipeline.fit(&train_view)?;
//! let scored = fitted.transform(&test_view)?;
//! ```

#![warn(missing_docs)]

pub mod custom;
pub mod pipeline;
pub mod predict;
pub mod stage;
pub mod stages;
pub mod store;
pub mod trainer;

#[cfg(test)]
mod testing;

pub use custom::{CustomMapping, CustomMappingStage, MapFn, MappingObserver, MappingRegistry};
pub use pipeline::{FittedPipeline, Pipeline};
pub use predict::PredictionEngine;
pub use stage::{apply_stage, Estimator, FittedStage, StageState};
pub use stages::{
    CacheCheckpoint, CacheStage, ColumnConcatenator, ConcatStage, KeyToValueMapper,
    KeyToValueStage, MeanVarianceNormalizer, NormalizeStage, ValueToKeyMapper, ValueToKeyStage,
};
pub use store::{load, save, PluginLoader, StageResolver};
