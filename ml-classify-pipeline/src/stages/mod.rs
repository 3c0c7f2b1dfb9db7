//! Built-in transform stages
//!
//! Each stage comes in two halves: an [`Estimator`](crate::Estimator)
//! specification and the frozen [`FittedStage`](crate::FittedStage) it
//! produces. Stages append their output columns after the input columns.

mod cache;
mod concat;
mod key;
mod normalize;

pub use cache::{CacheCheckpoint, CacheStage};
pub use concat::{ColumnConcatenator, ConcatStage};
pub use key::{KeyToValueMapper, KeyToValueStage, ValueToKeyMapper, ValueToKeyStage};
pub use normalize::{MeanVarianceNormalizer, NormalizeStage};
