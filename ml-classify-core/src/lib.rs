//! Core data model for composable classification pipelines
//!
//! This crate provides the foundational pieces the pipeline, evaluation and
//! persistence layers build upon: typed column schemas, rows, restartable
//! data views, the cache checkpoint, and deterministic train/test
//! splitting.

#![warn(missing_docs)]

pub mod error;
pub mod row;
pub mod schema;
pub mod split;
pub mod view;

// Re-export key types for convenience
pub use error::{Error, Result};
pub use row::{Row, Value};
pub use schema::{DataType, Field, Schema};
pub use split::train_test_split;
pub use view::{collect_rows, count_rows, CacheView, DataView, MemoryView, RowVisitor, ViewRef};
