//! Data views: restartable, lazily-evaluated logical tables

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::Result;
use crate::row::Row;
use crate::schema::Schema;

/// Visitor invoked once per row during a traversal
pub type RowVisitor<'a> = dyn FnMut(&Row) -> Result<()> + 'a;

/// A restartable, lazily-evaluated sequence of rows with a fixed schema
///
/// Every call to [`DataView::for_each_row`] performs an independent full
/// pass; derived views recompute their rows per pass unless a
/// [`CacheView`] checkpoint materializes them. Views never mutate their
/// upstream view.
pub trait DataView: Send + Sync {
    /// Get the schema of this view
    fn schema(&self) -> Arc<Schema>;

    /// Perform one full traversal, invoking the visitor once per row
    ///
    /// A visitor error aborts the traversal and fails the whole pass.
    fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()>;

    /// Provides a hint about the total number of rows (if known)
    fn row_count_hint(&self) -> Option<usize> {
        None
    }
}

/// Shared reference to a data view
pub type ViewRef = Arc<dyn DataView>;

/// Collect all rows of a view into memory
pub fn collect_rows(view: &dyn DataView) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    view.for_each_row(&mut |row| {
        rows.push(row.clone());
        Ok(())
    })?;
    Ok(rows)
}

/// Count the rows of a view with a full traversal
pub fn count_rows(view: &dyn DataView) -> Result<usize> {
    let mut count = 0;
    view.for_each_row(&mut |_| {
        count += 1;
        Ok(())
    })?;
    Ok(count)
}

/// An in-memory view over owned rows
pub struct MemoryView {
    /// The schema of the view
    schema: Arc<Schema>,

    /// The owned rows
    rows: Vec<Row>,
}

impl MemoryView {
    /// Create a view over rows, validating each against the schema
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Result<Self> {
        for row in &rows {
            row.conforms_to(&schema)?;
        }

        Ok(Self { schema, rows })
    }

    /// Get the rows in this view
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl DataView for MemoryView {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()> {
        for row in &self.rows {
            visitor(row)?;
        }
        Ok(())
    }

    fn row_count_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }
}

/// A cache checkpoint: materializes its upstream view once, on first
/// traversal, so expensive upstream stages run exactly once per row no
/// matter how many passes follow
///
/// The snapshot is write-once/read-many: at most one materialization pass
/// runs per view instance; concurrent traversals block until it completes
/// and then read the materialized snapshot.
pub struct CacheView {
    /// The upstream view being materialized
    upstream: ViewRef,

    /// The materialized snapshot, filled on first traversal
    cache: Mutex<Option<Arc<Vec<Row>>>>,
}

impl CacheView {
    /// Create a cache checkpoint over an upstream view
    pub fn new(upstream: ViewRef) -> Self {
        Self {
            upstream,
            cache: Mutex::new(None),
        }
    }

    /// Whether the snapshot has been materialized yet
    pub fn is_materialized(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<Vec<Row>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Result<Arc<Vec<Row>>> {
        let mut guard = self.lock();
        if let Some(rows) = guard.as_ref() {
            return Ok(rows.clone());
        }

        let rows = Arc::new(collect_rows(self.upstream.as_ref())?);
        debug!(rows = rows.len(), "materialized cache checkpoint");
        *guard = Some(rows.clone());
        Ok(rows)
    }
}

impl DataView for CacheView {
    fn schema(&self) -> Arc<Schema> {
        self.upstream.schema()
    }

    fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()> {
        let rows = self.snapshot()?;
        for row in rows.iter() {
            visitor(row)?;
        }
        Ok(())
    }

    fn row_count_hint(&self) -> Option<usize> {
        match self.lock().as_ref() {
            Some(rows) => Some(rows.len()),
            None => self.upstream.row_count_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::row::Value;
    use crate::schema::{DataType, Field};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn float_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![Field::new("x", DataType::Float32)]).unwrap())
    }

    fn float_view(values: &[f32]) -> MemoryView {
        let rows = values.iter().map(|&v| Row::new(vec![Value::Float(v)])).collect();
        MemoryView::new(float_schema(), rows).unwrap()
    }

    /// Counts how many rows it has produced across all passes
    struct CountingView {
        inner: MemoryView,
        rows_produced: AtomicUsize,
    }

    impl DataView for CountingView {
        fn schema(&self) -> Arc<Schema> {
            self.inner.schema()
        }

        fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()> {
            self.inner.for_each_row(&mut |row| {
                self.rows_produced.fetch_add(1, Ordering::Relaxed);
                visitor(row)
            })
        }
    }

    #[test]
    fn test_memory_view_validates_rows() {
        let bad = Row::new(vec![Value::Bool(true)]);
        let result = MemoryView::new(float_schema(), vec![bad]);

        assert!(matches!(result, Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_traversal_is_restartable() {
        let view = float_view(&[1.0, 2.0, 3.0]);

        let first = collect_rows(&view).unwrap();
        let second = collect_rows(&view).unwrap();

        assert_eq!(first, second);
        assert_eq!(count_rows(&view).unwrap(), 3);
    }

    #[test]
    fn test_visitor_error_aborts_pass() {
        let view = float_view(&[1.0, 2.0, 3.0]);

        let mut seen = 0;
        let result = view.for_each_row(&mut |_| {
            seen += 1;
            if seen == 2 {
                Err(Error::SchemaMismatch("boom".into()))
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_cache_view_materializes_once() {
        let counting = Arc::new(CountingView {
            inner: float_view(&[1.0, 2.0, 3.0, 4.0]),
            rows_produced: AtomicUsize::new(0),
        });

        let cached = CacheView::new(counting.clone());
        assert!(!cached.is_materialized());

        let first = collect_rows(&cached).unwrap();
        let second = collect_rows(&cached).unwrap();
        let third = collect_rows(&cached).unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert!(cached.is_materialized());
        // Upstream rows were produced during exactly one pass
        assert_eq!(counting.rows_produced.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_concurrent_traversals_share_one_snapshot() {
        let counting = Arc::new(CountingView {
            inner: float_view(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            rows_produced: AtomicUsize::new(0),
        });
        let cached = Arc::new(CacheView::new(counting.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let view = cached.clone();
                std::thread::spawn(move || collect_rows(view.as_ref()).unwrap())
            })
            .collect();

        let results: Vec<Vec<Row>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for rows in &results {
            assert_eq!(rows, &results[0]);
            assert_eq!(rows.len(), 5);
        }

        // Racing traversals block on the materialization instead of
        // re-running the upstream pass
        assert_eq!(counting.rows_produced.load(Ordering::Relaxed), 5);
    }
}
