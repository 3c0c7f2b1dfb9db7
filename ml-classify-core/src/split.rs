//! Deterministic train/test partitioning of a data view

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::view::{DataView, RowVisitor, ViewRef};

/// Which half of a split a view exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitSide {
    Train,
    Test,
}

/// Split a view into disjoint train and test views
///
/// Each row is assigned independently by a pseudo-random draw keyed by
/// `(seed, row position)`, so repeated splits with the same arguments over
/// the same view produce identical partitions, and the test share only
/// approximates `test_fraction`. The returned views are lazy: they
/// re-traverse the upstream view on every pass.
pub fn train_test_split(view: &ViewRef, test_fraction: f64, seed: u64) -> Result<(ViewRef, ViewRef)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::InvalidConfiguration(format!(
            "Test fraction must lie strictly between 0 and 1, got {}",
            test_fraction
        )));
    }

    debug!(test_fraction, seed, "splitting view into train and test");

    let train = SplitView {
        upstream: view.clone(),
        test_fraction,
        seed,
        side: SplitSide::Train,
    };
    let test = SplitView {
        upstream: view.clone(),
        test_fraction,
        seed,
        side: SplitSide::Test,
    };

    Ok((Arc::new(train), Arc::new(test)))
}

/// Lazy view over one side of a train/test partition
struct SplitView {
    upstream: ViewRef,
    test_fraction: f64,
    seed: u64,
    side: SplitSide,
}

fn assigned_to_test(seed: u64, position: u64, test_fraction: f64) -> bool {
    // Position-keyed so the assignment of a row depends only on the seed
    // and where the row sits in the upstream view.
    let mut rng = StdRng::seed_from_u64(seed ^ position.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    rng.random::<f64>() < test_fraction
}

impl DataView for SplitView {
    fn schema(&self) -> Arc<Schema> {
        self.upstream.schema()
    }

    fn for_each_row(&self, visitor: &mut RowVisitor<'_>) -> Result<()> {
        let mut position: u64 = 0;
        self.upstream.for_each_row(&mut |row| {
            let test = assigned_to_test(self.seed, position, self.test_fraction);
            position += 1;

            let keep = match self.side {
                SplitSide::Train => !test,
                SplitSide::Test => test,
            };
            if keep {
                visitor(row)?;
            }
            Ok(())
        })
    }
}
