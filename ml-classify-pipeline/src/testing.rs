//! Shared test fixtures: a tiny decision-tree trainer and a synthetic
//! height/weight dataset

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ml_classify_core::{
    DataType, DataView, Error, Field, MemoryView, Result, Row, Schema, Value, ViewRef,
};

use crate::stage::{Estimator, FittedStage, StageState};
use crate::store::StageResolver;
use crate::trainer::{
    decode_plugin_payload, encode_plugin_state, PREDICTED_LABEL_COLUMN, PROBABILITY_COLUMN,
    SCORE_COLUMN,
};

/// Plugin kind the shallow tree persists under
pub const SHALLOW_TREE_KIND: &str = "shallow-tree";

const LEAF_PROBABILITY_CLAMP: f32 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn probability_for(&self, features: &[f32]) -> f32 {
        match self {
            TreeNode::Leaf { probability } => *probability,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let side = if features[*feature] <= *threshold {
                    left
                } else {
                    right
                };
                side.probability_for(features)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ShallowTreeModel {
    features_column: String,
    root: TreeNode,
}

fn positive_fraction(samples: &[(Vec<f32>, bool)]) -> f32 {
    let positives = samples.iter().filter(|(_, label)| *label).count();
    positives as f32 / samples.len() as f32
}

fn gini(samples: &[(Vec<f32>, bool)]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let p = positive_fraction(samples);
    2.0 * p * (1.0 - p)
}

/// Greedy gini split over every feature and every midpoint between
/// adjacent distinct values
fn best_split(samples: &[(Vec<f32>, bool)]) -> Option<(usize, f32)> {
    let feature_count = samples.first().map(|(f, _)| f.len())?;
    let mut best: Option<(usize, f32, f32)> = None;

    for feature in 0..feature_count {
        let mut values: Vec<f32> = samples.iter().map(|(f, _)| f[feature]).collect();
        values.sort_by(f32::total_cmp);
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left, right): (Vec<_>, Vec<_>) = samples
                .iter()
                .cloned()
                .partition(|(f, _)| f[feature] <= threshold);

            let weighted = (left.len() as f32 * gini(&left) + right.len() as f32 * gini(&right))
                / samples.len() as f32;
            if best.map_or(true, |(_, _, score)| weighted < score) {
                best = Some((feature, threshold, weighted));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn build_tree(samples: &[(Vec<f32>, bool)], depth: u32) -> TreeNode {
    if depth == 0 || gini(samples) == 0.0 {
        return TreeNode::Leaf {
            probability: positive_fraction(samples),
        };
    }

    match best_split(samples) {
        Some((feature, threshold)) => {
            let (left, right): (Vec<_>, Vec<_>) = samples
                .iter()
                .cloned()
                .partition(|(f, _)| f[feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                return TreeNode::Leaf {
                    probability: positive_fraction(samples),
                };
            }
            TreeNode::Split {
                feature,
                threshold,
                left: Box::new(build_tree(&left, depth - 1)),
                right: Box::new(build_tree(&right, depth - 1)),
            }
        }
        None => TreeNode::Leaf {
            probability: positive_fraction(samples),
        },
    }
}

/// Depth-two greedy decision tree over one feature-vector column
///
/// Deliberately minimal: just enough signal to exercise trainer-shaped
/// stages (score, probability and predicted-label outputs, opaque plugin
/// persistence) in tests.
pub struct ShallowTreeTrainer {
    features_column: String,
    label_column: String,
}

impl ShallowTreeTrainer {
    pub fn new(features_column: &str, label_column: &str) -> Self {
        Self {
            features_column: features_column.to_string(),
            label_column: label_column.to_string(),
        }
    }
}

impl Estimator for ShallowTreeTrainer {
    fn name(&self) -> &str {
        SHALLOW_TREE_KIND
    }

    fn input_columns(&self) -> Vec<String> {
        vec![self.features_column.clone(), self.label_column.clone()]
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        let schema = view.schema();
        let features_index = schema.index_of(&self.features_column)?;
        let label_index = schema.index_of(&self.label_column)?;

        let mut samples: Vec<(Vec<f32>, bool)> = Vec::new();
        view.for_each_row(&mut |row| {
            samples.push((
                row.vector_at(features_index)?.to_vec(),
                row.bool_at(label_index)?,
            ));
            Ok(())
        })?;
        if samples.is_empty() {
            return Err(Error::InvalidConfiguration(
                "Cannot fit a tree on an empty view".to_string(),
            ));
        }

        let model = ShallowTreeModel {
            features_column: self.features_column.clone(),
            root: build_tree(&samples, 2),
        };
        Ok(Arc::new(ShallowTreeStage::from_model(&schema, model)?))
    }
}

/// Fitted shallow tree, appending score, probability and predicted label
pub struct ShallowTreeStage {
    model: ShallowTreeModel,
    features_index: usize,
    output_schema: Arc<Schema>,
}

impl ShallowTreeStage {
    fn from_model(schema: &Arc<Schema>, model: ShallowTreeModel) -> Result<Self> {
        let features_index = schema.index_of(&model.features_column)?;
        let output_schema = Arc::new(schema.with_appended(vec![
            Field::new(SCORE_COLUMN, DataType::Float32),
            Field::new(PROBABILITY_COLUMN, DataType::Float32),
            Field::new(PREDICTED_LABEL_COLUMN, DataType::Boolean),
        ])?);
        Ok(Self {
            model,
            features_index,
            output_schema,
        })
    }
}

impl FittedStage for ShallowTreeStage {
    fn name(&self) -> &str {
        SHALLOW_TREE_KIND
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        let features = input.vector_at(self.features_index)?;
        let probability = self
            .model
            .root
            .probability_for(features)
            .clamp(LEAF_PROBABILITY_CLAMP, 1.0 - LEAF_PROBABILITY_CLAMP);
        let score = (probability / (1.0 - probability)).ln();

        output.push(Value::Float(score));
        output.push(Value::Float(probability));
        output.push(Value::Bool(probability >= 0.5));
        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        encode_plugin_state(SHALLOW_TREE_KIND, &self.model)
    }
}

/// Register the shallow tree's plugin loader with a resolver
pub fn register_shallow_tree(resolver: &mut StageResolver) {
    resolver
        .register_plugin(
            SHALLOW_TREE_KIND,
            Arc::new(|payload, schema| {
                let model: ShallowTreeModel = decode_plugin_payload(payload)?;
                Ok(Arc::new(ShallowTreeStage::from_model(schema, model)?) as _)
            }),
        )
        .unwrap();
}

fn stature_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(vec![
            Field::new("height", DataType::Float32),
            Field::new("weight", DataType::Float32),
            Field::new("label", DataType::Boolean),
        ])
        .unwrap(),
    )
}

fn stature_row(h: f32, w: f32) -> Row {
    let label = h >= 170.0 && w < 120.0;
    Row::new(vec![Value::Float(h), Value::Float(w), Value::Bool(label)])
}

/// Height/weight classification fixture: 108 rows over a 6x6 value grid,
/// three copies of each combination so every grid value lands in both
/// sides of any reasonable split
pub fn stature_view() -> ViewRef {
    let schema = stature_schema();

    let heights = [150.0f32, 160.0, 169.0, 170.0, 180.0, 195.0];
    let weights = [70.0f32, 90.0, 119.0, 120.0, 150.0, 200.0];

    let mut rows = Vec::with_capacity(heights.len() * weights.len() * 3);
    for _ in 0..3 {
        for &h in &heights {
            for &w in &weights {
                rows.push(stature_row(h, w));
            }
        }
    }

    Arc::new(MemoryView::new(schema, rows).unwrap())
}

/// Twenty-row stature fixture: five copies of four height/weight
/// combinations cycling through positions, so every combination lands on
/// both sides of a seeded split
pub fn small_stature_view() -> ViewRef {
    let combos = [
        (180.0f32, 100.0f32),
        (160.0, 100.0),
        (180.0, 150.0),
        (160.0, 150.0),
    ];

    let rows = (0..20)
        .map(|i| {
            let (h, w) = combos[i % combos.len()];
            stature_row(h, w)
        })
        .collect();

    Arc::new(MemoryView::new(stature_schema(), rows).unwrap())
}

/// Fraction of rows where the predicted label equals the ground truth
pub fn accuracy_against(view: &dyn DataView, label_column: &str, predicted_column: &str) -> f64 {
    let schema = view.schema();
    let label_index = schema.index_of(label_column).unwrap();
    let predicted_index = schema.index_of(predicted_column).unwrap();

    let mut total = 0usize;
    let mut correct = 0usize;
    view.for_each_row(&mut |row| {
        total += 1;
        if row.bool_at(label_index)? == row.bool_at(predicted_index)? {
            correct += 1;
        }
        Ok(())
    })
    .unwrap();

    correct as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_free_samples() -> Vec<(Vec<f32>, bool)> {
        vec![
            (vec![0.0, 0.0], false),
            (vec![0.0, 1.0], false),
            (vec![1.0, 0.0], true),
            (vec![1.0, 1.0], true),
        ]
    }

    #[test]
    fn test_tree_learns_single_threshold() {
        let tree = build_tree(&xor_free_samples(), 2);
        assert!(tree.probability_for(&[0.0, 0.5]) < 0.5);
        assert!(tree.probability_for(&[1.0, 0.5]) > 0.5);
    }

    #[test]
    fn test_pure_samples_become_leaf() {
        let samples = vec![(vec![1.0], true), (vec![2.0], true)];
        match build_tree(&samples, 2) {
            TreeNode::Leaf { probability } => assert_eq!(probability, 1.0),
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_stature_fixture_is_balanced_enough() {
        let view = stature_view();
        let schema = view.schema();
        let label_index = schema.index_of("label").unwrap();

        let mut positives = 0usize;
        let mut total = 0usize;
        view.for_each_row(&mut |row| {
            total += 1;
            if row.bool_at(label_index)? {
                positives += 1;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(total, 108);
        assert!(positives > 10 && positives < total - 10);
    }
}
