//! Mean/variance normalization with fit-time frozen statistics

use std::sync::Arc;

use tracing::debug;

use ml_classify_core::{DataType, Error, Field, Result, Row, Schema, Value, ViewRef};

use crate::stage::{Estimator, FittedStage, StageState};

const STD_EPSILON: f32 = 1e-12;

/// Normalizes a float or float-vector column to zero mean and unit
/// variance
///
/// Fitting performs one full pass over the training view to compute the
/// per-slot mean and variance, then freezes them; the statistics are
/// never recomputed during transform.
pub struct MeanVarianceNormalizer {
    input: String,
    output: String,
}

impl MeanVarianceNormalizer {
    /// Create a normalizer reading `input` and producing `output`
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
        }
    }
}

impl Estimator for MeanVarianceNormalizer {
    fn name(&self) -> &str {
        "normalize"
    }

    fn input_columns(&self) -> Vec<String> {
        vec![self.input.clone()]
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        let schema = view.schema();
        let index = schema.index_of(&self.input)?;
        let slots = schema
            .field(index)
            .data_type()
            .float_slots()
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "Column '{}' has type {} and cannot be normalized",
                    self.input,
                    schema.field(index).data_type()
                ))
            })?;

        // Welford accumulation, one pass
        let mut count: u64 = 0;
        let mut means = vec![0.0f64; slots];
        let mut m2 = vec![0.0f64; slots];

        view.for_each_row(&mut |row| {
            count += 1;
            let mut slot = 0;
            let mut accumulate = |v: f32| {
                let delta = f64::from(v) - means[slot];
                means[slot] += delta / count as f64;
                m2[slot] += delta * (f64::from(v) - means[slot]);
                slot += 1;
            };
            match row.value(index)? {
                Value::Float(v) => accumulate(*v),
                Value::Vector(vs) => vs.iter().for_each(|&v| accumulate(v)),
                other => {
                    return Err(Error::TypeMismatch(format!(
                        "Column {} holds {} where a numeric column was declared",
                        index,
                        other.type_name()
                    )))
                }
            }
            Ok(())
        })?;

        if count == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "Cannot fit normalizer for column '{}' on an empty view",
                self.input
            )));
        }

        let means: Vec<f32> = means.iter().map(|&m| m as f32).collect();
        let stds: Vec<f32> = m2.iter().map(|&v| (v / count as f64).sqrt() as f32).collect();

        debug!(column = %self.input, rows = count, "froze normalization statistics");

        Ok(Arc::new(NormalizeStage::from_statistics(
            &schema,
            self.input.clone(),
            self.output.clone(),
            means,
            stds,
        )?))
    }
}

/// Fitted normalization stage holding frozen statistics
pub struct NormalizeStage {
    input: String,
    output: String,
    input_index: usize,
    means: Vec<f32>,
    stds: Vec<f32>,
    scalar: bool,
    output_schema: Arc<Schema>,
}

impl NormalizeStage {
    /// Rebuild the stage from frozen statistics and the input schema
    pub fn from_statistics(
        schema: &Arc<Schema>,
        input: String,
        output: String,
        means: Vec<f32>,
        stds: Vec<f32>,
    ) -> Result<Self> {
        let input_index = schema.index_of(&input)?;
        let data_type = schema.field(input_index).data_type().clone();
        let scalar = matches!(data_type, DataType::Float32);

        let slots = data_type.float_slots().ok_or_else(|| {
            Error::InvalidConfiguration(format!("Column '{}' is not numeric", input))
        })?;
        if means.len() != slots || stds.len() != slots {
            return Err(Error::CorruptModel(format!(
                "Normalizer for '{}' has {} statistics for {} slots",
                input,
                means.len(),
                slots
            )));
        }

        let output_schema =
            Arc::new(schema.with_appended(vec![Field::new(&output, data_type)])?);

        Ok(Self {
            input,
            output,
            input_index,
            means,
            stds,
            scalar,
            output_schema,
        })
    }

    fn normalize(&self, slot: usize, v: f32) -> f32 {
        let std = self.stds[slot];
        if std > STD_EPSILON {
            (v - self.means[slot]) / std
        } else {
            // Zero-variance slot carries no signal
            0.0
        }
    }
}

impl FittedStage for NormalizeStage {
    fn name(&self) -> &str {
        "normalize"
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        if self.scalar {
            let v = input.float_at(self.input_index)?;
            output.push(Value::Float(self.normalize(0, v)));
        } else {
            let vs = input.vector_at(self.input_index)?;
            let normalized = vs
                .iter()
                .enumerate()
                .map(|(slot, &v)| self.normalize(slot, v))
                .collect();
            output.push(Value::Vector(normalized));
        }

        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::Normalize {
            input: self.input.clone(),
            output: self.output.clone(),
            means: self.means.clone(),
            stds: self.stds.clone(),
        })
    }
}
