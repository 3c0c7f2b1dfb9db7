//! Column concatenation into one fixed-length float vector

use std::sync::Arc;

use ml_classify_core::{DataType, Error, Field, Result, Row, Schema, Value, ViewRef};

use crate::stage::{Estimator, FittedStage, StageState};

/// Concatenates float and float-vector columns into one vector column
pub struct ColumnConcatenator {
    output: String,
    inputs: Vec<String>,
}

impl ColumnConcatenator {
    /// Create a concatenator producing `output` from `inputs`, in order
    pub fn new(output: &str, inputs: &[&str]) -> Self {
        Self {
            output: output.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Estimator for ColumnConcatenator {
    fn name(&self) -> &str {
        "concat"
    }

    fn input_columns(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        // Concatenation is stateless; only the schema matters.
        Ok(Arc::new(ConcatStage::from_schema(
            &view.schema(),
            &self.output,
            &self.inputs,
        )?))
    }
}

/// Fitted concatenation stage
pub struct ConcatStage {
    output: String,
    inputs: Vec<String>,
    input_indices: Vec<usize>,
    length: usize,
    output_schema: Arc<Schema>,
}

impl ConcatStage {
    /// Rebuild the stage from its specification and the input schema
    pub fn from_schema(schema: &Arc<Schema>, output: &str, inputs: &[String]) -> Result<Self> {
        let mut input_indices = Vec::with_capacity(inputs.len());
        let mut length = 0;

        for name in inputs {
            let index = schema.index_of(name)?;
            let field = schema.field(index);
            length += field.data_type().float_slots().ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "Column '{}' has type {} and cannot be concatenated into a float vector",
                    name,
                    field.data_type()
                ))
            })?;
            input_indices.push(index);
        }

        let output_schema = Arc::new(
            schema.with_appended(vec![Field::new(output, DataType::FloatVector(length))])?,
        );

        Ok(Self {
            output: output.to_string(),
            inputs: inputs.to_vec(),
            input_indices,
            length,
            output_schema,
        })
    }
}

impl FittedStage for ConcatStage {
    fn name(&self) -> &str {
        "concat"
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        let mut vector = Vec::with_capacity(self.length);
        for &index in &self.input_indices {
            match input.value(index)? {
                Value::Float(v) => vector.push(*v),
                Value::Vector(v) => vector.extend_from_slice(v),
                other => {
                    return Err(Error::TypeMismatch(format!(
                        "Column {} holds {} where a numeric column was declared",
                        index,
                        other.type_name()
                    )))
                }
            }
        }

        output.push(Value::Vector(vector));
        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::Concat {
            output: self.output.clone(),
            inputs: self.inputs.clone(),
        })
    }
}
