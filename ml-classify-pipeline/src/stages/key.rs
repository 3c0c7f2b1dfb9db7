//! Value-to-key and key-to-value dictionary mappings

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use ml_classify_core::{DataType, Error, Field, Result, Row, Schema, Value, ViewRef};

use crate::stage::{Estimator, FittedStage, StageState};

/// Maps a text column to an enumerated key column
///
/// Fitting collects the distinct values in one pass and freezes them into
/// a dictionary ordered by value, so key ordinals are stable across runs
/// over the same data.
pub struct ValueToKeyMapper {
    input: String,
    output: String,
}

impl ValueToKeyMapper {
    /// Create a mapper reading text column `input` and producing key
    /// column `output`
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
        }
    }
}

impl Estimator for ValueToKeyMapper {
    fn name(&self) -> &str {
        "value_to_key"
    }

    fn input_columns(&self) -> Vec<String> {
        vec![self.input.clone()]
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        let schema = view.schema();
        let index = schema.index_of(&self.input)?;

        let mut values = BTreeSet::new();
        view.for_each_row(&mut |row| {
            values.insert(row.text_at(index)?.to_string());
            Ok(())
        })?;

        let dictionary: Vec<String> = values.into_iter().collect();
        debug!(column = %self.input, cardinality = dictionary.len(), "froze key dictionary");

        Ok(Arc::new(ValueToKeyStage::from_dictionary(
            &schema,
            self.input.clone(),
            self.output.clone(),
            dictionary,
        )?))
    }
}

/// Fitted value-to-key stage with its frozen dictionary
pub struct ValueToKeyStage {
    input: String,
    output: String,
    input_index: usize,
    dictionary: Vec<String>,
    ordinals: HashMap<String, u32>,
    output_schema: Arc<Schema>,
}

impl ValueToKeyStage {
    /// Rebuild the stage from a frozen dictionary and the input schema
    pub fn from_dictionary(
        schema: &Arc<Schema>,
        input: String,
        output: String,
        dictionary: Vec<String>,
    ) -> Result<Self> {
        let input_index = schema.index_of(&input)?;

        let ordinals = dictionary
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as u32))
            .collect();
        let output_schema = Arc::new(schema.with_appended(vec![Field::new(
            &output,
            DataType::Key {
                dictionary: dictionary.clone(),
            },
        )])?);

        Ok(Self {
            input,
            output,
            input_index,
            dictionary,
            ordinals,
            output_schema,
        })
    }
}

impl FittedStage for ValueToKeyStage {
    fn name(&self) -> &str {
        "value_to_key"
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        let text = input.text_at(self.input_index)?;
        let ordinal = self.ordinals.get(text).ok_or_else(|| Error::Transform {
            stage: "value_to_key".to_string(),
            message: format!("Value '{}' is not present in the fitted dictionary", text),
        })?;

        output.push(Value::Key(*ordinal));
        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::ValueToKey {
            input: self.input.clone(),
            output: self.output.clone(),
            dictionary: self.dictionary.clone(),
        })
    }
}

/// Maps a key column back to its text values
///
/// The dictionary comes from the input column's key type, so the inverse
/// mapping survives serialization without separate state.
pub struct KeyToValueMapper {
    input: String,
    output: String,
}

impl KeyToValueMapper {
    /// Create a mapper reading key column `input` and producing text
    /// column `output`
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
        }
    }
}

impl Estimator for KeyToValueMapper {
    fn name(&self) -> &str {
        "key_to_value"
    }

    fn input_columns(&self) -> Vec<String> {
        vec![self.input.clone()]
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        Ok(Arc::new(KeyToValueStage::from_schema(
            &view.schema(),
            self.input.clone(),
            self.output.clone(),
        )?))
    }
}

/// Fitted key-to-value stage
pub struct KeyToValueStage {
    input: String,
    output: String,
    input_index: usize,
    dictionary: Vec<String>,
    output_schema: Arc<Schema>,
}

impl KeyToValueStage {
    /// Rebuild the stage from the input schema, reading the dictionary
    /// from the input column's key type
    pub fn from_schema(schema: &Arc<Schema>, input: String, output: String) -> Result<Self> {
        let input_index = schema.index_of(&input)?;
        let dictionary = match schema.field(input_index).data_type() {
            DataType::Key { dictionary } => dictionary.clone(),
            other => {
                return Err(Error::InvalidConfiguration(format!(
                    "Column '{}' has type {} but key_to_value requires a key column",
                    input, other
                )))
            }
        };

        let output_schema =
            Arc::new(schema.with_appended(vec![Field::new(&output, DataType::Text)])?);

        Ok(Self {
            input,
            output,
            input_index,
            dictionary,
            output_schema,
        })
    }
}

impl FittedStage for KeyToValueStage {
    fn name(&self) -> &str {
        "key_to_value"
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        let ordinal = input.key_at(self.input_index)? as usize;
        let text = self.dictionary.get(ordinal).ok_or_else(|| Error::Transform {
            stage: "key_to_value".to_string(),
            message: format!(
                "Key ordinal {} out of range for dictionary of {} values",
                ordinal,
                self.dictionary.len()
            ),
        })?;

        output.push(Value::Text(text.clone()));
        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::KeyToValue {
            input: self.input.clone(),
            output: self.output.clone(),
        })
    }
}
