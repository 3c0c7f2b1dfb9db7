//! Typed row values addressed by column index

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// 32-bit float value
    Float(f32),

    /// String value
    Text(String),

    /// Ordinal into a key column's dictionary
    Key(u32),

    /// Fixed-length vector of 32-bit floats
    Vector(Vec<f32>),
}

impl Value {
    /// Short name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Boolean",
            Value::Float(_) => "Float32",
            Value::Text(_) => "Text",
            Value::Key(_) => "Key",
            Value::Vector(_) => "FloatVector",
        }
    }

    /// Check whether this value conforms to the given column type,
    /// including vector length and key range
    pub fn matches(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Bool(_), DataType::Boolean) => true,
            (Value::Float(_), DataType::Float32) => true,
            (Value::Text(_), DataType::Text) => true,
            (Value::Key(k), DataType::Key { dictionary }) => (*k as usize) < dictionary.len(),
            (Value::Vector(v), DataType::FloatVector(length)) => v.len() == *length,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Key(v) => write!(f, "#{}", v),
            Value::Vector(v) => write!(f, "{:?}", v),
        }
    }
}

/// An addressable tuple of column values, one per schema column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Values in schema column order
    values: Vec<Value>,
}

impl Row {
    /// Create a row from column values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Create an empty row, useful as a reusable scratch buffer
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Number of column values in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get all values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Mutable access to the underlying values, for stages that append
    /// output columns in place
    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    /// Append a value
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Clear this row, keeping its allocation
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Replace this row's contents with a copy of another row, reusing the
    /// container allocation
    pub fn reset_from(&mut self, other: &Row) {
        self.values.clear();
        self.values.extend(other.values.iter().cloned());
    }

    /// Get the value at a column index
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "Row has {} columns, column {} required",
                self.values.len(),
                index
            ))
        })
    }

    /// Get a boolean value at a column index
    pub fn bool_at(&self, index: usize) -> Result<bool> {
        match self.value(index)? {
            Value::Bool(v) => Ok(*v),
            other => Err(type_error(index, "Boolean", other)),
        }
    }

    /// Get a float value at a column index
    pub fn float_at(&self, index: usize) -> Result<f32> {
        match self.value(index)? {
            Value::Float(v) => Ok(*v),
            other => Err(type_error(index, "Float32", other)),
        }
    }

    /// Get a text value at a column index
    pub fn text_at(&self, index: usize) -> Result<&str> {
        match self.value(index)? {
            Value::Text(v) => Ok(v),
            other => Err(type_error(index, "Text", other)),
        }
    }

    /// Get a key ordinal at a column index
    pub fn key_at(&self, index: usize) -> Result<u32> {
        match self.value(index)? {
            Value::Key(v) => Ok(*v),
            other => Err(type_error(index, "Key", other)),
        }
    }

    /// Get a float vector at a column index
    pub fn vector_at(&self, index: usize) -> Result<&[f32]> {
        match self.value(index)? {
            Value::Vector(v) => Ok(v),
            other => Err(type_error(index, "FloatVector", other)),
        }
    }

    /// Check that this row has exactly one conforming value per schema
    /// column
    pub fn conforms_to(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.len() {
            return Err(Error::SchemaMismatch(format!(
                "Row has {} values but the schema declares {} columns",
                self.values.len(),
                schema.len()
            )));
        }

        for (index, (value, field)) in self.values.iter().zip(schema.fields()).enumerate() {
            if !value.matches(field.data_type()) {
                return Err(Error::TypeMismatch(format!(
                    "Column {} ('{}') declares {} but the row holds {}",
                    index,
                    field.name(),
                    field.data_type(),
                    value.type_name()
                )));
            }
        }

        Ok(())
    }
}

fn type_error(index: usize, expected: &str, actual: &Value) -> Error {
    Error::TypeMismatch(format!(
        "Column {} holds {} where {} was requested",
        index,
        actual.type_name(),
        expected
    ))
}
