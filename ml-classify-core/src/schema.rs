//! Schema definition for pipeline data

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Data type for column values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type
    Boolean,

    /// 32-bit floating point
    Float32,

    /// UTF-8 encoded string
    Text,

    /// Enumerated category, carrying the dictionary that maps ordinals
    /// back to the raw values they were built from
    Key {
        /// Ordinal-to-value dictionary; the key cardinality is its length
        dictionary: Vec<String>,
    },

    /// Fixed-length vector of 32-bit floats; the length is declared at
    /// schema-definition time and shared by all rows
    FloatVector(usize),
}

impl DataType {
    /// Number of float slots this type contributes to a feature vector
    pub fn float_slots(&self) -> Option<usize> {
        match self {
            DataType::Float32 => Some(1),
            DataType::FloatVector(length) => Some(*length),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "Boolean"),
            DataType::Float32 => write!(f, "Float32"),
            DataType::Text => write!(f, "Text"),
            DataType::Key { dictionary } => write!(f, "Key({})", dictionary.len()),
            DataType::FloatVector(length) => write!(f, "FloatVector({})", length),
        }
    }
}

/// A column in a schema, with a name, data type, and visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Data type of the field
    pub data_type: DataType,

    /// Whether the field is transient and excluded from reporting views
    pub hidden: bool,
}

impl Field {
    /// Create a new visible field
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            hidden: false,
        }
    }

    /// Create a new hidden field
    pub fn hidden(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            hidden: true,
        }
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this field
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Check if this field is hidden
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hidden {
            write!(f, "{}: {} (hidden)", self.name, self.data_type)
        } else {
            write!(f, "{}: {}", self.name, self.data_type)
        }
    }
}

/// An ordered set of uniquely named columns describing a data view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Fields in this schema
    fields: Vec<Field>,

    /// Field indices by name for faster lookup
    #[serde(skip)]
    field_indices: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given fields
    ///
    /// Field names must be unique within a schema; a duplicate name is an
    /// `InvalidConfiguration` error.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if field_indices.insert(field.name.clone(), i).is_some() {
                return Err(Error::InvalidConfiguration(format!(
                    "Duplicate column name in schema: {}",
                    field.name
                )));
            }
        }

        Ok(Self {
            fields,
            field_indices,
        })
    }

    /// Get all fields in this schema
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by index
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Get a field by name
    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Get the index of a field by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::SchemaMismatch(format!("Column not found: {}", name)))
    }

    /// Check whether a field with the given name exists
    pub fn contains(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Get the number of fields in this schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields that are not hidden, in declaration order
    pub fn visible_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.hidden)
    }

    /// Create a new schema with the given fields appended after this
    /// schema's fields
    ///
    /// This is how a transform stage composes its output schema: the input
    /// columns are preserved and the stage's output columns follow. A name
    /// collision is an `InvalidConfiguration` error.
    pub fn with_appended(&self, appended: Vec<Field>) -> Result<Self> {
        let mut fields = self.fields.clone();
        fields.extend(appended);
        Self::new(fields)
    }

    /// Serialize this schema to a binary format
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(Error::Serialization)
    }

    /// Deserialize a schema from a binary format
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(Error::Serialization)
    }
}

// Deserialization goes through `Schema::new` so that the name index is
// rebuilt and the uniqueness invariant is re-checked.
impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SchemaData {
            fields: Vec<Field>,
        }

        let data = SchemaData::deserialize(deserializer)?;
        Schema::new(data.fields).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema: {} columns", self.fields.len())?;
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Field::new("height", DataType::Float32),
            Field::new("weight", DataType::Float32),
            Field::new("label", DataType::Boolean),
        ])
        .unwrap()
    }

    #[test]
    fn test_index_of_and_lookup() {
        let schema = sample_schema();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("weight").unwrap(), 1);
        assert_eq!(schema.field_by_name("label").unwrap().data_type(), &DataType::Boolean);
        assert!(schema.index_of("missing").is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = Schema::new(vec![
            Field::new("x", DataType::Float32),
            Field::new("x", DataType::Boolean),
        ]);

        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_appended_collision_rejected() {
        let schema = sample_schema();
        let result = schema.with_appended(vec![Field::new("height", DataType::Float32)]);

        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_visible_fields_skip_hidden() {
        let schema = Schema::new(vec![
            Field::new("text", DataType::Text),
            Field::hidden("scratch", DataType::FloatVector(4)),
            Field::new("label", DataType::Boolean),
        ])
        .unwrap();

        let visible: Vec<&str> = schema.visible_fields().map(Field::name).collect();
        assert_eq!(visible, vec!["text", "label"]);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_index() {
        let schema = sample_schema();
        let bytes = schema.serialize().unwrap();
        let restored = Schema::deserialize(&bytes).unwrap();

        assert_eq!(restored, schema);
        // The lookup index is rebuilt, not persisted
        assert_eq!(restored.index_of("label").unwrap(), 2);
    }
}
