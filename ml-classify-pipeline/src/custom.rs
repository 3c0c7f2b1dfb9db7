//! Custom mappings registered under contract names
//!
//! A serialized pipeline cannot carry executable code, only a contract
//! name; the loading process re-binds the name to a concrete function
//! through a [`MappingRegistry`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ml_classify_core::{Error, Field, Result, Row, Schema, Value, ViewRef};

use crate::stage::{Estimator, FittedStage, StageState};

/// A user-supplied row function: reads the input row (described by the
/// input schema) and appends one value per declared output field
pub type MapFn = Arc<dyn Fn(&Row, &Schema, &mut Vec<Value>) -> Result<()> + Send + Sync>;

/// Observer for per-stage progress accounting
///
/// Invoked after each mapped row with the running total for that stage
/// instance. Diagnostic only: mapped output must never depend on it.
pub trait MappingObserver: Send + Sync {
    /// Called after a row has been mapped
    fn rows_mapped(&self, total: u64);
}

/// A named, user-defined row mapping
///
/// The contract name identifies the function across serialization: the
/// fitted stage persists only the name, and loading re-resolves it
/// against the hosting process's registry.
#[derive(Clone)]
pub struct CustomMapping {
    contract: String,
    input_columns: Vec<String>,
    output_fields: Vec<Field>,
    func: MapFn,
    observer: Option<Arc<dyn MappingObserver>>,
}

impl CustomMapping {
    /// Define a mapping under a contract name
    pub fn new<F>(
        contract: &str,
        input_columns: Vec<String>,
        output_fields: Vec<Field>,
        func: F,
    ) -> Self
    where
        F: Fn(&Row, &Schema, &mut Vec<Value>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            contract: contract.to_string(),
            input_columns,
            output_fields,
            func: Arc::new(func),
            observer: None,
        }
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Arc<dyn MappingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The contract name of this mapping
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Bind this mapping to an input schema, producing the fitted stage
    pub fn bind(&self, schema: &Arc<Schema>) -> Result<CustomMappingStage> {
        for column in &self.input_columns {
            schema.index_of(column)?;
        }
        let output_schema = Arc::new(schema.with_appended(self.output_fields.clone())?);

        Ok(CustomMappingStage {
            mapping: self.clone(),
            input_schema: schema.clone(),
            output_schema,
            rows_mapped: AtomicU64::new(0),
        })
    }
}

impl Estimator for CustomMapping {
    fn name(&self) -> &str {
        &self.contract
    }

    fn input_columns(&self) -> Vec<String> {
        self.input_columns.clone()
    }

    fn fit(&self, view: &ViewRef) -> Result<Arc<dyn FittedStage>> {
        // Custom mappings are stateless; fitting only binds the schema.
        Ok(Arc::new(self.bind(&view.schema())?))
    }
}

/// Fitted custom mapping stage
pub struct CustomMappingStage {
    mapping: CustomMapping,
    input_schema: Arc<Schema>,
    output_schema: Arc<Schema>,
    rows_mapped: AtomicU64,
}

impl CustomMappingStage {
    /// Rows this stage instance has mapped so far
    pub fn rows_mapped(&self) -> u64 {
        self.rows_mapped.load(Ordering::Relaxed)
    }
}

impl FittedStage for CustomMappingStage {
    fn name(&self) -> &str {
        &self.mapping.contract
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.output_schema.clone()
    }

    fn map_into(&self, input: &Row, output: &mut Row) -> Result<()> {
        output.reset_from(input);

        let before = output.len();
        (self.mapping.func)(input, &self.input_schema, output.values_mut())?;

        let appended = &output.values()[before..];
        if appended.len() != self.mapping.output_fields.len() {
            return Err(Error::Transform {
                stage: self.mapping.contract.clone(),
                message: format!(
                    "Mapping appended {} values but declares {} output columns",
                    appended.len(),
                    self.mapping.output_fields.len()
                ),
            });
        }
        for (value, field) in appended.iter().zip(&self.mapping.output_fields) {
            if !value.matches(field.data_type()) {
                return Err(Error::Transform {
                    stage: self.mapping.contract.clone(),
                    message: format!(
                        "Output column '{}' declares {} but the mapping produced {}",
                        field.name(),
                        field.data_type(),
                        value.type_name()
                    ),
                });
            }
        }

        let total = self.rows_mapped.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(observer) = &self.mapping.observer {
            observer.rows_mapped(total);
        }

        Ok(())
    }

    fn state(&self) -> Result<StageState> {
        Ok(StageState::CustomMapping {
            contract: self.mapping.contract.clone(),
        })
    }
}

/// Registry of custom mappings by contract name
///
/// Registering two different functions under the same contract name is a
/// configuration error, detected before any row is processed.
#[derive(Clone, Default)]
pub struct MappingRegistry {
    entries: HashMap<String, CustomMapping>,
}

impl MappingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping under its contract name
    pub fn register(&mut self, mapping: CustomMapping) -> Result<()> {
        match self.entries.entry(mapping.contract.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(mapping);
                Ok(())
            }
            Entry::Occupied(entry) => {
                // Re-registering the identical function is harmless
                if Arc::ptr_eq(&entry.get().func, &mapping.func) {
                    Ok(())
                } else {
                    Err(Error::InvalidConfiguration(format!(
                        "Contract '{}' is already registered with a different mapping",
                        mapping.contract
                    )))
                }
            }
        }
    }

    /// Resolve a contract name to its mapping
    pub fn resolve(&self, contract: &str) -> Option<&CustomMapping> {
        self.entries.get(contract)
    }

    /// Registered contract names
    pub fn contracts(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
