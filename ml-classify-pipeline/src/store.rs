//! Persistence of fitted pipelines
//!
//! A saved artifact is one bincode blob holding the input schema and the
//! ordered stage states (frozen statistics, custom-mapping contract
//! names, opaque plugin payloads). Loading replays the states against the
//! saved schema and re-binds every contract name and plugin kind through
//! a [`StageResolver`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ml_classify_core::{Error, Result, Schema};

use crate::custom::MappingRegistry;
use crate::pipeline::FittedPipeline;
use crate::stage::{FittedStage, StageState};
use crate::stages::{CacheStage, ConcatStage, KeyToValueStage, NormalizeStage, ValueToKeyStage};

const MAGIC: [u8; 8] = *b"MLCLSFY\0";
const FORMAT_VERSION: u32 = 1;

/// The serialized form of a fitted pipeline
#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    magic: [u8; 8],
    version: u32,
    model_id: Uuid,
    input_schema: Schema,
    stages: Vec<StageState>,
}

/// Loader that rebuilds a plugin stage from its payload and input schema
pub type PluginLoader =
    Arc<dyn Fn(&[u8], &Arc<Schema>) -> Result<Arc<dyn FittedStage>> + Send + Sync>;

/// Re-binds contract names and plugin kinds when loading an artifact
///
/// The resolver is an explicit argument to [`load`] so the dependency on
/// host-supplied code stays visible and testable.
#[derive(Clone, Default)]
pub struct StageResolver {
    mappings: MappingRegistry,
    plugins: HashMap<String, PluginLoader>,
}

impl StageResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver over a mapping registry
    pub fn with_mappings(mappings: MappingRegistry) -> Self {
        Self {
            mappings,
            plugins: HashMap::new(),
        }
    }

    /// Register a plugin loader under its kind
    pub fn register_plugin(&mut self, kind: &str, loader: PluginLoader) -> Result<()> {
        if self.plugins.insert(kind.to_string(), loader).is_some() {
            return Err(Error::InvalidConfiguration(format!(
                "Plugin kind '{}' is already registered",
                kind
            )));
        }
        Ok(())
    }

    /// The custom mapping registry
    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    fn plugin(&self, kind: &str) -> Option<&PluginLoader> {
        self.plugins.get(kind)
    }
}

/// Serialize a fitted pipeline and its input schema to a file
pub fn save(pipeline: &FittedPipeline, path: impl AsRef<Path>) -> Result<()> {
    let stages = pipeline
        .stages()
        .iter()
        .map(|stage| stage.state())
        .collect::<Result<Vec<_>>>()?;

    let artifact = ModelArtifact {
        magic: MAGIC,
        version: FORMAT_VERSION,
        model_id: Uuid::new_v4(),
        input_schema: (*pipeline.input_schema()).clone(),
        stages,
    };

    let bytes = bincode::serialize(&artifact)?;
    std::fs::write(path.as_ref(), bytes)?;
    info!(
        model_id = %artifact.model_id,
        stages = artifact.stages.len(),
        path = %path.as_ref().display(),
        "model saved"
    );

    Ok(())
}

/// Load a fitted pipeline from a file, re-binding contract names through
/// the resolver
///
/// The loaded pipeline is behaviorally identical to the saved one for
/// all inputs, given the same resolver.
pub fn load(path: impl AsRef<Path>, resolver: &StageResolver) -> Result<FittedPipeline> {
    let bytes = std::fs::read(path.as_ref())?;
    let artifact: ModelArtifact = bincode::deserialize(&bytes)?;

    if artifact.magic != MAGIC {
        return Err(Error::CorruptModel(
            "File does not look like a model artifact".to_string(),
        ));
    }
    if artifact.version != FORMAT_VERSION {
        return Err(Error::CorruptModel(format!(
            "Unsupported artifact format version {}",
            artifact.version
        )));
    }

    let input_schema = Arc::new(artifact.input_schema);
    let mut schema = input_schema.clone();
    let mut stages: Vec<Arc<dyn FittedStage>> = Vec::with_capacity(artifact.stages.len());

    for state in artifact.stages {
        let stage: Arc<dyn FittedStage> = match state {
            StageState::Concat { output, inputs } => {
                Arc::new(ConcatStage::from_schema(&schema, &output, &inputs)?)
            }
            StageState::Normalize {
                input,
                output,
                means,
                stds,
            } => Arc::new(NormalizeStage::from_statistics(
                &schema, input, output, means, stds,
            )?),
            StageState::ValueToKey {
                input,
                output,
                dictionary,
            } => Arc::new(ValueToKeyStage::from_dictionary(
                &schema, input, output, dictionary,
            )?),
            StageState::KeyToValue { input, output } => {
                Arc::new(KeyToValueStage::from_schema(&schema, input, output)?)
            }
            StageState::Cache => Arc::new(CacheStage::from_schema(&schema)),
            StageState::CustomMapping { contract } => {
                let mapping = resolver
                    .mappings
                    .resolve(&contract)
                    .ok_or_else(|| Error::UnknownContract(contract.clone()))?;
                Arc::new(mapping.bind(&schema)?)
            }
            StageState::Plugin { kind, payload } => {
                let loader = resolver
                    .plugin(&kind)
                    .ok_or_else(|| Error::UnknownContract(kind.clone()))?;
                loader(&payload, &schema)?
            }
        };

        schema = stage.output_schema();
        stages.push(stage);
    }

    info!(
        model_id = %artifact.model_id,
        stages = stages.len(),
        path = %path.as_ref().display(),
        "model loaded"
    );

    Ok(FittedPipeline::from_parts(input_schema, stages))
}
