//! Conventions and helpers for trainer stages
//!
//! Trainers plug into the pipeline as ordinary estimators: fitting learns
//! a model from the training view, and the fitted stage appends the
//! scoring columns to each row. The library itself ships no learning
//! algorithm; hosts supply trainers and register a loader for each
//! plugin kind with the [`StageResolver`](crate::store::StageResolver)
//! so saved models can be rehydrated.

use serde::de::DeserializeOwned;
use serde::Serialize;

use ml_classify_core::Result;

use crate::stage::StageState;

/// Conventional name of the assembled feature-vector column
pub const DEFAULT_FEATURES_COLUMN: &str = "features";

/// Conventional name of the ground-truth label column
pub const DEFAULT_LABEL_COLUMN: &str = "label";

/// Conventional name of the raw score column a trainer appends
pub const SCORE_COLUMN: &str = "score";

/// Conventional name of the calibrated probability column a binary
/// trainer appends
pub const PROBABILITY_COLUMN: &str = "probability";

/// Conventional name of the predicted-label column a trainer appends
pub const PREDICTED_LABEL_COLUMN: &str = "predicted_label";

/// Freeze a trainer's learned model into a plugin stage state
///
/// The payload is opaque to the pipeline; only the loader registered
/// under the same `kind` interprets it at load time.
pub fn encode_plugin_state<T: Serialize>(kind: &str, model: &T) -> Result<StageState> {
    Ok(StageState::Plugin {
        kind: kind.to_string(),
        payload: bincode::serialize(model)?,
    })
}

/// Decode an opaque plugin payload back into the trainer's model type
pub fn decode_plugin_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}
