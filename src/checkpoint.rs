// checkpoint.rs
// Description: Save and load model parameters as JSON.
//              Parameters are stored flat in layer order: token emb, pos emb, Wq, bq, Wk, bk,
//              Wv, bv, W1, b1, W2, b2, Wo, bo.
// History:
// - 2026-10-18: Checkpoint carries the full config so load rebuilds matching shapes.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::model::TinyTransformer;
use crate::utils;

pub const S_MAGIC: &str = "TINY_LM_CHECKPOINT";
pub const S_VERSION: &str = "1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    #[serde(rename = "magic")]
    pub s_magic: String,
    #[serde(rename = "version")]
    pub s_version: String,
    pub config: ModelConfig,
    #[serde(rename = "params")]
    pub v_params: Vec<f32>,
}

impl ModelCheckpoint {
    pub fn from_model(model: &TinyTransformer) -> Self {
        let mut v_params: Vec<f32> = Vec::with_capacity(model.parameter_count());
        for layer in model.layers() {
            v_params.extend(layer.get_parameters_flat());
        }
        Self {
            s_magic: S_MAGIC.to_string(),
            s_version: S_VERSION.to_string(),
            config: model.config().clone(),
            v_params,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.s_magic != S_MAGIC {
            return Err(ModelError::Checkpoint("checkpoint_magic_mismatch".to_string()));
        }
        if self.s_version != S_VERSION {
            return Err(ModelError::Checkpoint("checkpoint_version_unsupported".to_string()));
        }
        self.config.validate()?;
        if self.v_params.is_empty() {
            return Err(ModelError::Checkpoint("checkpoint_empty_params".to_string()));
        }
        Ok(())
    }

    /// Rebuilds a model with exactly the stored parameters.
    pub fn into_model(self) -> Result<TinyTransformer> {
        self.validate()?;

        // Checked before allocating so an oversized config cannot reach ndarray.
        if self.config.parameter_count() != Some(self.v_params.len()) {
            return Err(ModelError::Checkpoint("checkpoint_param_count_mismatch".to_string()));
        }

        // Shapes come from the config; initial values are overwritten below.
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = TinyTransformer::new(self.config, &mut rng)?;

        let mut i_pos: usize = 0;
        for layer in model.layers_mut() {
            i_pos += layer.set_parameters_flat(&self.v_params[i_pos..])?;
        }
        Ok(model)
    }
}

pub fn save(model: &TinyTransformer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let cp = ModelCheckpoint::from_model(model);
    let s_json = serde_json::to_string(&cp)?;
    utils::write_file_atomic(path, &s_json)?;
    info!(path = %path.display(), params = cp.v_params.len(), "saved checkpoint");
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<TinyTransformer> {
    let path = path.as_ref();
    let s_json = std::fs::read_to_string(path)?;
    let cp: ModelCheckpoint = serde_json::from_str(&s_json)?;
    let model = cp.into_model()?;
    info!(path = %path.display(), params = model.parameter_count(), "loaded checkpoint");
    Ok(model)
}
