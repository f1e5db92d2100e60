// config.rs
// Description: Model dimensions and training hyperparameters.
// History:
// - 2026-10-18: Move size constants into a serializable config with validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::{EMBEDDING_DIM, HIDDEN_DIM, MAX_SEQ_LEN};

pub const DEFAULT_INIT_SCALE: f32 = 0.02;
pub const DEFAULT_LEARNING_RATE: f32 = 0.01;

/// Fixed shape of a model plus the constants used to initialize and train it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub d_model: usize,
    pub d_ff: usize,
    pub max_seq_len: usize,
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
}

fn default_init_scale() -> f32 {
    DEFAULT_INIT_SCALE
}

fn default_learning_rate() -> f32 {
    DEFAULT_LEARNING_RATE
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(10, EMBEDDING_DIM, HIDDEN_DIM, MAX_SEQ_LEN)
    }
}

impl ModelConfig {
    pub fn new(i_vocab_size: usize, i_d_model: usize, i_d_ff: usize, i_max_seq_len: usize) -> Self {
        Self {
            vocab_size: i_vocab_size,
            d_model: i_d_model,
            d_ff: i_d_ff,
            max_seq_len: i_max_seq_len,
            init_scale: DEFAULT_INIT_SCALE,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    pub fn with_learning_rate(mut self, d_lr: f32) -> Self {
        self.learning_rate = d_lr;
        self
    }

    pub fn with_init_scale(mut self, d_scale: f32) -> Self {
        self.init_scale = d_scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(ModelError::InvalidConfig("vocab_size_must_be_positive".to_string()));
        }
        if self.d_model == 0 {
            return Err(ModelError::InvalidConfig("d_model_must_be_positive".to_string()));
        }
        if self.d_ff == 0 {
            return Err(ModelError::InvalidConfig("d_ff_must_be_positive".to_string()));
        }
        if self.max_seq_len == 0 {
            return Err(ModelError::InvalidConfig("max_seq_len_must_be_positive".to_string()));
        }
        if !self.init_scale.is_finite() || self.init_scale <= 0.0 {
            return Err(ModelError::InvalidConfig("init_scale_invalid".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidConfig("learning_rate_invalid".to_string()));
        }
        Ok(())
    }

    /// Total scalars a model of this shape holds; None when the count overflows usize.
    pub fn parameter_count(&self) -> Option<usize> {
        let (i_v, i_d, i_f, i_l) = (self.vocab_size, self.d_model, self.d_ff, self.max_seq_len);
        let i_embeddings = i_v.checked_mul(i_d)?.checked_add(i_l.checked_mul(i_d)?)?;
        let i_attention = i_d.checked_mul(i_d)?.checked_add(i_d)?.checked_mul(3)?;
        let i_feed_forward = i_d.checked_mul(i_f)?.checked_mul(2)?.checked_add(i_f)?.checked_add(i_d)?;
        let i_output = i_d.checked_mul(i_v)?.checked_add(i_v)?;
        i_embeddings
            .checked_add(i_attention)?
            .checked_add(i_feed_forward)?
            .checked_add(i_output)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let s_json = std::fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&s_json)?;
        config.validate()?;
        Ok(config)
    }
}
