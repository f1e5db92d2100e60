// train.rs
// Description: Training examples (input text -> output text), JSON persistence, and training
//              passes that turn each example into one output layer gradient step.
// History:
// - 2026-10-18: Dataset of text pairs persisted as JSON; missing file loads as empty.
// - 2026-10-18: train_all skips invalid examples instead of aborting the pass.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ModelError, Result};
use crate::model::{TinyTransformer, TrainStepStats};
use crate::tokenizer::{Vocab, S_BOS};
use crate::utils;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing file loads as an empty dataset.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let s_json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s_json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let s_json = serde_json::to_string_pretty(self)?;
        utils::write_file_atomic(path.as_ref(), &s_json)
    }

    pub fn add(&mut self, s_input: &str, s_output: &str) -> Result<()> {
        let s_input = s_input.trim();
        let s_output = s_output.trim();
        if s_input.is_empty() || s_output.is_empty() {
            return Err(ModelError::invalid_input("example_input_and_output_required"));
        }
        self.examples.push(Example {
            input: s_input.to_string(),
            output: s_output.to_string(),
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.examples.clear();
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Example> {
        self.examples.iter()
    }

    pub fn render(&self) -> String {
        if self.examples.is_empty() {
            return "No examples yet.".to_string();
        }
        self.examples
            .iter()
            .enumerate()
            .map(|(i, ex)| format!("{}. {} → {}", i + 1, ex.input, ex.output))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Outcome of one pass over a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainReport {
    pub examples: usize,
    pub skipped: usize,
    pub mean_loss: f32,
}

/// Ids for "<bos> input", keeping only the last `i_max_seq_len`.
pub fn encode_prompt(vocab: &Vocab, s_input: &str, i_max_seq_len: usize) -> Vec<usize> {
    let mut v_ids = vocab.encode(&format!("{} {}", S_BOS, s_input));
    if v_ids.len() > i_max_seq_len {
        v_ids.drain(..v_ids.len() - i_max_seq_len);
    }
    v_ids
}

/// One step toward the first word of `s_output` given "<bos> input".
pub fn train_example(
    model: &mut TinyTransformer,
    vocab: &Vocab,
    s_input: &str,
    s_output: &str,
) -> Result<TrainStepStats> {
    let v_input_ids = encode_prompt(vocab, s_input, model.max_seq_len());
    let i_target = vocab
        .encode(s_output)
        .first()
        .copied()
        .ok_or_else(|| ModelError::invalid_input("example_output_has_no_tokens"))?;
    model.train_step(&v_input_ids, i_target)
}

pub fn train_all(model: &mut TinyTransformer, vocab: &Vocab, dataset: &Dataset) -> TrainReport {
    let mut i_trained: usize = 0;
    let mut i_skipped: usize = 0;
    let mut d_total_loss: f32 = 0.0;

    for (i, ex) in dataset.iter().enumerate() {
        match train_example(model, vocab, &ex.input, &ex.output) {
            Ok(stats) => {
                d_total_loss += stats.loss;
                i_trained += 1;
            }
            Err(e) => {
                warn!(example = i + 1, error = %e, "skipping training example");
                i_skipped += 1;
            }
        }
    }

    let d_mean_loss = if i_trained == 0 {
        0.0
    } else {
        d_total_loss / i_trained as f32
    };
    info!(
        examples = i_trained,
        skipped = i_skipped,
        mean_loss = d_mean_loss,
        "training complete"
    );

    TrainReport {
        examples: i_trained,
        skipped: i_skipped,
        mean_loss: d_mean_loss,
    }
}
