// lib.rs
// Description: Minimal causal language model: one embedding layer, one single head self attention
//              block with a feed forward sublayer, an output projection, a training step that only
//              updates the output projection, and sampled autoregressive generation.
// History:
// - 2026-10-18: Split binary into library and menu front end.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod layer;
pub mod math;
pub mod model;
pub mod tokenizer;
pub mod train;
pub mod utils;

pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use model::{TinyTransformer, TrainStepStats};
pub use tokenizer::Vocab;
pub use train::{Dataset, Example, TrainReport};

// Demo sizes.
pub const MAX_SEQ_LEN: usize = 16;
pub const EMBEDDING_DIM: usize = 32;
pub const HIDDEN_DIM: usize = 64;
