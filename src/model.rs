// model.rs
// Description: TinyTransformer, the single block causal language model.
//              forward: embed -> attention (+residual) -> feed forward (+residual) -> logits.
//              train_step: softmax cross entropy gradient at the last position, applied to the
//              output projection only. generate: sliding window sampling with a fixed budget.
// History:
// - 2026-10-18: Explicit model value and injected RNG replace global state.
// - 2026-10-18: Boundary validation for ids, empty prefixes and short training inputs.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::layer::{Embeddings, FeedForward, Layer, OutputProjection, SelfAttention};
use crate::math;

/// Target probability before the update and its cross entropy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainStepStats {
    pub target_probability: f32,
    pub loss: f32,
}

pub struct TinyTransformer {
    config: ModelConfig,
    pub embeddings: Embeddings,
    pub attention: SelfAttention,
    pub feed_forward: FeedForward,
    pub output: OutputProjection,
}

// Logits plus the residual stream they were projected from.
struct ForwardPass {
    hidden: Array2<f32>,
    logits: Array2<f32>,
}

impl TinyTransformer {
    /// Allocates every tensor; weights ~ N(0, init_scale), biases zero.
    pub fn new<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let d_scale = config.init_scale;

        let embeddings = Embeddings::new(config.vocab_size, config.max_seq_len, config.d_model, d_scale, rng);
        let attention = SelfAttention::new(config.d_model, d_scale, rng);
        let feed_forward = FeedForward::new(config.d_model, config.d_ff, d_scale, rng);
        let output = OutputProjection::new(config.d_model, config.vocab_size, d_scale, rng);

        Ok(Self {
            config,
            embeddings,
            attention,
            feed_forward,
            output,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn max_seq_len(&self) -> usize {
        self.config.max_seq_len
    }

    pub(crate) fn layers(&self) -> [&dyn Layer; 4] {
        [&self.embeddings, &self.attention, &self.feed_forward, &self.output]
    }

    pub(crate) fn layers_mut(&mut self) -> [&mut dyn Layer; 4] {
        [
            &mut self.embeddings,
            &mut self.attention,
            &mut self.feed_forward,
            &mut self.output,
        ]
    }

    pub fn network_description(&self) -> String {
        self.layers()
            .iter()
            .map(|l| l.layer_type())
            .collect::<Vec<&str>>()
            .join(", ")
    }

    pub fn parameter_count(&self) -> usize {
        self.layers().iter().map(|l| l.parameters()).sum()
    }

    fn validate_ids(&self, v_ids: &[usize], s_what: &str) -> Result<()> {
        if v_ids.is_empty() {
            return Err(ModelError::invalid_input(format!("{}_is_empty", s_what)));
        }
        if let Some(&i_bad) = v_ids.iter().find(|&&i| i >= self.config.vocab_size) {
            return Err(ModelError::invalid_input(format!(
                "{}_token_id_{}_out_of_range_{}",
                s_what, i_bad, self.config.vocab_size
            )));
        }
        if v_ids.len() > self.config.max_seq_len {
            return Err(ModelError::invalid_input(format!(
                "{}_length_{}_exceeds_max_seq_len_{}",
                s_what,
                v_ids.len(),
                self.config.max_seq_len
            )));
        }
        Ok(())
    }

    fn forward_pass(&self, v_ids: &[usize]) -> Result<ForwardPass> {
        let a_x = self.embeddings.forward(v_ids)?;
        let a_attn = self.attention.forward(&a_x)?;
        let a_x = math::add("attention_residual", &a_x, &a_attn)?;
        let a_ff = self.feed_forward.forward(&a_x)?;
        let a_hidden = math::add("feed_forward_residual", &a_x, &a_ff)?;
        let a_logits = self.output.forward(&a_hidden)?;
        Ok(ForwardPass {
            hidden: a_hidden,
            logits: a_logits,
        })
    }

    /// Logits of shape [seq_len, vocab_size]. Does not touch parameters.
    pub fn forward(&self, v_ids: &[usize]) -> Result<Array2<f32>> {
        self.validate_ids(v_ids, "sequence")?;
        Ok(self.forward_pass(v_ids)?.logits)
    }

    /// Attention weights of the single head for `v_ids`, [seq_len, seq_len].
    pub fn attention_weights(&self, v_ids: &[usize]) -> Result<Array2<f32>> {
        self.validate_ids(v_ids, "sequence")?;
        let a_x = self.embeddings.forward(v_ids)?;
        self.attention.weights(&a_x)
    }

    /// One gradient step toward `i_target` on the output projection only.
    ///
    /// The gradient is `softmax(logits[last]) - onehot(target)`. The weight update uses the
    /// residual stream row just before the last position as its hidden state, so at least two
    /// input ids are required. Embedding, attention and feed forward parameters are not changed.
    pub fn train_step(&mut self, v_ids: &[usize], i_target: usize) -> Result<TrainStepStats> {
        self.validate_ids(v_ids, "training_input")?;
        if v_ids.len() < 2 {
            return Err(ModelError::invalid_input("training_input_needs_at_least_2_ids"));
        }
        if i_target >= self.config.vocab_size {
            return Err(ModelError::invalid_input(format!(
                "target_id_{}_out_of_range_{}",
                i_target, self.config.vocab_size
            )));
        }

        let pass = self.forward_pass(v_ids)?;
        let i_last = pass.logits.nrows() - 1;
        let a_probs = math::softmax_row(pass.logits.row(i_last));
        let d_target_prob = a_probs[i_target];

        let mut a_grad: Array1<f32> = a_probs;
        a_grad[i_target] -= 1.0;

        let a_hidden = pass.hidden.row(i_last - 1);
        self.output.apply_gradient(&a_grad, a_hidden, self.config.learning_rate)?;

        let stats = TrainStepStats {
            target_probability: d_target_prob,
            loss: math::cross_entropy(d_target_prob),
        };
        debug!(
            target = i_target,
            target_probability = stats.target_probability,
            loss = stats.loss,
            "train step"
        );
        Ok(stats)
    }

    /// Appends `i_new_tokens` sampled ids to `v_prefix`; the prefix is returned unchanged
    /// at the front. Only the last `max_seq_len` ids are used as context for each step.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        v_prefix: &[usize],
        i_new_tokens: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if v_prefix.is_empty() {
            return Err(ModelError::invalid_input("prefix_is_empty"));
        }
        if let Some(&i_bad) = v_prefix.iter().find(|&&i| i >= self.config.vocab_size) {
            return Err(ModelError::invalid_input(format!(
                "prefix_token_id_{}_out_of_range_{}",
                i_bad, self.config.vocab_size
            )));
        }

        let mut v_tokens: Vec<usize> = Vec::from(v_prefix);

        for _ in 0..i_new_tokens {
            let i_start = v_tokens.len().saturating_sub(self.config.max_seq_len);
            let a_logits = self.forward_pass(&v_tokens[i_start..])?.logits;
            let a_probs = math::softmax_row(a_logits.index_axis(Axis(0), a_logits.nrows() - 1));
            let i_next = sample_from_probs(&a_probs, rng);
            debug!(token = i_next, probability = a_probs[i_next], "sampled token");
            v_tokens.push(i_next);
        }
        Ok(v_tokens)
    }
}

/// First id whose cumulative probability reaches a uniform draw in [0, 1).
/// Falls back to the last id when rounding keeps the running sum below the draw.
pub fn sample_from_probs<R: Rng + ?Sized>(a_probs: &Array1<f32>, rng: &mut R) -> usize {
    let d_r: f32 = rng.random::<f32>();
    let mut d_cum: f32 = 0.0;
    for (i, &d_p) in a_probs.iter().enumerate() {
        d_cum += d_p;
        if d_r <= d_cum {
            return i;
        }
    }
    a_probs.len().saturating_sub(1)
}
