// layer.rs
// Description: Model layers holding the parameter tensors: token and positional embeddings,
//              single head causal self attention, feed forward, output projection.
//              Forward passes are pure; only OutputProjection exposes an in place update.
// History:
// - 2026-10-18: Single head attention with q/k/v biases and zero initialized biases.
// - 2026-10-18: Learned positional embeddings added to token embeddings.
// - 2026-10-18: Checkpoint hooks read and write parameters in a fixed flat order.

use ndarray::{Array, Array1, Array2, ArrayView1, Dimension};
use rand::Rng;

use crate::error::{ModelError, Result};
use crate::math;

pub trait Layer {
    fn layer_type(&self) -> &str;

    fn parameters(&self) -> usize;

    // Checkpoint hooks.
    fn get_parameters_flat(&self) -> Vec<f32>;
    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize>;
}

fn copy_from_flat<D: Dimension>(a_dst: &mut Array<f32, D>, v_params: &[f32], i_pos: usize) -> usize {
    for (d_dst, d_src) in a_dst.iter_mut().zip(v_params[i_pos..].iter()) {
        *d_dst = *d_src;
    }
    i_pos + a_dst.len()
}

fn check_flat_len(v_params: &[f32], i_needed: usize, s_layer: &str) -> Result<()> {
    if v_params.len() < i_needed {
        return Err(ModelError::Checkpoint(format!(
            "checkpoint_not_enough_params_{}",
            s_layer
        )));
    }
    Ok(())
}

pub struct Embeddings {
    // [vocab_size, d_model]
    pub(crate) w_token: Array2<f32>,
    // [max_seq_len, d_model]
    pub(crate) w_pos: Array2<f32>,
}

impl Embeddings {
    pub fn new<R: Rng + ?Sized>(
        i_vocab_size: usize,
        i_max_seq_len: usize,
        i_d_model: usize,
        d_scale: f32,
        rng: &mut R,
    ) -> Self {
        Self {
            w_token: math::randn_matrix(rng, i_vocab_size, i_d_model, d_scale),
            w_pos: math::randn_matrix(rng, i_max_seq_len, i_d_model, d_scale),
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.w_token.nrows()
    }

    pub fn max_seq_len(&self) -> usize {
        self.w_pos.nrows()
    }

    /// Row t is token row `v_ids[t]` plus positional row t.
    pub fn forward(&self, v_ids: &[usize]) -> Result<Array2<f32>> {
        if v_ids.len() > self.max_seq_len() {
            return Err(ModelError::invalid_input(format!(
                "sequence_length_{}_exceeds_max_seq_len_{}",
                v_ids.len(),
                self.max_seq_len()
            )));
        }

        let mut a_out = Array2::zeros((v_ids.len(), self.w_token.ncols()));
        for (i_pos, &i_id) in v_ids.iter().enumerate() {
            if i_id >= self.vocab_size() {
                return Err(ModelError::invalid_input(format!(
                    "token_id_{}_out_of_range_{}",
                    i_id,
                    self.vocab_size()
                )));
            }
            let a_row = &self.w_token.row(i_id) + &self.w_pos.row(i_pos);
            a_out.row_mut(i_pos).assign(&a_row);
        }
        Ok(a_out)
    }
}

impl Layer for Embeddings {
    fn layer_type(&self) -> &str {
        "Embeddings"
    }

    fn parameters(&self) -> usize {
        self.w_token.len() + self.w_pos.len()
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.w_token.iter().copied());
        v.extend(self.w_pos.iter().copied());
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        let i_needed = self.parameters();
        check_flat_len(v_params, i_needed, "embeddings")?;
        let i_pos = copy_from_flat(&mut self.w_token, v_params, 0);
        let i_pos = copy_from_flat(&mut self.w_pos, v_params, i_pos);
        Ok(i_pos)
    }
}

pub struct SelfAttention {
    d_model: usize,
    pub(crate) w_q: Array2<f32>,
    pub(crate) b_q: Array1<f32>,
    pub(crate) w_k: Array2<f32>,
    pub(crate) b_k: Array1<f32>,
    pub(crate) w_v: Array2<f32>,
    pub(crate) b_v: Array1<f32>,
}

impl SelfAttention {
    pub fn new<R: Rng + ?Sized>(i_d_model: usize, d_scale: f32, rng: &mut R) -> Self {
        Self {
            d_model: i_d_model,
            w_q: math::randn_matrix(rng, i_d_model, i_d_model, d_scale),
            b_q: Array1::zeros(i_d_model),
            w_k: math::randn_matrix(rng, i_d_model, i_d_model, d_scale),
            b_k: Array1::zeros(i_d_model),
            w_v: math::randn_matrix(rng, i_d_model, i_d_model, d_scale),
            b_v: Array1::zeros(i_d_model),
        }
    }

    fn compute_qkv(&self, a_input: &Array2<f32>) -> Result<(Array2<f32>, Array2<f32>, Array2<f32>)> {
        Ok((
            math::linear("attention_q", a_input, &self.w_q, &self.b_q)?,
            math::linear("attention_k", a_input, &self.w_k, &self.b_k)?,
            math::linear("attention_v", a_input, &self.w_v, &self.b_v)?,
        ))
    }

    fn weights_from(&self, a_q: &Array2<f32>, a_k: &Array2<f32>) -> Result<Array2<f32>> {
        let d_scale = 1.0 / (self.d_model as f32).sqrt();
        let mut a_scores = math::matmul("attention_scores", a_q, &a_k.t().to_owned())? * d_scale;
        math::apply_causal_mask(&mut a_scores);
        Ok(math::softmax_rows(&a_scores))
    }

    /// Masked attention weights, [seq_len, seq_len]; row i is zero past column i.
    pub fn weights(&self, a_input: &Array2<f32>) -> Result<Array2<f32>> {
        let (a_q, a_k, _) = self.compute_qkv(a_input)?;
        self.weights_from(&a_q, &a_k)
    }

    pub fn forward(&self, a_input: &Array2<f32>) -> Result<Array2<f32>> {
        let (a_q, a_k, a_v) = self.compute_qkv(a_input)?;
        let a_weights = self.weights_from(&a_q, &a_k)?;
        math::matmul("attention_out", &a_weights, &a_v)
    }
}

impl Layer for SelfAttention {
    fn layer_type(&self) -> &str {
        "SelfAttention"
    }

    fn parameters(&self) -> usize {
        self.w_q.len() + self.b_q.len() + self.w_k.len() + self.b_k.len() + self.w_v.len() + self.b_v.len()
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.w_q.iter().copied());
        v.extend(self.b_q.iter().copied());
        v.extend(self.w_k.iter().copied());
        v.extend(self.b_k.iter().copied());
        v.extend(self.w_v.iter().copied());
        v.extend(self.b_v.iter().copied());
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        check_flat_len(v_params, self.parameters(), "self_attention")?;
        let mut i_pos = copy_from_flat(&mut self.w_q, v_params, 0);
        i_pos = copy_from_flat(&mut self.b_q, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.w_k, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.b_k, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.w_v, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.b_v, v_params, i_pos);
        Ok(i_pos)
    }
}

pub struct FeedForward {
    pub(crate) w1: Array2<f32>,
    pub(crate) b1: Array1<f32>,
    pub(crate) w2: Array2<f32>,
    pub(crate) b2: Array1<f32>,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(i_d_model: usize, i_d_ff: usize, d_scale: f32, rng: &mut R) -> Self {
        Self {
            w1: math::randn_matrix(rng, i_d_model, i_d_ff, d_scale),
            b1: Array1::zeros(i_d_ff),
            w2: math::randn_matrix(rng, i_d_ff, i_d_model, d_scale),
            b2: Array1::zeros(i_d_model),
        }
    }

    pub fn forward(&self, a_input: &Array2<f32>) -> Result<Array2<f32>> {
        let a_hidden = math::relu(&math::linear("feed_forward_1", a_input, &self.w1, &self.b1)?);
        math::linear("feed_forward_2", &a_hidden, &self.w2, &self.b2)
    }
}

impl Layer for FeedForward {
    fn layer_type(&self) -> &str {
        "FeedForward"
    }

    fn parameters(&self) -> usize {
        self.w1.len() + self.b1.len() + self.w2.len() + self.b2.len()
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.w1.iter().copied());
        v.extend(self.b1.iter().copied());
        v.extend(self.w2.iter().copied());
        v.extend(self.b2.iter().copied());
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        check_flat_len(v_params, self.parameters(), "feed_forward")?;
        let mut i_pos = copy_from_flat(&mut self.w1, v_params, 0);
        i_pos = copy_from_flat(&mut self.b1, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.w2, v_params, i_pos);
        i_pos = copy_from_flat(&mut self.b2, v_params, i_pos);
        Ok(i_pos)
    }
}

pub struct OutputProjection {
    // [d_model, vocab_size]
    pub(crate) w_out: Array2<f32>,
    pub(crate) b_out: Array1<f32>,
}

impl OutputProjection {
    pub fn new<R: Rng + ?Sized>(i_d_model: usize, i_vocab_size: usize, d_scale: f32, rng: &mut R) -> Self {
        Self {
            w_out: math::randn_matrix(rng, i_d_model, i_vocab_size, d_scale),
            b_out: Array1::zeros(i_vocab_size),
        }
    }

    pub fn forward(&self, a_input: &Array2<f32>) -> Result<Array2<f32>> {
        math::linear("output_projection", a_input, &self.w_out, &self.b_out)
    }

    /// b[i] -= lr * g[i]; W[j][i] -= lr * g[i] * h[j].
    pub fn apply_gradient(&mut self, a_grad: &Array1<f32>, a_hidden: ArrayView1<f32>, d_lr: f32) -> Result<()> {
        if a_grad.len() != self.b_out.len() || a_hidden.len() != self.w_out.nrows() {
            return Err(ModelError::ShapeMismatch {
                op: "output_projection_update",
                left: self.w_out.dim(),
                right: (a_hidden.len(), a_grad.len()),
            });
        }

        for (i, &d_g) in a_grad.iter().enumerate() {
            self.b_out[i] -= d_lr * d_g;
            for (j, &d_h) in a_hidden.iter().enumerate() {
                self.w_out[[j, i]] -= d_lr * d_g * d_h;
            }
        }
        Ok(())
    }
}

impl Layer for OutputProjection {
    fn layer_type(&self) -> &str {
        "OutputProjection"
    }

    fn parameters(&self) -> usize {
        self.w_out.len() + self.b_out.len()
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.w_out.iter().copied());
        v.extend(self.b_out.iter().copied());
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        check_flat_len(v_params, self.parameters(), "output_projection")?;
        let i_pos = copy_from_flat(&mut self.w_out, v_params, 0);
        Ok(copy_from_flat(&mut self.b_out, v_params, i_pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_shapes_and_zero_biases() {
        let mut r = rng();
        let emb = Embeddings::new(10, 8, 4, 0.02, &mut r);
        let attn = SelfAttention::new(4, 0.02, &mut r);
        let ff = FeedForward::new(4, 8, 0.02, &mut r);
        let out = OutputProjection::new(4, 10, 0.02, &mut r);

        assert_eq!(emb.w_token.dim(), (10, 4));
        assert_eq!(emb.w_pos.dim(), (8, 4));
        assert_eq!(attn.w_q.dim(), (4, 4));
        assert_eq!(ff.w1.dim(), (4, 8));
        assert_eq!(ff.w2.dim(), (8, 4));
        assert_eq!(out.w_out.dim(), (4, 10));

        for b in [&attn.b_q, &attn.b_k, &attn.b_v, &ff.b1, &ff.b2, &out.b_out] {
            assert!(b.iter().all(|&x| x == 0.0));
        }
        assert!(emb.w_token.iter().any(|&x| x != 0.0));
        assert!(out.w_out.iter().all(|x| x.abs() < 0.2));
    }

    #[test]
    fn test_embedding_is_token_plus_position() {
        let mut r = rng();
        let emb = Embeddings::new(10, 8, 4, 0.02, &mut r);
        let a = emb.forward(&[3, 3]).unwrap();
        assert_eq!(a.dim(), (2, 4));
        for j in 0..4 {
            assert_eq!(a[[0, j]], emb.w_token[[3, j]] + emb.w_pos[[0, j]]);
            assert_eq!(a[[1, j]], emb.w_token[[3, j]] + emb.w_pos[[1, j]]);
        }
    }

    #[test]
    fn test_embedding_rejects_bad_input() {
        let mut r = rng();
        let emb = Embeddings::new(10, 3, 4, 0.02, &mut r);
        assert!(emb.forward(&[10]).unwrap_err().is_invalid_input());
        assert!(emb.forward(&[1, 2, 3, 4]).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_attention_weights_are_causal() {
        let mut r = rng();
        let attn = SelfAttention::new(4, 0.5, &mut r);
        let x = math::randn_matrix(&mut r, 5, 4, 1.0);
        let w = attn.weights(&x).unwrap();
        assert_eq!(w.dim(), (5, 5));
        for i in 0..5 {
            for j in (i + 1)..5 {
                assert_eq!(w[[i, j]], 0.0);
            }
            assert!((w.row(i).sum() - 1.0).abs() < 1e-5);
        }
        // First position can only see itself.
        assert!((w[[0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(attn.forward(&x).unwrap().dim(), (5, 4));
    }

    #[test]
    fn test_first_output_row_is_first_value_row() {
        let mut r = rng();
        let attn = SelfAttention::new(4, 0.5, &mut r);
        let x = math::randn_matrix(&mut r, 3, 4, 1.0);
        let out = attn.forward(&x).unwrap();
        let v = math::linear("v", &x, &attn.w_v, &attn.b_v).unwrap();
        for j in 0..4 {
            assert!((out[[0, j]] - v[[0, j]]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_feed_forward_relu_blocks_negative_hidden() {
        let mut ff = FeedForward {
            w1: array![[1.0_f32, -1.0]],
            b1: array![0.0_f32, 0.0],
            w2: array![[2.0_f32], [3.0]],
            b2: array![0.5_f32],
        };
        let x = array![[2.0_f32], [-2.0]];
        // Row 0: hidden [2, 0] -> 4.5; row 1: hidden [0, 2] -> 6.5
        assert_eq!(ff.forward(&x).unwrap(), array![[4.5], [6.5]]);

        ff.b2 = array![0.0_f32, 0.0];
        assert!(matches!(ff.forward(&x), Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_apply_gradient() {
        let mut out = OutputProjection {
            w_out: Array2::zeros((2, 3)),
            b_out: Array1::zeros(3),
        };
        let g = array![0.5_f32, -1.0, 0.25];
        let h = array![2.0_f32, -4.0];
        out.apply_gradient(&g, h.view(), 0.1).unwrap();
        assert_eq!(out.b_out, array![-0.05, 0.1, -0.025]);
        assert!((out.w_out[[0, 1]] - 0.2).abs() < 1e-6);
        assert!((out.w_out[[1, 1]] + 0.4).abs() < 1e-6);
        assert!((out.w_out[[1, 0]] - 0.2).abs() < 1e-6);

        let bad = array![1.0_f32];
        assert!(out.apply_gradient(&bad, h.view(), 0.1).is_err());
    }

    #[test]
    fn test_flat_parameters_round_trip() {
        let mut r = rng();
        let src = SelfAttention::new(4, 0.02, &mut r);
        let mut dst = SelfAttention::new(4, 0.02, &mut r);
        let v = src.get_parameters_flat();
        assert_eq!(v.len(), src.parameters());
        assert_eq!(dst.set_parameters_flat(&v).unwrap(), v.len());
        assert_eq!(dst.w_k, src.w_k);

        assert!(matches!(
            dst.set_parameters_flat(&v[..3]),
            Err(ModelError::Checkpoint(_))
        ));
        assert_eq!(dst.layer_type(), "SelfAttention");
    }
}
