// math.rs
// Description: Matrix helpers for the forward pass (checked matmul, bias, ReLU, softmax,
//              causal mask) and the Gaussian sampler used for weight init.
// History:
// - 2026-10-18: Checked shape helpers so mismatches surface as errors, not panics.
// - 2026-10-18: Box-Muller randn over two uniform draws.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::error::{ModelError, Result};

/// Score written above the diagonal before the attention softmax.
pub const MASK_VALUE: f32 = f32::NEG_INFINITY;

/// Gaussian sample (mean 0) scaled by `d_scale`, from two independent uniform draws.
pub fn randn<R: Rng + ?Sized>(rng: &mut R, d_scale: f32) -> f32 {
    // 1 - u keeps the log argument in (0, 1].
    let d_u: f64 = 1.0 - rng.random::<f64>();
    let d_v: f64 = rng.random::<f64>();
    let d_z = (-2.0 * d_u.ln()).sqrt() * (2.0 * std::f64::consts::PI * d_v).cos();
    (d_z as f32) * d_scale
}

pub fn randn_matrix<R: Rng + ?Sized>(
    rng: &mut R,
    i_rows: usize,
    i_cols: usize,
    d_scale: f32,
) -> Array2<f32> {
    Array2::from_shape_fn((i_rows, i_cols), |_| randn(rng, d_scale))
}

pub fn matmul(op: &'static str, a: &Array2<f32>, b: &Array2<f32>) -> Result<Array2<f32>> {
    if a.ncols() != b.nrows() {
        return Err(ModelError::ShapeMismatch {
            op,
            left: a.dim(),
            right: b.dim(),
        });
    }
    Ok(a.dot(b))
}

/// `x * w + b`, with `b` broadcast over rows.
pub fn linear(op: &'static str, a_x: &Array2<f32>, a_w: &Array2<f32>, a_b: &Array1<f32>) -> Result<Array2<f32>> {
    let mut a_out = matmul(op, a_x, a_w)?;
    if a_out.ncols() != a_b.len() {
        return Err(ModelError::ShapeMismatch {
            op,
            left: a_out.dim(),
            right: (1, a_b.len()),
        });
    }
    a_out += a_b;
    Ok(a_out)
}

/// Elementwise sum used for residual connections.
pub fn add(op: &'static str, a: &Array2<f32>, b: &Array2<f32>) -> Result<Array2<f32>> {
    if a.dim() != b.dim() {
        return Err(ModelError::ShapeMismatch {
            op,
            left: a.dim(),
            right: b.dim(),
        });
    }
    Ok(a + b)
}

pub fn relu(a: &Array2<f32>) -> Array2<f32> {
    a.mapv(|x| x.max(0.0))
}

pub fn softmax_row(a_row: ArrayView1<f32>) -> Array1<f32> {
    let d_max = a_row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let a_exp = a_row.mapv(|x| (x - d_max).exp());
    let d_sum = a_exp.sum();
    a_exp / d_sum
}

pub fn softmax_rows(a: &Array2<f32>) -> Array2<f32> {
    let mut a_out = a.clone();
    for mut a_row in a_out.axis_iter_mut(Axis(0)) {
        let a_soft = softmax_row(a_row.view());
        a_row.assign(&a_soft);
    }
    a_out
}

/// Blocks attention from row i to every column j > i.
pub fn apply_causal_mask(a_scores: &mut Array2<f32>) {
    let (i_rows, i_cols) = a_scores.dim();
    for i in 0..i_rows {
        for j in (i + 1)..i_cols {
            a_scores[[i, j]] = MASK_VALUE;
        }
    }
}

pub fn cross_entropy(d_target_prob: f32) -> f32 {
    -d_target_prob.max(1e-12).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_randn_is_scaled_and_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let v: Vec<f32> = (0..n).map(|_| randn(&mut rng, 0.02)).collect();
        let d_mean = v.iter().sum::<f32>() / n as f32;
        let d_var = v.iter().map(|x| (x - d_mean) * (x - d_mean)).sum::<f32>() / n as f32;
        assert!(d_mean.abs() < 0.001, "mean {}", d_mean);
        assert!((d_var.sqrt() - 0.02).abs() < 0.002, "std {}", d_var.sqrt());
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Array2::<f32>::zeros((2, 3));
        let b = Array2::<f32>::zeros((2, 3));
        match matmul("test", &a, &b) {
            Err(ModelError::ShapeMismatch { left, right, .. }) => {
                assert_eq!(left, (2, 3));
                assert_eq!(right, (2, 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_linear_adds_bias_per_row() {
        let x = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let w = array![[1.0_f32, 0.0, 1.0], [0.0, 1.0, 1.0]];
        let b = array![0.5_f32, -0.5, 0.0];
        let y = linear("test", &x, &w, &b).unwrap();
        assert_eq!(y, array![[1.5, 1.5, 3.0], [3.5, 3.5, 7.0]]);

        let bad = array![0.0_f32];
        assert!(linear("test", &x, &w, &bad).is_err());
    }

    #[test]
    fn test_relu() {
        let a = array![[-1.0_f32, 0.0, 2.5]];
        assert_eq!(relu(&a), array![[0.0, 0.0, 2.5]]);
    }

    #[test]
    fn test_softmax_all_equal_is_uniform() {
        let a = array![5.0_f32, 5.0, 5.0, 5.0];
        let p = softmax_row(a.view());
        for x in p.iter() {
            assert!((x - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_large_values_stay_finite() {
        let a = array![1000.0_f32, 999.0, -1000.0];
        let p = softmax_row(a.view());
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_causal_mask_then_softmax_zeroes_future() {
        let mut s = Array2::<f32>::ones((4, 4));
        apply_causal_mask(&mut s);
        let w = softmax_rows(&s);
        for i in 0..4 {
            for j in 0..4 {
                if j > i {
                    assert_eq!(w[[i, j]], 0.0);
                } else {
                    assert!((w[[i, j]] - 1.0 / (i + 1) as f32).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_cross_entropy() {
        assert_eq!(cross_entropy(1.0), 0.0);
        assert!((cross_entropy(0.5) - std::f32::consts::LN_2).abs() < 1e-6);
        assert!(cross_entropy(0.0).is_finite());
    }

    proptest! {
        #[test]
        fn prop_softmax_rows_are_distributions(
            v in proptest::collection::vec(-50.0_f32..50.0, 1..32)
        ) {
            let a = Array1::from(v);
            let p = softmax_row(a.view());
            prop_assert!(p.iter().all(|&x| x >= 0.0));
            prop_assert!((p.sum() - 1.0).abs() < 1e-4);
        }
    }
}
