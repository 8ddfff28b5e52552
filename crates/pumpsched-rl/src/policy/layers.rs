//! Differentiable building blocks for the MLP policy
//!
//! Each layer keeps the forward intermediates it needs in a small cache
//! value owned by the caller, so a forward pass never mutates the layer.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;
const GELU_CUBIC: f64 = 0.044_715;

/// Affine layer `y = x W + b` with `W: [inputs, outputs]`
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub(crate) weight: Array2<f64>,
    pub(crate) bias: Array1<f64>,
}

/// Parameter gradients of a [`Dense`] layer
#[derive(Debug, Clone)]
pub struct DenseGrad {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Dense {
    /// Uniform init in `±1/sqrt(inputs)` for weights and biases
    pub fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let weight =
            Array2::from_shape_simple_fn((inputs, outputs), || rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_simple_fn(outputs, || rng.gen_range(-bound..bound));
        Self { weight, bias }
    }

    pub fn inputs(&self) -> usize {
        self.weight.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weight.ncols()
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.dot(&self.weight) + &self.bias
    }

    /// Returns the input gradient and the parameter gradients
    pub fn backward(
        &self,
        x: ArrayView2<'_, f64>,
        grad_out: ArrayView2<'_, f64>,
    ) -> (Array2<f64>, DenseGrad) {
        let grad_in = grad_out.dot(&self.weight.t());
        let grad = DenseGrad {
            weight: x.t().dot(&grad_out),
            bias: grad_out.sum_axis(Axis(0)),
        };
        (grad_in, grad)
    }
}

/// Row-wise layer normalization with learned scale and shift
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNorm {
    pub(crate) gamma: Array1<f64>,
    pub(crate) beta: Array1<f64>,
    eps: f64,
}

#[derive(Debug, Clone)]
pub struct LayerNormCache {
    normalized: Array2<f64>,
    inv_std: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct LayerNormGrad {
    pub gamma: Array1<f64>,
    pub beta: Array1<f64>,
}

impl LayerNorm {
    pub const DEFAULT_EPS: f64 = 1e-5;

    pub fn new(width: usize) -> Self {
        Self {
            gamma: Array1::ones(width),
            beta: Array1::zeros(width),
            eps: Self::DEFAULT_EPS,
        }
    }

    pub fn width(&self) -> usize {
        self.gamma.len()
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>) -> (Array2<f64>, LayerNormCache) {
        let width = x.ncols().max(1) as f64;
        let mean = x.sum_axis(Axis(1)) / width;
        let centered = &x - &mean.view().insert_axis(Axis(1));
        // Biased variance
        let var = centered.mapv(|v| v * v).sum_axis(Axis(1)) / width;
        let inv_std = var.mapv(|v| 1.0 / (v + self.eps).sqrt());
        let normalized = centered * &inv_std.view().insert_axis(Axis(1));
        let out = &normalized * &self.gamma + &self.beta;
        (out, LayerNormCache { normalized, inv_std })
    }

    pub fn backward(
        &self,
        cache: &LayerNormCache,
        grad_out: ArrayView2<'_, f64>,
    ) -> (Array2<f64>, LayerNormGrad) {
        let grad = LayerNormGrad {
            gamma: (&grad_out * &cache.normalized).sum_axis(Axis(0)),
            beta: grad_out.sum_axis(Axis(0)),
        };

        let width = grad_out.ncols().max(1) as f64;
        let grad_norm = &grad_out * &self.gamma;
        let sum_grad = grad_norm.sum_axis(Axis(1)).insert_axis(Axis(1));
        let sum_grad_norm = (&grad_norm * &cache.normalized)
            .sum_axis(Axis(1))
            .insert_axis(Axis(1));
        let scale = cache.inv_std.view().insert_axis(Axis(1)).mapv(|s| s / width);

        let grad_in = (grad_norm * width - &sum_grad - &cache.normalized * &sum_grad_norm) * &scale;
        (grad_in, grad)
    }
}

/// GELU, tanh approximation
pub fn gelu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 0.5 * v * (1.0 + (SQRT_2_OVER_PI * (v + GELU_CUBIC * v * v * v)).tanh()))
}

/// Chain rule through [`gelu`] given its input
pub fn gelu_backward(x: &Array2<f64>, grad_out: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut grad = grad_out.to_owned();
    grad.zip_mut_with(x, |g, &v| {
        let th = (SQRT_2_OVER_PI * (v + GELU_CUBIC * v * v * v)).tanh();
        let du = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_CUBIC * v * v);
        *g *= 0.5 * (1.0 + th) + 0.5 * v * (1.0 - th * th) * du;
    });
    grad
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_input() -> Array2<f64> {
        Array2::from_shape_fn((3, 5), |(i, j)| ((i * 5 + j) as f64 * 0.37).sin() * 2.0)
    }

    #[test]
    fn test_dense_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let dense = Dense::new(5, 4, &mut rng);
        assert_eq!(dense.inputs(), 5);
        assert_eq!(dense.outputs(), 4);
        let bound = 1.0 / 5f64.sqrt();
        assert!(dense.weight.iter().all(|w| w.abs() <= bound));

        let x = sample_input();
        let y = dense.forward(x.view());
        assert_eq!(y.dim(), (3, 4));
        let (gx, grad) = dense.backward(x.view(), Array2::ones((3, 4)).view());
        assert_eq!(gx.dim(), (3, 5));
        assert_eq!(grad.weight.dim(), (5, 4));
        assert_eq!(grad.bias, Array1::from_elem(4, 3.0));
    }

    #[test]
    fn test_layer_norm_normalizes_rows() {
        let norm = LayerNorm::new(5);
        let (y, _) = norm.forward(sample_input().view());
        for row in y.outer_iter() {
            let mean = row.sum() / 5.0;
            let var = row.mapv(|v| (v - mean) * (v - mean)).sum() / 5.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_layer_norm_backward_matches_finite_differences() {
        let mut norm = LayerNorm::new(5);
        norm.gamma = Array1::from(vec![0.5, 1.5, -0.7, 1.0, 2.0]);
        norm.beta = Array1::from(vec![0.1, 0.0, -0.2, 0.3, 0.0]);
        let x = sample_input();
        // Weighted sum of outputs as scalar objective
        let weights = Array2::from_shape_fn((3, 5), |(i, j)| (i as f64 + 1.0) * (j as f64 - 2.0));
        let objective = |x: &Array2<f64>| (&norm.forward(x.view()).0 * &weights).sum();

        let (_, cache) = norm.forward(x.view());
        let (gx, _) = norm.backward(&cache, weights.view());

        let h = 1e-6;
        for i in 0..3 {
            for j in 0..5 {
                let mut plus = x.clone();
                plus[[i, j]] += h;
                let mut minus = x.clone();
                minus[[i, j]] -= h;
                let numeric = (objective(&plus) - objective(&minus)) / (2.0 * h);
                assert!((numeric - gx[[i, j]]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_gelu_backward_matches_finite_differences() {
        let x = sample_input();
        let ones = Array2::ones(x.raw_dim());
        let grad = gelu_backward(&x, ones.view());
        let h = 1e-6;
        for (idx, v) in x.indexed_iter() {
            let plus = gelu(&Array2::from_elem((1, 1), v + h))[[0, 0]];
            let minus = gelu(&Array2::from_elem((1, 1), v - h))[[0, 0]];
            assert!(((plus - minus) / (2.0 * h) - grad[idx]).abs() < 1e-7);
        }
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }
}
