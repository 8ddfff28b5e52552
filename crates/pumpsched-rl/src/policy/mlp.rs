//! Reference MLP policy
//!
//! `[profiles | prices]` (48 features) feed three Dense → LayerNorm → GELU
//! blocks of widths `h`, `2h`, `h`, then a Dense head to 24 outputs with
//! `tanh`. Each hour is scaled by `sigmoid(adaptation[hour])` and the result
//! is clamped to `±max_action`.

use ndarray::{concatenate, Array1, Array2, ArrayD, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use pumpsched_core::{Result, SchedError, HOURS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::layers::{gelu, gelu_backward, sigmoid, Dense, LayerNorm, LayerNormCache};
use super::{check_inputs, Policy, TrainablePolicy};
use crate::numeric::clamp_passes;

/// Width of the concatenated profile and price input
pub const INPUT_FEATURES: usize = 2 * HOURS;

/// Number of parameter tensors exposed by [`MlpPolicy`]
pub const PARAMETER_TENSORS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub hidden_size: usize,
    /// Symmetric bound on emitted adjustment fractions
    pub max_action: f64,
    /// Seed for parameter initialization
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            max_action: 0.5,
            seed: 42,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(SchedError::Config("policy.hidden_size must be positive".into()));
        }
        if !(self.max_action.is_finite() && self.max_action > 0.0) {
            return Err(SchedError::Config(format!(
                "policy.max_action must be positive, got {}",
                self.max_action
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    dense: Dense,
    norm: LayerNorm,
}

#[derive(Debug, Clone)]
struct BlockCache {
    input: Array2<f64>,
    norm: LayerNormCache,
    activation_input: Array2<f64>,
}

impl Block {
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        Self {
            dense: Dense::new(inputs, outputs, rng),
            norm: LayerNorm::new(outputs),
        }
    }

    fn forward(&self, x: Array2<f64>) -> (Array2<f64>, BlockCache) {
        let z = self.dense.forward(x.view());
        let (y, norm) = self.norm.forward(z.view());
        let out = gelu(&y);
        let cache = BlockCache {
            input: x,
            norm,
            activation_input: y,
        };
        (out, cache)
    }

    /// Pushes `[dense.w, dense.b, norm.gamma, norm.beta]` onto `grads`
    fn backward(
        &self,
        cache: &BlockCache,
        grad_out: ArrayView2<'_, f64>,
        grads: &mut Vec<ArrayD<f64>>,
    ) -> Array2<f64> {
        let grad_y = gelu_backward(&cache.activation_input, grad_out);
        let (grad_z, norm_grad) = self.norm.backward(&cache.norm, grad_y.view());
        let (grad_x, dense_grad) = self.dense.backward(cache.input.view(), grad_z.view());
        grads.push(dense_grad.weight.into_dyn());
        grads.push(dense_grad.bias.into_dyn());
        grads.push(norm_grad.gamma.into_dyn());
        grads.push(norm_grad.beta.into_dyn());
        grad_x
    }
}

/// Forward intermediates of one [`MlpPolicy`] pass
#[derive(Debug, Clone)]
pub struct MlpCache {
    blocks: Vec<BlockCache>,
    head_input: Array2<f64>,
    base: Array2<f64>,
    scale: Array1<f64>,
    scaled: Array2<f64>,
}

/// Feed-forward policy with per-hour learned output scaling
#[derive(Debug, Clone, PartialEq)]
pub struct MlpPolicy {
    config: PolicyConfig,
    blocks: [Block; 3],
    head: Dense,
    adaptation: Array1<f64>,
}

impl MlpPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let h = config.hidden_size;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let blocks = [
            Block::new(INPUT_FEATURES, h, &mut rng),
            Block::new(h, 2 * h, &mut rng),
            Block::new(2 * h, h, &mut rng),
        ];
        let head = Dense::new(h, HOURS, &mut rng);
        let adaptation = Array1::from_shape_simple_fn(HOURS, || rng.sample(StandardNormal));
        Ok(Self {
            config,
            blocks,
            head,
            adaptation,
        })
    }

    /// Rebuilds a policy from tensors previously taken from [`MlpPolicy::tensors`]
    pub fn from_tensors(config: PolicyConfig, tensors: Vec<ArrayD<f64>>) -> Result<Self> {
        let mut policy = Self::new(config)?;
        if tensors.len() != PARAMETER_TENSORS {
            return Err(SchedError::Checkpoint(format!(
                "expected {PARAMETER_TENSORS} parameter tensors, found {}",
                tensors.len()
            )));
        }
        let pairs = policy.parameters_mut().into_iter().zip(tensors);
        for (index, (mut dst, src)) in pairs.enumerate() {
            if dst.shape() != src.shape() {
                return Err(SchedError::Checkpoint(format!(
                    "tensor {index} has shape {:?}, expected {:?}",
                    src.shape(),
                    dst.shape()
                )));
            }
            dst.assign(&src);
        }
        Ok(policy)
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Owned copies of every parameter tensor
    pub fn tensors(&self) -> Vec<ArrayD<f64>> {
        self.parameters().into_iter().map(|p| p.to_owned()).collect()
    }

    fn features(profiles: ArrayView2<'_, f64>, prices: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_inputs(profiles, prices)?;
        concatenate(Axis(1), &[profiles.view(), prices.view()])
            .map_err(|e| SchedError::Parse(format!("cannot join profile and price features: {e}")))
    }
}

impl Policy for MlpPolicy {
    fn name(&self) -> &'static str {
        "mlp"
    }

    fn act(
        &self,
        profiles: ArrayView2<'_, f64>,
        prices: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        self.forward_with_cache(profiles, prices).map(|(actions, _)| actions)
    }
}

impl TrainablePolicy for MlpPolicy {
    type Cache = MlpCache;

    fn forward_with_cache(
        &self,
        profiles: ArrayView2<'_, f64>,
        prices: ArrayView2<'_, f64>,
    ) -> Result<(Array2<f64>, MlpCache)> {
        let mut x = Self::features(profiles, prices)?;
        let mut caches = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (out, cache) = block.forward(x);
            caches.push(cache);
            x = out;
        }

        let base = self.head.forward(x.view()).mapv(f64::tanh);
        let scale = self.adaptation.mapv(sigmoid);
        let scaled = &base * &scale;
        let limit = self.config.max_action;
        let actions = scaled.mapv(|a| a.clamp(-limit, limit));

        let cache = MlpCache {
            blocks: caches,
            head_input: x,
            base,
            scale,
            scaled,
        };
        Ok((actions, cache))
    }

    fn backward(
        &self,
        cache: &MlpCache,
        action_grad: ArrayView2<'_, f64>,
    ) -> Result<Vec<ArrayD<f64>>> {
        if action_grad.dim() != cache.scaled.dim() {
            return Err(SchedError::shape(
                "action gradient rows",
                cache.scaled.nrows(),
                action_grad.nrows(),
            ));
        }

        let limit = self.config.max_action;
        let mut grad_scaled = action_grad.to_owned();
        grad_scaled.zip_mut_with(&cache.scaled, |g, &s| {
            if !clamp_passes(s, -limit, limit) {
                *g = 0.0;
            }
        });

        let adaptation_grad = (&grad_scaled * &cache.base).sum_axis(Axis(0))
            * &cache.scale.mapv(|s| s * (1.0 - s));
        let mut grad_pre_tanh = grad_scaled * &cache.scale;
        grad_pre_tanh.zip_mut_with(&cache.base, |g, &b| *g *= 1.0 - b * b);

        let (mut grad_x, head_grad) =
            self.head.backward(cache.head_input.view(), grad_pre_tanh.view());

        // Collected output-first, reversed into parameter order below
        let mut block_grads: Vec<Vec<ArrayD<f64>>> = Vec::with_capacity(self.blocks.len());
        for (block, block_cache) in self.blocks.iter().zip(&cache.blocks).rev() {
            let mut grads = Vec::with_capacity(4);
            grad_x = block.backward(block_cache, grad_x.view(), &mut grads);
            block_grads.push(grads);
        }

        let mut grads: Vec<ArrayD<f64>> = block_grads.into_iter().rev().flatten().collect();
        grads.push(head_grad.weight.into_dyn());
        grads.push(head_grad.bias.into_dyn());
        grads.push(adaptation_grad.into_dyn());
        Ok(grads)
    }

    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut params = Vec::with_capacity(PARAMETER_TENSORS);
        for block in &self.blocks {
            params.push(block.dense.weight.view().into_dyn());
            params.push(block.dense.bias.view().into_dyn());
            params.push(block.norm.gamma.view().into_dyn());
            params.push(block.norm.beta.view().into_dyn());
        }
        params.push(self.head.weight.view().into_dyn());
        params.push(self.head.bias.view().into_dyn());
        params.push(self.adaptation.view().into_dyn());
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut params = Vec::with_capacity(PARAMETER_TENSORS);
        for block in &mut self.blocks {
            params.push(block.dense.weight.view_mut().into_dyn());
            params.push(block.dense.bias.view_mut().into_dyn());
            params.push(block.norm.gamma.view_mut().into_dyn());
            params.push(block.norm.beta.view_mut().into_dyn());
        }
        params.push(self.head.weight.view_mut().into_dyn());
        params.push(self.head.bias.view_mut().into_dyn());
        params.push(self.adaptation.view_mut().into_dyn());
        params
    }
}
