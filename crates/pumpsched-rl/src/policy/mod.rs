//! Schedule policies
//!
//! A policy maps aligned `[n, 24]` profile and price matrices to `[n, 24]`
//! adjustment fractions. Trainable policies additionally expose a cached
//! forward pass, backpropagation from action gradients and their parameter
//! tensors so the optimizer can update them in place.

mod layers;
mod mlp;

pub use layers::{gelu, gelu_backward, sigmoid, Dense, DenseGrad, LayerNorm, LayerNormGrad};
pub use mlp::{MlpCache, MlpPolicy, PolicyConfig, INPUT_FEATURES, PARAMETER_TENSORS};

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, ArrayViewMutD};
use pumpsched_core::{Result, SchedError, HOURS};

/// Maps days to hourly adjustment fractions
pub trait Policy {
    /// Short identifier used in logs and reports
    fn name(&self) -> &'static str;

    fn act(
        &self,
        profiles: ArrayView2<'_, f64>,
        prices: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>>;
}

/// A policy whose parameters can be fitted by gradient descent
pub trait TrainablePolicy: Policy {
    /// Forward intermediates needed by [`TrainablePolicy::backward`]
    type Cache;

    fn forward_with_cache(
        &self,
        profiles: ArrayView2<'_, f64>,
        prices: ArrayView2<'_, f64>,
    ) -> Result<(Array2<f64>, Self::Cache)>;

    /// Parameter gradients, aligned with [`TrainablePolicy::parameters`]
    fn backward(
        &self,
        cache: &Self::Cache,
        action_grad: ArrayView2<'_, f64>,
    ) -> Result<Vec<ArrayD<f64>>>;

    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>>;

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>>;

    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}

/// Baseline that never changes the schedule
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroPolicy;

impl Policy for ZeroPolicy {
    fn name(&self) -> &'static str {
        "zero"
    }

    fn act(
        &self,
        profiles: ArrayView2<'_, f64>,
        prices: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        check_inputs(profiles, prices)?;
        Ok(Array2::zeros(profiles.raw_dim()))
    }
}

/// Profiles and prices must both be `[n, 24]`
pub fn check_inputs(profiles: ArrayView2<'_, f64>, prices: ArrayView2<'_, f64>) -> Result<()> {
    if profiles.ncols() != HOURS {
        return Err(SchedError::shape("profile row", HOURS, profiles.ncols()));
    }
    if prices.ncols() != HOURS {
        return Err(SchedError::shape("price row", HOURS, prices.ncols()));
    }
    if profiles.nrows() != prices.nrows() {
        return Err(SchedError::BatchMismatch {
            profiles: profiles.nrows(),
            prices: prices.nrows(),
        });
    }
    Ok(())
}
