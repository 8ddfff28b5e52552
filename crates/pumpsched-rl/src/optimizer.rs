//! Adam optimizer, gradient clipping and step learning-rate schedule

use ndarray::{ArrayD, ArrayViewMutD, Zip};
use pumpsched_core::{Result, SchedError};
use serde::{Deserialize, Serialize};

/// Adam hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam with bias-corrected moment estimates
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    learning_rate: f64,
    steps: u64,
    first_moment: Vec<ArrayD<f64>>,
    second_moment: Vec<ArrayD<f64>>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            config,
            steps: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Apply one update. `grads` must align with `params` tensor by tensor.
    pub fn step(
        &mut self,
        params: Vec<ArrayViewMutD<'_, f64>>,
        grads: &[ArrayD<f64>],
    ) -> Result<()> {
        if params.len() != grads.len() {
            return Err(SchedError::shape("gradient tensors", params.len(), grads.len()));
        }
        for (index, (param, grad)) in params.iter().zip(grads).enumerate() {
            if param.shape() != grad.shape() {
                return Err(SchedError::shape(
                    format!("gradient tensor {index}"),
                    param.len(),
                    grad.len(),
                ));
            }
        }

        let stale = self.first_moment.len() != grads.len()
            || self.first_moment.iter().zip(grads).any(|(m, g)| m.shape() != g.shape());
        if stale {
            self.first_moment = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.second_moment = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
        }

        self.steps += 1;
        let AdamConfig {
            beta1,
            beta2,
            epsilon,
            ..
        } = self.config;
        let t = self.steps as i32;
        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);
        let lr = self.learning_rate;

        for (((param, grad), m), v) in params
            .into_iter()
            .zip(grads)
            .zip(self.first_moment.iter_mut())
            .zip(self.second_moment.iter_mut())
        {
            Zip::from(param)
                .and(grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + epsilon);
                });
        }
        Ok(())
    }
}

/// L2 norm over every gradient entry
pub fn global_norm(grads: &[ArrayD<f64>]) -> f64 {
    grads
        .iter()
        .map(|g| g.iter().map(|v| v * v).sum::<f64>())
        .sum::<f64>()
        .sqrt()
}

/// Scale gradients so their global norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut [ArrayD<f64>], max_norm: f64) -> f64 {
    let norm = global_norm(grads);
    let coef = max_norm / (norm + 1e-6);
    if coef < 1.0 {
        for grad in grads.iter_mut() {
            grad.mapv_inplace(|v| v * coef);
        }
    }
    norm
}

/// Multiplies the base learning rate by `gamma` every `step_size` epochs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLr {
    pub base_lr: f64,
    pub step_size: usize,
    pub gamma: f64,
}

impl StepLr {
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
        }
    }

    /// Learning rate in effect during `epoch` (0-based)
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        let decays = (epoch / self.step_size) as i32;
        self.base_lr * self.gamma.powi(decays)
    }
}
