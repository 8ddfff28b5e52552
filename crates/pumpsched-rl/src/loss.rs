//! Training loss
//!
//! `loss = -mean(reward) * reward_weight + mean(violation) * balance_weight
//!        + mean(|a[t+1] - a[t]|) * smoothness_weight`

use ndarray::{s, Array2, ArrayView2, Axis};
use pumpsched_core::{Batch, Result};
use serde::{Deserialize, Serialize};

use crate::numeric::{check_action_shape, sign};
use crate::reward::RewardEvaluator;
use crate::violation::BalanceTracker;

/// Static loss weights; the balance weight is scheduled per epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub reward_weight: f64,
    pub smoothness_weight: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            reward_weight: 2.0,
            smoothness_weight: 500.0,
        }
    }
}

/// Scalar terms of one batch loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossBreakdown {
    pub loss: f64,
    pub mean_reward: f64,
    pub mean_violation: f64,
    pub smoothness: f64,
    pub balance_weight: f64,
}

impl LossBreakdown {
    pub fn is_finite(&self) -> bool {
        self.loss.is_finite()
    }
}

/// Combines reward, violation and smoothness into one differentiable loss
#[derive(Debug, Clone, Default)]
pub struct LossFunction {
    config: LossConfig,
    reward: RewardEvaluator,
    tracker: BalanceTracker,
}

impl LossFunction {
    pub fn new(config: LossConfig, reward: RewardEvaluator, tracker: BalanceTracker) -> Self {
        Self {
            config,
            reward,
            tracker,
        }
    }

    /// Loss value and its gradient with respect to every action
    pub fn evaluate(
        &self,
        batch: &Batch,
        actions: ArrayView2<'_, f64>,
        balance_weight: f64,
    ) -> Result<(LossBreakdown, Array2<f64>)> {
        check_action_shape(batch, actions)?;
        let n = batch.len().max(1) as f64;

        let (rewards, reward_grad) = self.reward.evaluate_batch_with_gradient(batch, actions)?;
        let (violations, violation_grad) = self.tracker.score_batch_with_gradient(batch, actions)?;

        let mean_reward = rewards.mean().unwrap_or(0.0);
        let mean_violation = violations.mean().unwrap_or(0.0);

        let diffs = &actions.slice(s![.., 1..]) - &actions.slice(s![.., ..-1]);
        let smoothness = if diffs.is_empty() {
            0.0
        } else {
            diffs.mapv(f64::abs).sum() / diffs.len() as f64
        };

        let loss = -mean_reward * self.config.reward_weight
            + mean_violation * balance_weight
            + smoothness * self.config.smoothness_weight;

        let mut gradient = reward_grad * (-self.config.reward_weight / n);
        gradient.scaled_add(balance_weight / n, &violation_grad);

        if !diffs.is_empty() {
            let scale = self.config.smoothness_weight / diffs.len() as f64;
            let steps = diffs.len_of(Axis(1));
            for (mut row, diff_row) in gradient.outer_iter_mut().zip(diffs.outer_iter()) {
                for t in 0..steps {
                    let g = scale * sign(diff_row[t]);
                    row[t + 1] += g;
                    row[t] -= g;
                }
            }
        }

        Ok((
            LossBreakdown {
                loss,
                mean_reward,
                mean_violation,
                smoothness,
                balance_weight,
            },
            gradient,
        ))
    }
}
