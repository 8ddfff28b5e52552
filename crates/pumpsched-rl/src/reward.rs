//! Price-sensitive reward
//!
//! Combines relative cost savings with incentives for acting in hours whose
//! price differs strongly from the daily mean. Every ratio is guarded by an
//! additive epsilon and clamped at the step where it is formed, and the
//! weighted total is clamped again.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use pumpsched_core::{mean_price, ActionVector, Batch, DayProfile, PriceSeries, Result};
use serde::{Deserialize, Serialize};

use crate::numeric::{check_action_shape, clamp_passes, sign};

/// Weights and numerical guards of the reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub epsilon: f64,
    /// Actions are clamped to `[-action_limit, action_limit]` before costing
    pub action_limit: f64,
    pub savings_clamp: f64,
    pub price_diff_clamp: f64,
    pub savings_weight: f64,
    pub cheap_usage_weight: f64,
    pub expensive_compensation_weight: f64,
    pub reward_clamp: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            action_limit: 1.0,
            savings_clamp: 10.0,
            price_diff_clamp: 10.0,
            savings_weight: 4.0,
            cheap_usage_weight: 1.5,
            expensive_compensation_weight: 1.0,
            reward_clamp: 100.0,
        }
    }
}

/// The reward terms of one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub cost_savings: f64,
    pub cheap_hour_usage: f64,
    pub expensive_hour_compensation: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RewardEvaluator {
    config: RewardConfig,
}

impl RewardEvaluator {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// `clamp(|price - mean| / (mean + eps), 0, max)` per hour
    pub fn price_diff_magnitude(&self, prices: ArrayView1<'_, f64>) -> Array1<f64> {
        let mean = mean_price(prices);
        let denom = mean + self.config.epsilon;
        prices.mapv(|p| ((p - mean).abs() / denom).clamp(0.0, self.config.price_diff_clamp))
    }

    pub fn evaluate_day(
        &self,
        profile: &DayProfile,
        prices: &PriceSeries,
        actions: &ActionVector,
    ) -> RewardBreakdown {
        self.compute(profile.view(), prices.view(), actions.view(), None)
    }

    /// Breakdown for every batch item
    pub fn evaluate_batch(
        &self,
        batch: &Batch,
        actions: ArrayView2<'_, f64>,
    ) -> Result<Vec<RewardBreakdown>> {
        check_action_shape(batch, actions)?;
        let (profiles, prices) = (batch.profiles(), batch.prices());
        Ok((0..batch.len())
            .map(|i| self.compute(profiles.row(i), prices.row(i), actions.row(i), None))
            .collect())
    }

    /// Total rewards and the `[n, 24]` gradient of each item's total
    pub fn evaluate_batch_with_gradient(
        &self,
        batch: &Batch,
        actions: ArrayView2<'_, f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        check_action_shape(batch, actions)?;
        let mut totals = Array1::zeros(batch.len());
        let mut gradient = Array2::zeros(actions.raw_dim());
        let (profiles, prices) = (batch.profiles(), batch.prices());
        for i in 0..batch.len() {
            let breakdown = self.compute(
                profiles.row(i),
                prices.row(i),
                actions.row(i),
                Some(gradient.row_mut(i)),
            );
            totals[i] = breakdown.total;
        }
        Ok((totals, gradient))
    }

    fn compute(
        &self,
        profile: ArrayView1<'_, f64>,
        prices: ArrayView1<'_, f64>,
        actions: ArrayView1<'_, f64>,
        gradient: Option<ArrayViewMut1<'_, f64>>,
    ) -> RewardBreakdown {
        let cfg = &self.config;
        let mean = mean_price(prices);
        let limit = cfg.action_limit;

        let mut baseline_cost = 0.0;
        let mut adjusted_cost = 0.0;
        for ((p, price), a) in profile.iter().zip(prices.iter()).zip(actions.iter()) {
            baseline_cost += p * price;
            adjusted_cost += p * (1.0 + a.clamp(-limit, limit)) * price;
        }

        let savings_denom = baseline_cost + cfg.epsilon;
        let raw_savings = (baseline_cost - adjusted_cost) / savings_denom;
        let cost_savings = raw_savings.clamp(-cfg.savings_clamp, cfg.savings_clamp);

        let price_diff = self.price_diff_magnitude(prices);
        let mut cheap_hour_usage = 0.0;
        let mut expensive_hour_compensation = 0.0;
        for ((price, a), diff) in prices.iter().zip(actions.iter()).zip(price_diff.iter()) {
            if *price < mean {
                cheap_hour_usage += a.abs() * diff;
            } else {
                expensive_hour_compensation += a.abs() * diff;
            }
        }

        let raw_total = cost_savings * cfg.savings_weight
            + cheap_hour_usage * cfg.cheap_usage_weight
            + expensive_hour_compensation * cfg.expensive_compensation_weight;
        let total = raw_total.clamp(-cfg.reward_clamp, cfg.reward_clamp);

        if let Some(mut grad) = gradient {
            if clamp_passes(raw_total, -cfg.reward_clamp, cfg.reward_clamp) {
                let savings_open = clamp_passes(raw_savings, -cfg.savings_clamp, cfg.savings_clamp);
                for t in 0..grad.len().min(actions.len()) {
                    let a = actions[t];
                    let mut g = 0.0;
                    if savings_open && clamp_passes(a, -limit, limit) {
                        // d adjusted_cost / d a = profile * price
                        g -= cfg.savings_weight * profile[t] * prices[t] / savings_denom;
                    }
                    let weight = if prices[t] < mean {
                        cfg.cheap_usage_weight
                    } else {
                        cfg.expensive_compensation_weight
                    };
                    g += weight * sign(a) * price_diff[t];
                    grad[t] = g;
                }
            } else {
                grad.fill(0.0);
            }
        }

        RewardBreakdown {
            cost_savings,
            cheap_hour_usage,
            expensive_hour_compensation,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SCENARIO_PRICES: [f64; 24] = [
        10.0, 8.0, 5.0, 5.0, 5.0, 8.0, 15.0, 30.0, 90.0, 95.0, 85.0, 60.0, 40.0, 35.0, 30.0, 30.0,
        35.0, 50.0, 80.0, 85.0, 80.0, 75.0, 70.0, 20.0,
    ];

    fn single_batch(profile: Vec<f64>, prices: Vec<f64>) -> Batch {
        Batch::new(
            Array2::from_shape_vec((1, 24), profile).unwrap(),
            Array2::from_shape_vec((1, 24), prices).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_actions_zero_reward() {
        let evaluator = RewardEvaluator::default();
        let breakdown = evaluator.evaluate_day(
            &DayProfile::new(vec![-20.0; 24]).unwrap(),
            &PriceSeries::new(SCENARIO_PRICES.to_vec()).unwrap(),
            &ActionVector::zeros(),
        );
        assert_eq!(breakdown.cost_savings, 0.0);
        assert_eq!(breakdown.cheap_hour_usage, 0.0);
        assert_eq!(breakdown.expensive_hour_compensation, 0.0);
        assert_eq!(breakdown.total, 0.0);
    }

    #[test]
    fn test_flat_prices_have_no_price_incentive() {
        let evaluator = RewardEvaluator::default();
        let prices = PriceSeries::new(vec![42.0; 24]).unwrap();
        assert!(evaluator
            .price_diff_magnitude(prices.view())
            .iter()
            .all(|d| *d == 0.0));

        let breakdown = evaluator.evaluate_day(
            &DayProfile::new(vec![-20.0; 24]).unwrap(),
            &prices,
            &ActionVector::new(vec![0.3; 24]).unwrap(),
        );
        assert_eq!(breakdown.cheap_hour_usage, 0.0);
        assert_eq!(breakdown.expensive_hour_compensation, 0.0);
    }

    #[test]
    fn test_cost_savings_sign() {
        // Positive consumption, reduce in the most expensive hour
        let evaluator = RewardEvaluator::default();
        let mut actions = vec![0.0; 24];
        actions[9] = -0.5;
        let breakdown = evaluator.evaluate_day(
            &DayProfile::new(vec![10.0; 24]).unwrap(),
            &PriceSeries::new(SCENARIO_PRICES.to_vec()).unwrap(),
            &ActionVector::new(actions).unwrap(),
        );
        let baseline: f64 = SCENARIO_PRICES.iter().sum::<f64>() * 10.0;
        let expected = (0.5 * 10.0 * 95.0) / (baseline + 1e-6);
        assert!((breakdown.cost_savings - expected).abs() < 1e-12);
        assert!(breakdown.expensive_hour_compensation > 0.0);
        assert_eq!(breakdown.cheap_hour_usage, 0.0);
    }

    #[test]
    fn test_near_zero_baseline_is_clamped() {
        let evaluator = RewardEvaluator::default();
        let mut profile = vec![0.0; 24];
        profile[0] = 1e-9;
        let breakdown = evaluator.evaluate_day(
            &DayProfile::new(profile).unwrap(),
            &PriceSeries::new(vec![1.0; 24]).unwrap(),
            &ActionVector::new(vec![-1.0; 24]).unwrap(),
        );
        assert!(breakdown.cost_savings.is_finite());
        assert!(breakdown.cost_savings.abs() <= 10.0);
    }

    #[test]
    fn test_reward_bounded_for_random_inputs() {
        let evaluator = RewardEvaluator::default();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let scale = 10f64.powi(rng.gen_range(-3..6));
            let profile: Vec<f64> = (0..24).map(|_| rng.gen_range(-1.0..1.0) * scale).collect();
            let prices: Vec<f64> = (0..24).map(|_| rng.gen_range(-5.0..200.0)).collect();
            let actions: Vec<f64> = (0..24).map(|_| rng.gen_range(-3.0..3.0)).collect();
            let breakdown = evaluator.evaluate_day(
                &DayProfile::new(profile).unwrap(),
                &PriceSeries::new(prices).unwrap(),
                &ActionVector::new(actions).unwrap(),
            );
            assert!(breakdown.total >= -100.0 && breakdown.total <= 100.0);
            assert!(breakdown.cost_savings.abs() <= 10.0);
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let evaluator = RewardEvaluator::default();
        let profile: Vec<f64> = (0..24).map(|h| -20.0 + h as f64 * 0.3).collect();
        let actions: Vec<f64> = (0..24)
            .map(|h| if h % 2 == 0 { 0.12 } else { -0.07 } + h as f64 * 0.001)
            .collect();
        let batch = single_batch(profile, SCENARIO_PRICES.to_vec());
        let actions = Array2::from_shape_vec((1, 24), actions).unwrap();

        let (_, grad) = evaluator
            .evaluate_batch_with_gradient(&batch, actions.view())
            .unwrap();

        let h = 1e-6;
        for t in 0..24 {
            let mut plus = actions.clone();
            plus[[0, t]] += h;
            let mut minus = actions.clone();
            minus[[0, t]] -= h;
            let f_plus = evaluator.evaluate_batch(&batch, plus.view()).unwrap()[0].total;
            let f_minus = evaluator.evaluate_batch(&batch, minus.view()).unwrap()[0].total;
            let numeric = (f_plus - f_minus) / (2.0 * h);
            assert!(
                (numeric - grad[[0, t]]).abs() < 1e-5,
                "hour {t}: analytic {} vs numeric {}",
                grad[[0, t]],
                numeric
            );
        }
    }

    #[test]
    fn test_saturated_total_has_zero_gradient() {
        let evaluator = RewardEvaluator::new(RewardConfig {
            reward_clamp: 0.01,
            ..RewardConfig::default()
        });
        let batch = single_batch(vec![-20.0; 24], SCENARIO_PRICES.to_vec());
        let actions = Array2::from_elem((1, 24), 0.3);
        let (totals, grad) = evaluator
            .evaluate_batch_with_gradient(&batch, actions.view())
            .unwrap();
        assert_eq!(totals[0].abs(), 0.01);
        assert!(grad.iter().all(|g| *g == 0.0));
    }
}
