//! Held-out evaluation of a policy, without parameter updates

use ndarray::{s, ArrayView2};
use pumpsched_core::{mean_price, Batch, Dataset, Result, SchedError};
use serde::Serialize;
use tracing::info;

use crate::policy::Policy;
use crate::reward::RewardEvaluator;
use crate::violation::BalanceTracker;

/// Per-day savings percentages are clamped to this magnitude before averaging
pub const SAVINGS_PERCENT_CLAMP: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub days: usize,
    pub mean_savings_pct: f64,
    pub mean_abs_adjustment_pct: f64,
    pub mean_violation: f64,
    pub expensive_hour_adjustment_pct: f64,
    pub cheap_hour_adjustment_pct: f64,
    pub hourly_change_pct: f64,
    pub mean_reward: f64,
}

impl EvaluationReport {
    /// Log the report at info level
    pub fn log(&self) {
        info!("Evaluation over {} days", self.days);
        info!("  Mean savings: {:.2}%", self.mean_savings_pct);
        info!("  Mean absolute adjustment: {:.2}%", self.mean_abs_adjustment_pct);
        info!("  Mean balance violation: {:.4}", self.mean_violation);
        info!("  Adjustment in expensive hours: {:.2}%", self.expensive_hour_adjustment_pct);
        info!("  Adjustment in cheap hours: {:.2}%", self.cheap_hour_adjustment_pct);
        info!("  Hour-to-hour change: {:.2}%", self.hourly_change_pct);
        info!("  Mean reward: {:.4}", self.mean_reward);
    }
}

/// Scores a policy's actions on held-out days
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    reward: RewardEvaluator,
    tracker: BalanceTracker,
}

impl Evaluator {
    pub fn new(reward: RewardEvaluator, tracker: BalanceTracker) -> Self {
        Self { reward, tracker }
    }

    /// Run `policy` on every day of `dataset` and score the result
    pub fn evaluate<P: Policy + ?Sized>(
        &self,
        policy: &P,
        dataset: &Dataset,
    ) -> Result<EvaluationReport> {
        if dataset.is_empty() {
            return Err(SchedError::EmptyDataset("no evaluation days".into()));
        }
        let batch = dataset.as_batch();
        let actions = policy.act(batch.profiles(), batch.prices())?;
        self.score(&batch, actions.view())
    }

    /// Score precomputed actions
    pub fn score(&self, batch: &Batch, actions: ArrayView2<'_, f64>) -> Result<EvaluationReport> {
        let violations = self.tracker.score_batch(batch, actions)?;
        let rewards = self.reward.evaluate_batch(batch, actions)?;
        let days = batch.len();
        if days == 0 {
            return Err(SchedError::EmptyDataset("no evaluation days".into()));
        }

        let epsilon = self.reward.config().epsilon;
        let mut savings_sum = 0.0;
        let mut cheap = MeanAccumulator::default();
        let mut expensive = MeanAccumulator::default();
        let (day_profiles, day_prices) = (batch.profiles(), batch.prices());
        for i in 0..days {
            let profile = day_profiles.row(i);
            let prices = day_prices.row(i);
            let row = actions.row(i);

            let mut baseline = 0.0;
            let mut cost = 0.0;
            for ((p, price), a) in profile.iter().zip(prices.iter()).zip(row.iter()) {
                baseline += p * price;
                cost += p * (1.0 + a) * price;
            }
            let pct = (baseline - cost) / (baseline + epsilon) * 100.0;
            savings_sum += pct.clamp(-SAVINGS_PERCENT_CLAMP, SAVINGS_PERCENT_CLAMP);

            let mean = mean_price(prices);
            for (price, a) in prices.iter().zip(row.iter()) {
                if *price < mean {
                    cheap.push(a.abs());
                } else {
                    expensive.push(a.abs());
                }
            }
        }

        let mean_savings = savings_sum / days as f64;
        let changes = &actions.slice(s![.., 1..]) - &actions.slice(s![.., ..-1]);

        Ok(EvaluationReport {
            days,
            mean_savings_pct: if mean_savings.is_nan() { 0.0 } else { mean_savings },
            mean_abs_adjustment_pct: actions.mapv(f64::abs).mean().unwrap_or(0.0) * 100.0,
            mean_violation: violations.mean().unwrap_or(0.0),
            expensive_hour_adjustment_pct: expensive.mean() * 100.0,
            cheap_hour_adjustment_pct: cheap.mean() * 100.0,
            hourly_change_pct: changes.mapv(f64::abs).mean().unwrap_or(0.0) * 100.0,
            mean_reward: rewards.iter().map(|r| r.total).sum::<f64>() / days as f64,
        })
    }
}

#[derive(Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ZeroPolicy;
    use ndarray::Array2;
    use pumpsched_core::HOURS;

    const SCENARIO_PRICES: [f64; 24] = [
        10.0, 8.0, 5.0, 5.0, 5.0, 8.0, 15.0, 30.0, 90.0, 95.0, 85.0, 60.0, 40.0, 35.0, 30.0, 30.0,
        35.0, 50.0, 80.0, 85.0, 80.0, 75.0, 70.0, 20.0,
    ];

    fn scenario_dataset(days: usize) -> Dataset {
        Dataset::new(
            Array2::from_elem((days, HOURS), -20.0),
            Array2::from_shape_fn((days, HOURS), |(_, h)| SCENARIO_PRICES[h]),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_policy_report() {
        let report = Evaluator::default()
            .evaluate(&ZeroPolicy, &scenario_dataset(3))
            .unwrap();
        assert_eq!(report.days, 3);
        assert_eq!(report.mean_savings_pct, 0.0);
        assert_eq!(report.mean_abs_adjustment_pct, 0.0);
        assert_eq!(report.mean_violation, 0.0);
        assert_eq!(report.hourly_change_pct, 0.0);
        assert_eq!(report.mean_reward, 0.0);
    }

    #[test]
    fn test_adjustment_split_by_price_level() {
        let dataset = scenario_dataset(1);
        let batch = dataset.as_batch();
        let mean = SCENARIO_PRICES.iter().sum::<f64>() / 24.0;
        // -0.2 in expensive hours, +0.1 in cheap ones
        let actions = Array2::from_shape_fn((1, HOURS), |(_, h)| {
            if SCENARIO_PRICES[h] < mean {
                0.1
            } else {
                -0.2
            }
        });
        let report = Evaluator::default().score(&batch, actions.view()).unwrap();
        assert!((report.expensive_hour_adjustment_pct - 20.0).abs() < 1e-9);
        assert!((report.cheap_hour_adjustment_pct - 10.0).abs() < 1e-9);
        assert!(report.mean_abs_adjustment_pct > 10.0 && report.mean_abs_adjustment_pct < 20.0);
        assert!(report.hourly_change_pct > 0.0);
    }

    #[test]
    fn test_savings_are_clamped() {
        // Baseline cancels epsilon exactly, so the raw ratio is infinite
        let mut profiles = Array2::zeros((1, HOURS));
        profiles[[0, 0]] = -1e-6;
        let dataset = Dataset::new(profiles, Array2::from_elem((1, HOURS), 1.0)).unwrap();
        let actions = Array2::from_elem((1, HOURS), -1.0);
        let report = Evaluator::default()
            .score(&dataset.as_batch(), actions.view())
            .unwrap();
        assert_eq!(report.mean_savings_pct, -SAVINGS_PERCENT_CLAMP);
        assert!(report.mean_reward.is_finite());
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let empty = scenario_dataset(0);
        assert!(Evaluator::default().evaluate(&ZeroPolicy, &empty).is_err());
    }
}
