//! Training loop
//!
//! Epochs draw a fresh batch order from a seeded RNG; every batch runs
//! forward, loss, backward, global-norm clipping and one Adam step. The
//! learning rate follows a step schedule and the balance weight grows
//! linearly with the epoch up to a cap.

use ndarray::ArrayD;
use pumpsched_core::{Batch, Dataset, Result, SchedError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::loss::{LossBreakdown, LossConfig, LossFunction};
use crate::optimizer::{clip_grad_norm, Adam, AdamConfig, StepLr};
use crate::policy::TrainablePolicy;
use crate::reward::RewardEvaluator;
use crate::violation::BalanceTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub reward_weight: f64,
    pub smoothness_weight: f64,
    pub balance_weight_start: f64,
    pub balance_weight_step: f64,
    pub balance_weight_max: f64,
    pub max_grad_norm: f64,
    /// Epochs between learning-rate decays
    pub lr_step_epochs: usize,
    pub lr_gamma: f64,
    /// Seed of the per-epoch shuffle
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            reward_weight: 2.0,
            smoothness_weight: 500.0,
            balance_weight_start: 500.0,
            balance_weight_step: 50.0,
            balance_weight_max: 5000.0,
            max_grad_norm: 1.0,
            lr_step_epochs: 20,
            lr_gamma: 0.9,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SchedError::Config("training.batch_size must be positive".into()));
        }
        if self.lr_step_epochs == 0 {
            return Err(SchedError::Config("training.lr_step_epochs must be positive".into()));
        }
        let positive = [
            ("learning_rate", self.learning_rate),
            ("max_grad_norm", self.max_grad_norm),
            ("lr_gamma", self.lr_gamma),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SchedError::Config(format!(
                    "training.{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// `min(max, start + epoch * step)`
    pub fn balance_weight(&self, epoch: usize) -> f64 {
        (self.balance_weight_start + epoch as f64 * self.balance_weight_step)
            .min(self.balance_weight_max)
    }

    pub fn loss_config(&self) -> LossConfig {
        LossConfig {
            reward_weight: self.reward_weight,
            smoothness_weight: self.smoothness_weight,
        }
    }

    pub fn adam_config(&self) -> AdamConfig {
        AdamConfig {
            learning_rate: self.learning_rate,
            ..AdamConfig::default()
        }
    }

    pub fn schedule(&self) -> StepLr {
        StepLr::new(self.learning_rate, self.lr_step_epochs, self.lr_gamma)
    }
}

/// Means over the batches of one epoch that produced an update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub learning_rate: f64,
    pub balance_weight: f64,
    pub batches: usize,
    pub skipped_batches: usize,
    pub loss: f64,
    pub reward: f64,
    pub violation: f64,
    pub smoothness: f64,
    /// Global gradient norm before clipping
    pub grad_norm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    pub optimizer_steps: u64,
}

impl TrainingReport {
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }

    pub fn skipped_batches(&self) -> usize {
        self.epochs.iter().map(|e| e.skipped_batches).sum()
    }
}

#[derive(Default)]
struct EpochTotals {
    batches: usize,
    skipped: usize,
    loss: f64,
    reward: f64,
    violation: f64,
    smoothness: f64,
    grad_norm: f64,
}

impl EpochTotals {
    fn record(&mut self, breakdown: &LossBreakdown, grad_norm: f64) {
        self.batches += 1;
        self.loss += breakdown.loss;
        self.reward += breakdown.mean_reward;
        self.violation += breakdown.mean_violation;
        self.smoothness += breakdown.smoothness;
        self.grad_norm += grad_norm;
    }

    fn finish(self, epoch: usize, learning_rate: f64, balance_weight: f64) -> EpochStats {
        let n = self.batches.max(1) as f64;
        EpochStats {
            epoch,
            learning_rate,
            balance_weight,
            batches: self.batches,
            skipped_batches: self.skipped,
            loss: self.loss / n,
            reward: self.reward / n,
            violation: self.violation / n,
            smoothness: self.smoothness / n,
            grad_norm: self.grad_norm / n,
        }
    }
}

enum BatchOutcome {
    Applied { breakdown: LossBreakdown, grad_norm: f64 },
    Skipped,
}

/// Fits a [`TrainablePolicy`] against the balance-aware loss
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
    loss: LossFunction,
}

impl Trainer {
    pub fn new(
        config: TrainingConfig,
        reward: RewardEvaluator,
        tracker: BalanceTracker,
    ) -> Result<Self> {
        config.validate()?;
        let loss = LossFunction::new(config.loss_config(), reward, tracker);
        Ok(Self { config, loss })
    }

    /// Train `policy` in place on every day of `dataset`
    pub fn train<P: TrainablePolicy>(
        &self,
        policy: &mut P,
        dataset: &Dataset,
    ) -> Result<TrainingReport> {
        self.train_from(policy, dataset, 0)
    }

    /// Continue training a policy that has already seen `start_epoch`
    /// epochs. The learning-rate decay and balance-weight ramp pick up at
    /// that epoch instead of restarting.
    pub fn train_from<P: TrainablePolicy>(
        &self,
        policy: &mut P,
        dataset: &Dataset,
        start_epoch: usize,
    ) -> Result<TrainingReport> {
        let mut report = TrainingReport::default();
        if self.config.epochs == 0 {
            info!("Zero epochs requested, parameters left untouched");
            return Ok(report);
        }
        if dataset.is_empty() {
            return Err(SchedError::EmptyDataset("no training days".into()));
        }

        let stats = dataset.stats();
        info!(
            "Profiles: min={:.3} max={:.3} mean={:.3} std={:.3}",
            stats.profiles.min, stats.profiles.max, stats.profiles.mean, stats.profiles.std
        );
        info!(
            "Prices: min={:.3} max={:.3} mean={:.3} std={:.3}",
            stats.prices.min, stats.prices.max, stats.prices.mean, stats.prices.std
        );

        let batch_size = self.config.batch_size.clamp(1, dataset.len());
        info!(
            "Training {} ({} parameters) on {} days: {} epochs, batch size {}",
            policy.name(),
            policy.parameter_count(),
            dataset.len(),
            self.config.epochs,
            batch_size
        );

        let schedule = self.config.schedule();
        let mut optimizer = Adam::new(self.config.adam_config());
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..dataset.len()).collect();

        let last_epoch = start_epoch + self.config.epochs;
        for epoch in start_epoch..last_epoch {
            let learning_rate = schedule.learning_rate(epoch);
            optimizer.set_learning_rate(learning_rate);
            let balance_weight = self.config.balance_weight(epoch);

            order.shuffle(&mut rng);
            let mut totals = EpochTotals::default();
            for (index, chunk) in order.chunks(batch_size).enumerate() {
                let batch = dataset.gather(chunk);
                match self.train_batch(policy, &mut optimizer, &batch, balance_weight)? {
                    BatchOutcome::Applied {
                        breakdown,
                        grad_norm,
                    } => {
                        debug!(
                            "Epoch {} batch {}: loss={:.4} reward={:.4} violation={:.4} \
                             grad_norm={:.4}",
                            epoch,
                            index,
                            breakdown.loss,
                            breakdown.mean_reward,
                            breakdown.mean_violation,
                            grad_norm
                        );
                        totals.record(&breakdown, grad_norm);
                    }
                    BatchOutcome::Skipped => {
                        warn!("Epoch {} batch {}: non-finite loss, batch skipped", epoch, index);
                        totals.skipped += 1;
                    }
                }
            }

            let stats = totals.finish(epoch, learning_rate, balance_weight);
            info!(
                "Epoch {}/{}: loss={:.4} reward={:.4} violation={:.4} smoothness={:.4} \
                 lr={:.6} balance_weight={:.1}",
                epoch + 1,
                last_epoch,
                stats.loss,
                stats.reward,
                stats.violation,
                stats.smoothness,
                stats.learning_rate,
                stats.balance_weight
            );
            report.epochs.push(stats);
        }

        report.optimizer_steps = optimizer.steps();
        if report.skipped_batches() > 0 {
            warn!("{} batches skipped during training", report.skipped_batches());
        }
        Ok(report)
    }

    fn train_batch<P: TrainablePolicy>(
        &self,
        policy: &mut P,
        optimizer: &mut Adam,
        batch: &Batch,
        balance_weight: f64,
    ) -> Result<BatchOutcome> {
        let (actions, cache) = policy.forward_with_cache(batch.profiles(), batch.prices())?;
        let (breakdown, action_grad) = self.loss.evaluate(batch, actions.view(), balance_weight)?;
        if !breakdown.is_finite() {
            return Ok(BatchOutcome::Skipped);
        }

        let mut grads: Vec<ArrayD<f64>> = policy.backward(&cache, action_grad.view())?;
        let grad_norm = clip_grad_norm(&mut grads, self.config.max_grad_norm);
        if !grad_norm.is_finite() {
            return Ok(BatchOutcome::Skipped);
        }

        optimizer.step(policy.parameters_mut(), &grads)?;
        Ok(BatchOutcome::Applied {
            breakdown,
            grad_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MlpPolicy, PolicyConfig};
    use ndarray::Array2;
    use pumpsched_core::HOURS;

    fn small_dataset(days: usize) -> Dataset {
        let profiles = Array2::from_shape_fn((days, HOURS), |(d, h)| {
            -20.0 + 3.0 * ((h as f64 + d as f64) * 0.5).sin()
        });
        let prices = Array2::from_shape_fn((days, HOURS), |(d, h)| {
            45.0 + 35.0 * ((h as f64 - 6.0 - d as f64 * 0.3) * 0.4).sin()
        });
        Dataset::new(profiles, prices).unwrap()
    }

    fn small_policy() -> MlpPolicy {
        MlpPolicy::new(PolicyConfig {
            hidden_size: 8,
            ..PolicyConfig::default()
        })
        .unwrap()
    }

    fn trainer(epochs: usize) -> Trainer {
        Trainer::new(
            TrainingConfig {
                epochs,
                batch_size: 4,
                ..TrainingConfig::default()
            },
            RewardEvaluator::default(),
            BalanceTracker::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_balance_weight_schedule() {
        let config = TrainingConfig::default();
        assert_eq!(config.balance_weight(0), 500.0);
        assert_eq!(config.balance_weight(10), 1000.0);
        assert_eq!(config.balance_weight(90), 5000.0);
        assert_eq!(config.balance_weight(500), 5000.0);
    }

    #[test]
    fn test_zero_epochs_leaves_parameters_untouched() {
        let mut policy = small_policy();
        let before = policy.clone();
        let report = trainer(0).train(&mut policy, &small_dataset(6)).unwrap();
        assert!(report.epochs.is_empty());
        assert_eq!(report.optimizer_steps, 0);
        assert_eq!(policy, before);
    }

    #[test]
    fn test_training_updates_parameters() {
        let mut policy = small_policy();
        let before = policy.clone();
        let report = trainer(2).train(&mut policy, &small_dataset(10)).unwrap();

        assert_eq!(report.epochs.len(), 2);
        // 10 days in batches of 4: 3 batches per epoch
        assert_eq!(report.optimizer_steps, 6);
        assert!(report.epochs.iter().all(|e| e.batches == 3 && e.skipped_batches == 0));
        assert_eq!(report.epochs[1].balance_weight, 550.0);
        assert!(report.epochs.iter().all(|e| e.loss.is_finite()));
        assert!(report.epochs.iter().all(|e| e.grad_norm.is_finite()));
        assert_ne!(policy, before);
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = small_dataset(9);
        let mut a = small_policy();
        let mut b = small_policy();
        let report_a = trainer(3).train(&mut a, &dataset).unwrap();
        let report_b = trainer(3).train(&mut b, &dataset).unwrap();
        assert_eq!(a, b);
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn test_batch_size_larger_than_dataset() {
        let mut policy = small_policy();
        let trainer = Trainer::new(
            TrainingConfig {
                epochs: 1,
                batch_size: 1000,
                ..TrainingConfig::default()
            },
            RewardEvaluator::default(),
            BalanceTracker::default(),
        )
        .unwrap();
        let report = trainer.train(&mut policy, &small_dataset(5)).unwrap();
        assert_eq!(report.epochs[0].batches, 1);
    }

    #[test]
    fn test_learning_rate_decays() {
        let mut policy = small_policy();
        let trainer = Trainer::new(
            TrainingConfig {
                epochs: 3,
                batch_size: 8,
                lr_step_epochs: 2,
                lr_gamma: 0.5,
                ..TrainingConfig::default()
            },
            RewardEvaluator::default(),
            BalanceTracker::default(),
        )
        .unwrap();
        let report = trainer.train(&mut policy, &small_dataset(4)).unwrap();
        let rates: Vec<f64> = report.epochs.iter().map(|e| e.learning_rate).collect();
        assert_eq!(rates, vec![0.001, 0.001, 0.0005]);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let mut policy = small_policy();
        let empty = Dataset::new(Array2::zeros((0, HOURS)), Array2::zeros((0, HOURS))).unwrap();
        let err = trainer(1).train(&mut policy, &empty).unwrap_err();
        assert!(matches!(err, SchedError::EmptyDataset(_)));

        // Zero epochs stays a no-op even without days
        let report = trainer(0).train(&mut policy, &empty).unwrap();
        assert!(report.epochs.is_empty());
    }

    #[test]
    fn test_resumed_training_continues_schedules() {
        let mut policy = small_policy();
        let trainer = Trainer::new(
            TrainingConfig {
                epochs: 2,
                batch_size: 8,
                lr_step_epochs: 2,
                lr_gamma: 0.5,
                ..TrainingConfig::default()
            },
            RewardEvaluator::default(),
            BalanceTracker::default(),
        )
        .unwrap();
        let report = trainer.train_from(&mut policy, &small_dataset(4), 2).unwrap();

        let epochs: Vec<usize> = report.epochs.iter().map(|e| e.epoch).collect();
        assert_eq!(epochs, vec![2, 3]);
        assert!(report.epochs.iter().all(|e| e.learning_rate == 0.0005));
        assert_eq!(report.epochs[0].balance_weight, 600.0);
        assert_eq!(report.epochs[1].balance_weight, 650.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Trainer::new(
            TrainingConfig {
                batch_size: 0,
                ..TrainingConfig::default()
            },
            RewardEvaluator::default(),
            BalanceTracker::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_batches_are_skipped() {
        let profiles = Array2::from_elem((3, HOURS), 1e300);
        let prices = Array2::from_shape_fn((3, HOURS), |(_, h)| 1e300 * (1.0 + h as f64));
        let dataset = Dataset::new(profiles, prices).unwrap();
        let mut policy = small_policy();
        let before = policy.clone();

        let report = trainer(1).train(&mut policy, &dataset).unwrap();
        assert_eq!(report.skipped_batches(), 1);
        assert_eq!(report.optimizer_steps, 0);
        assert_eq!(policy, before);
    }
}
