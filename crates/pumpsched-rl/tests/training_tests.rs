//! Integration tests for training, evaluation and checkpointing
//!
//! These tests run the full pipeline on small synthetic datasets.

#![allow(clippy::float_cmp)]

use pumpsched_core::synthetic::{
    generate_dataset, ProfilePattern, SyntheticConfig, BASE_FLOW_PROFILE,
};
use pumpsched_core::{Dataset, DayProfile, PriceSeries};
use pumpsched_rl::{
    optimize_day, BalanceTracker, Checkpoint, Evaluator, MlpPolicy, Policy, PolicyConfig,
    RewardEvaluator, Trainer, TrainingConfig, ZeroPolicy,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn synthetic(days: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let pattern = ProfilePattern::from_profile(&BASE_FLOW_PROFILE);
    generate_dataset(days, &pattern, &SyntheticConfig::default(), &mut rng).unwrap()
}

fn small_policy() -> MlpPolicy {
    MlpPolicy::new(PolicyConfig {
        hidden_size: 16,
        ..PolicyConfig::default()
    })
    .unwrap()
}

fn trainer(epochs: usize) -> Trainer {
    Trainer::new(
        TrainingConfig {
            epochs,
            batch_size: 8,
            ..TrainingConfig::default()
        },
        RewardEvaluator::default(),
        BalanceTracker::default(),
    )
    .unwrap()
}

/// Zero epochs is a no-op and evaluation matches scoring the policy directly
#[test]
fn test_zero_epochs_then_evaluate() {
    let dataset = synthetic(20, 1);
    let (train, held_out) = dataset.split(0.8);
    assert_eq!(train.len(), 16);
    assert_eq!(held_out.len(), 4);

    let mut policy = small_policy();
    let untouched = policy.clone();
    let report = trainer(0).train(&mut policy, &train).unwrap();
    assert!(report.epochs.is_empty());
    assert_eq!(policy, untouched);

    let evaluator = Evaluator::default();
    let via_evaluate = evaluator.evaluate(&policy, &held_out).unwrap();

    let batch = held_out.as_batch();
    let actions = untouched.act(batch.profiles(), batch.prices()).unwrap();
    let direct = evaluator.score(&batch, actions.view()).unwrap();
    assert_eq!(via_evaluate, direct);
}

/// Train, checkpoint, reload and optimize a day with the reloaded policy
#[test]
fn test_train_checkpoint_optimize() {
    let dataset = synthetic(24, 2);
    let (train, held_out) = dataset.split(0.75);

    let mut policy = small_policy();
    let report = trainer(3).train(&mut policy, &train).unwrap();
    assert_eq!(report.epochs.len(), 3);
    assert_eq!(report.skipped_batches(), 0);
    // 18 training days in batches of 8
    assert_eq!(report.optimizer_steps, 9);

    let evaluation = Evaluator::default().evaluate(&policy, &held_out).unwrap();
    assert_eq!(evaluation.days, 6);
    assert!(evaluation.mean_violation >= 0.0);
    assert!(evaluation.mean_abs_adjustment_pct <= 50.0);
    assert!(evaluation.mean_reward.abs() <= 100.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    Checkpoint::from_policy(&policy, report.epochs.len()).save(&path).unwrap();
    let restored = Checkpoint::load_if_present(&path)
        .unwrap()
        .expect("checkpoint was just written")
        .into_policy()
        .unwrap();

    let (profile, prices) = held_out.day(0).unwrap();
    let profile = DayProfile::new(profile.to_vec()).unwrap();
    let prices = PriceSeries::new(prices.to_vec()).unwrap();
    let plan = optimize_day(&restored, &profile, &prices, &BalanceTracker::default()).unwrap();
    assert_eq!(plan.hours.len(), 24);
    assert!(plan.max_increase_pct <= 50.0 + 1e-9);
    assert!(plan.max_decrease_pct >= -50.0 - 1e-9);
}

/// The zero policy is the reference point: no savings, no violations
#[test]
fn test_zero_policy_baseline() {
    let report = Evaluator::default()
        .evaluate(&ZeroPolicy, &synthetic(10, 3))
        .unwrap();
    assert_eq!(report.mean_savings_pct, 0.0);
    assert_eq!(report.mean_violation, 0.0);
    assert_eq!(report.mean_reward, 0.0);
}
