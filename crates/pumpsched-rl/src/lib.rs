//! pumpsched RL - balance violation accounting, reward shaping and training
//!
//! This crate scores hourly schedule adjustments against the 24-hour energy
//! balance and electricity prices, and trains policies that propose those
//! adjustments:
//! - [`violation`]: cheap-hour borrowing vs expensive-hour compensation
//! - [`reward`]: price-sensitive, clamped multi-term reward
//! - [`policy`], [`optimizer`], [`trainer`]: differentiable MLP and its fit
//! - [`evaluation`], [`schedule`]: held-out scoring and single-day reports

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod checkpoint;
pub mod evaluation;
pub mod loss;
mod numeric;
pub mod optimizer;
pub mod policy;
pub mod reward;
pub mod schedule;
pub mod trainer;
pub mod violation;

pub use checkpoint::Checkpoint;
pub use evaluation::{EvaluationReport, Evaluator};
pub use loss::{LossBreakdown, LossConfig, LossFunction};
pub use optimizer::{Adam, AdamConfig, StepLr};
pub use policy::{MlpPolicy, Policy, PolicyConfig, TrainablePolicy, ZeroPolicy};
pub use reward::{RewardBreakdown, RewardConfig, RewardEvaluator};
pub use schedule::{optimize_day, HourPlan, ScheduleReport};
pub use trainer::{EpochStats, Trainer, TrainingConfig, TrainingReport};
pub use violation::{BalanceTracker, BorrowEvent, ViolationConfig, ViolationTrace};
