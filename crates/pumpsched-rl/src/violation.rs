//! Energy-balance violation tracking
//!
//! Increasing consumption in a cheap hour borrows energy that has to be paid
//! back by reduced consumption in the expensive hours that follow. For each
//! borrowing event the tracker scans a bounded lookahead window, collects up
//! to a fixed number of compensation slots and penalizes whatever part of the
//! debt is left unresolved.
//!
//! The scan is order-sensitive (window truncation at the end of the day and
//! "first N qualifying hours"), so it runs as a plain per-hour loop. The same
//! loop carries the sensitivity of every intermediate quantity to the actions,
//! which gives the exact subgradient used for training.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use pumpsched_core::{mean_price, ActionVector, Batch, DayProfile, PriceSeries, Result};
use serde::{Deserialize, Serialize};

use crate::numeric::{check_action_shape, sign};

/// Tunables of the compensation scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationConfig {
    /// End of the lookahead window as an exclusive offset from the borrowing
    /// hour: hours `t+1 .. t+lookahead_hours` are scanned
    pub lookahead_hours: usize,
    /// Expensive hours needed to settle one borrowing event
    pub compensation_slots: usize,
    /// Share of an hour's flow that can be used as compensation
    pub max_compensation_rate: f64,
    /// Compensation below this share of the debt counts as unresolved
    pub sufficiency_ratio: f64,
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self {
            lookahead_hours: 8,
            compensation_slots: 4,
            max_compensation_rate: 0.1,
            sufficiency_ratio: 0.95,
        }
    }
}

/// One cheap-hour borrowing event and how it was settled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorrowEvent {
    pub hour: usize,
    pub debt: f64,
    pub compensation: f64,
    pub slots: usize,
    /// Amount added to the violation score, 0 when settled
    pub violation: f64,
}

impl BorrowEvent {
    pub fn is_settled(&self) -> bool {
        self.violation == 0.0
    }
}

/// Violation score of one day together with its action gradient
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationTrace {
    pub score: f64,
    /// d score / d action, one entry per hour
    pub gradient: Array1<f64>,
    pub events: Vec<BorrowEvent>,
}

/// Scalar value with its sensitivity to each hour's action
struct Tracked {
    value: f64,
    grad: Array1<f64>,
}

impl Tracked {
    fn constant(value: f64, hours: usize) -> Self {
        Self {
            value,
            grad: Array1::zeros(hours),
        }
    }

    fn of_action(value: f64, hour: usize, slope: f64, hours: usize) -> Self {
        let mut grad = Array1::zeros(hours);
        grad[hour] = slope;
        Self { value, grad }
    }
}

/// Which limit bounded a compensation slot
#[derive(Clone, Copy)]
enum Cap {
    Remaining,
    Rate,
    Action,
}

/// Computes balance violations for days and batches
#[derive(Debug, Clone, Default)]
pub struct BalanceTracker {
    config: ViolationConfig,
}

impl BalanceTracker {
    pub fn new(config: ViolationConfig) -> Self {
        Self { config }
    }

    /// Violation score of one day
    pub fn score_day(
        &self,
        profile: &DayProfile,
        prices: &PriceSeries,
        actions: &ActionVector,
    ) -> f64 {
        self.scan(profile.view(), prices.view(), actions.view()).score
    }

    /// Full scan of one day: score, gradient and every borrowing event
    pub fn trace_day(
        &self,
        profile: &DayProfile,
        prices: &PriceSeries,
        actions: &ActionVector,
    ) -> ViolationTrace {
        self.scan(profile.view(), prices.view(), actions.view())
    }

    /// One score per batch item
    pub fn score_batch(&self, batch: &Batch, actions: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_action_shape(batch, actions)?;
        let (profiles, prices) = (batch.profiles(), batch.prices());
        Ok(Array1::from_iter((0..batch.len()).map(|i| {
            self.scan(profiles.row(i), prices.row(i), actions.row(i)).score
        })))
    }

    /// Scores and the `[n, 24]` gradient of each item's score
    pub fn score_batch_with_gradient(
        &self,
        batch: &Batch,
        actions: ArrayView2<'_, f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        check_action_shape(batch, actions)?;
        let mut scores = Array1::zeros(batch.len());
        let mut gradient = Array2::zeros(actions.raw_dim());
        let (profiles, prices) = (batch.profiles(), batch.prices());
        for i in 0..batch.len() {
            let trace = self.scan(profiles.row(i), prices.row(i), actions.row(i));
            scores[i] = trace.score;
            gradient.row_mut(i).assign(&trace.gradient);
        }
        Ok((scores, gradient))
    }

    fn scan(
        &self,
        profile: ArrayView1<'_, f64>,
        prices: ArrayView1<'_, f64>,
        actions: ArrayView1<'_, f64>,
    ) -> ViolationTrace {
        let hours = actions.len().min(profile.len()).min(prices.len());
        let mean = mean_price(prices);
        let cfg = &self.config;

        let mut score = 0.0;
        let mut gradient = Array1::zeros(actions.len());
        let mut events = Vec::new();

        for t in 0..hours {
            if !(prices[t] < mean && actions[t] > 0.0) {
                continue;
            }

            let debt = Tracked::of_action(
                actions[t] * profile[t].abs(),
                t,
                profile[t].abs(),
                actions.len(),
            );
            let mut compensation = Tracked::constant(0.0, actions.len());
            let mut slots = 0;

            let end = (t + cfg.lookahead_hours).min(hours);
            for f in (t + 1)..end {
                if slots >= cfg.compensation_slots {
                    break;
                }
                if prices[f] < mean {
                    continue;
                }

                let remaining = debt.value - compensation.value;
                let rate_cap = profile[f].abs() * cfg.max_compensation_rate;
                let action_cap = (profile[f] * actions[f]).abs();

                // First minimum wins on ties
                let mut cap = Cap::Remaining;
                let mut amount = remaining;
                if rate_cap < amount {
                    cap = Cap::Rate;
                    amount = rate_cap;
                }
                if action_cap < amount {
                    cap = Cap::Action;
                    amount = action_cap;
                }

                match cap {
                    // Compensation now equals the debt
                    Cap::Remaining => compensation.grad.assign(&debt.grad),
                    Cap::Rate => {}
                    Cap::Action => compensation.grad[f] += profile[f].abs() * sign(actions[f]),
                }
                compensation.value += amount;
                slots += 1;
            }

            let unresolved = debt.value - compensation.value;
            let insufficient = slots < cfg.compensation_slots
                || compensation.value < debt.value * cfg.sufficiency_ratio;
            let violation = if insufficient {
                gradient.scaled_add(sign(unresolved), &(&debt.grad - &compensation.grad));
                unresolved.abs()
            } else {
                0.0
            };
            score += violation;

            events.push(BorrowEvent {
                hour: t,
                debt: debt.value,
                compensation: compensation.value,
                slots,
                violation,
            });
        }

        ViolationTrace {
            score,
            gradient,
            events,
        }
    }
}
