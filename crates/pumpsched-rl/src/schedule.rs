//! Single-day schedule optimization report

use std::path::Path;

use ndarray::{Array2, Axis};
use pumpsched_core::data::write_records;
use pumpsched_core::{ActionVector, DayProfile, PriceSeries, Result, HOURS};
use serde::Serialize;
use tracing::info;

use crate::policy::Policy;
use crate::violation::BalanceTracker;

/// One CSV row of an optimized schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourPlan {
    pub hour: usize,
    pub original_flow: f64,
    pub optimized_flow: f64,
    pub price: f64,
    pub adjustment_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleReport {
    pub hours: Vec<HourPlan>,
    pub cost_savings_pct: f64,
    pub mean_abs_adjustment_pct: f64,
    pub max_increase_pct: f64,
    pub max_decrease_pct: f64,
    /// Change of total flow relative to the original day
    pub balance_error_pct: f64,
    pub violation: f64,
}

impl ScheduleReport {
    pub fn log(&self) {
        info!("Optimization results:");
        info!("  Cost savings: {:.2}%", self.cost_savings_pct);
        info!("  Average absolute adjustment: {:.2}%", self.mean_abs_adjustment_pct);
        info!("  Maximum increase: {:.2}%", self.max_increase_pct);
        info!("  Maximum decrease: {:.2}%", self.max_decrease_pct);
        info!("  Energy balance error: {:.2}%", self.balance_error_pct);
        info!("  Balance violation: {:.4}", self.violation);
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_records(path, &self.hours)?;
        info!("Results saved to: {}", path.display());
        Ok(())
    }
}

/// `delta / base * 100`, or 0 when `base` is zero
fn percent_of(delta: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        delta / base * 100.0
    }
}

/// Apply `policy` to one day and summarize the adjusted schedule
pub fn optimize_day<P: Policy + ?Sized>(
    policy: &P,
    profile: &DayProfile,
    prices: &PriceSeries,
    tracker: &BalanceTracker,
) -> Result<ScheduleReport> {
    let profile_row = profile.view().insert_axis(Axis(0));
    let price_row = prices.view().insert_axis(Axis(0));
    let actions: Array2<f64> = policy.act(profile_row, price_row)?;
    let actions = ActionVector::new(actions.row(0).to_vec())?;

    let mut hours = Vec::with_capacity(HOURS);
    let mut original_cost = 0.0;
    let mut optimized_cost = 0.0;
    // Same summation order for both totals
    let mut original_total = 0.0;
    let mut optimized_total = 0.0;
    for (hour, ((&flow, &price), &action)) in profile
        .view()
        .iter()
        .zip(prices.view().iter())
        .zip(actions.view().iter())
        .enumerate()
    {
        let optimized_flow = flow * (1.0 + action);
        original_cost += flow * price;
        optimized_cost += optimized_flow * price;
        original_total += flow;
        optimized_total += optimized_flow;
        hours.push(HourPlan {
            hour,
            original_flow: flow,
            optimized_flow,
            price,
            adjustment_pct: action * 100.0,
        });
    }

    let action_view = actions.view();
    let max_action = action_view.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_action = action_view.iter().copied().fold(f64::INFINITY, f64::min);

    Ok(ScheduleReport {
        cost_savings_pct: percent_of(original_cost - optimized_cost, original_cost),
        mean_abs_adjustment_pct: action_view.mapv(f64::abs).mean().unwrap_or(0.0) * 100.0,
        max_increase_pct: max_action * 100.0,
        max_decrease_pct: min_action * 100.0,
        balance_error_pct: percent_of(optimized_total - original_total, original_total),
        violation: tracker.score_day(profile, prices, &actions),
        hours,
    })
}
