//! Day-level series types: flow profiles, prices and policy actions

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedError};

/// Number of hourly slots in one scheduling day
pub const HOURS: usize = 24;

fn checked_series(what: &str, values: Vec<f64>) -> Result<Array1<f64>> {
    if values.len() != HOURS {
        return Err(SchedError::shape(what, HOURS, values.len()));
    }
    if let Some(hour) = values.iter().position(|v| !v.is_finite()) {
        return Err(SchedError::NonFinite {
            what: what.to_string(),
            day: 0,
            hour,
        });
    }
    Ok(Array1::from(values))
}

/// Arithmetic mean of a price row. Empty rows have mean 0.
pub fn mean_price(prices: ArrayView1<'_, f64>) -> f64 {
    if prices.is_empty() {
        0.0
    } else {
        prices.sum() / prices.len() as f64
    }
}

/// 24 hourly flow rates for one day.
///
/// Values may be negative: the reference deployment stores net consumption
/// with a flipped sign convention (see `Dataset::with_flipped_profiles`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayProfile(Array1<f64>);

impl DayProfile {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        checked_series("profile", values).map(Self)
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

/// 24 hourly prices aligned with a [`DayProfile`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries(Array1<f64>);

impl PriceSeries {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        checked_series("prices", values).map(Self)
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

/// 24 adjustment fractions produced by a policy for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionVector(Array1<f64>);

impl ActionVector {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        checked_series("actions", values).map(Self)
    }

    pub fn zeros() -> Self {
        Self(Array1::zeros(HOURS))
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}
