//! Synthetic training data
//!
//! Prices follow a two-peak day (night valley, morning peak, midday valley,
//! evening peak). Flow profiles are sampled around the hourly statistics of
//! a base profile with smoothed noise.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Result, SchedError};
use crate::types::HOURS;

/// Typical day-ahead price shape used as the synthetic base
pub const BASE_PRICE_SHAPE: [f64; HOURS] = [
    10.0, 8.0, 5.0, 5.0, 5.0, 8.0, 15.0, 30.0, // night valley
    90.0, 95.0, 85.0, 60.0, // morning peak
    40.0, 35.0, 30.0, 30.0, 35.0, // midday valley
    50.0, 80.0, 85.0, 80.0, 75.0, 70.0, 20.0, // evening peak
];

/// Pump station flow day used when no base profile is supplied
pub const BASE_FLOW_PROFILE: [f64; HOURS] = [
    -20.48, -20.50, -20.52, -20.48, -20.50, -20.48, -20.47, -20.50, -10.25, -15.42, -20.50, -20.53,
    -20.53, -20.53, -20.57, -20.60, -13.72, 0.00, 0.00, 0.00, 0.00, 0.00, 0.00, -6.80,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Relative per-hour price noise
    pub price_noise: f64,
    /// Day-level price scale is drawn from `[1 - spread, 1 + spread]`
    pub price_scale_spread: f64,
    /// Relative per-hour flow noise
    pub profile_noise: f64,
    /// Weight of the previous hour's noise, in `[0, 1)`
    pub smoothing: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            price_noise: 0.1,
            price_scale_spread: 0.2,
            profile_noise: 0.05,
            smoothing: 0.6,
        }
    }
}

impl SyntheticConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(SchedError::Config(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        if !(0.0..1.0).contains(&self.price_scale_spread) {
            return Err(SchedError::Config(format!(
                "price_scale_spread must be in [0, 1), got {}",
                self.price_scale_spread
            )));
        }
        Ok(())
    }
}

fn normal(std: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std).map_err(|e| SchedError::Config(format!("invalid noise level {std}: {e}")))
}

/// Hourly statistics of observed flow days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePattern {
    pub hourly_mean: Array1<f64>,
    pub hourly_std: Array1<f64>,
    pub min_value: f64,
    pub max_value: f64,
}

impl ProfilePattern {
    /// Analyze `[num_days, 24]` flow days
    pub fn from_days(days: ArrayView2<'_, f64>) -> Result<Self> {
        if days.ncols() != HOURS {
            return Err(SchedError::shape("profile row", HOURS, days.ncols()));
        }
        if days.nrows() == 0 {
            return Err(SchedError::EmptyDataset(
                "no base profile days to analyze".to_string(),
            ));
        }
        let hourly_mean = days
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(HOURS));
        let hourly_std = days.std_axis(Axis(0), 0.0);
        let min_value = days.iter().copied().fold(f64::INFINITY, f64::min);
        let max_value = days.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            hourly_mean,
            hourly_std,
            min_value,
            max_value,
        })
    }

    /// Pattern of a single base day
    pub fn from_profile(profile: &[f64; HOURS]) -> Self {
        let hourly_mean = Array1::from(profile.to_vec());
        let min_value = profile.iter().copied().fold(f64::INFINITY, f64::min);
        let max_value = profile.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            hourly_mean,
            hourly_std: Array1::zeros(HOURS),
            min_value,
            max_value,
        }
    }

    /// Bounds generated values are kept within: the observed range widened
    /// by half of each end's magnitude
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.min_value - 0.5 * self.min_value.abs(),
            self.max_value + 0.5 * self.max_value.abs(),
        )
    }
}

/// Generate `days` rows of synthetic prices, all non-negative
pub fn generate_prices<R: Rng + ?Sized>(
    days: usize,
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<Array2<f64>> {
    config.validate()?;
    let noise = normal(config.price_noise)?;
    let mut prices = Array2::zeros((days, HOURS));
    for mut row in prices.rows_mut() {
        let scale = if config.price_scale_spread > 0.0 {
            rng.gen_range(1.0 - config.price_scale_spread..1.0 + config.price_scale_spread)
        } else {
            1.0
        };
        for (hour, price) in row.iter_mut().enumerate() {
            let factor = 1.0 + noise.sample(rng);
            *price = (BASE_PRICE_SHAPE[hour] * scale * factor).max(0.0);
        }
    }
    Ok(prices)
}

/// Generate one flow day following `pattern`
pub fn generate_profile<R: Rng + ?Sized>(
    pattern: &ProfilePattern,
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<Array1<f64>> {
    config.validate()?;
    let unit = normal(1.0)?;
    let (low, high) = pattern.bounds();
    let scale = pattern
        .hourly_mean
        .iter()
        .map(|m| m.abs())
        .fold(0.0, f64::max);

    let mut carried = 0.0;
    let mut profile = Array1::zeros(HOURS);
    for hour in 0..HOURS {
        let spread = pattern.hourly_std[hour] + config.profile_noise * scale;
        let fresh = unit.sample(rng) * spread;
        carried = config.smoothing * carried + (1.0 - config.smoothing) * fresh;
        profile[hour] = (pattern.hourly_mean[hour] + carried).clamp(low, high);
    }
    Ok(profile)
}

/// Generate a full synthetic dataset of `days` paired days
pub fn generate_dataset<R: Rng + ?Sized>(
    days: usize,
    pattern: &ProfilePattern,
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<Dataset> {
    let prices = generate_prices(days, config, rng)?;
    let mut profiles = Array2::zeros((days, HOURS));
    for mut row in profiles.rows_mut() {
        row.assign(&generate_profile(pattern, config, rng)?);
    }
    Dataset::new(profiles, prices)
}
