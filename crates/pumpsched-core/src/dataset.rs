//! Aligned profile/price matrices and batches drawn from them

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

use crate::error::{Result, SchedError};
use crate::types::HOURS;

fn validate_pair(profiles: &Array2<f64>, prices: &Array2<f64>) -> Result<()> {
    if profiles.ncols() != HOURS {
        return Err(SchedError::shape("profile row", HOURS, profiles.ncols()));
    }
    if prices.ncols() != HOURS {
        return Err(SchedError::shape("price row", HOURS, prices.ncols()));
    }
    if profiles.nrows() != prices.nrows() {
        return Err(SchedError::BatchMismatch {
            profiles: profiles.nrows(),
            prices: prices.nrows(),
        });
    }
    for (what, matrix) in [("profiles", profiles), ("prices", prices)] {
        for ((day, hour), value) in matrix.indexed_iter() {
            if !value.is_finite() {
                return Err(SchedError::NonFinite {
                    what: what.to_string(),
                    day,
                    hour,
                });
            }
        }
    }
    Ok(())
}

/// A set of (profile, price) days processed together.
///
/// Both matrices are `[n, 24]` with identical row counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    profiles: Array2<f64>,
    prices: Array2<f64>,
}

impl Batch {
    pub fn new(profiles: Array2<f64>, prices: Array2<f64>) -> Result<Self> {
        validate_pair(&profiles, &prices)?;
        Ok(Self { profiles, prices })
    }

    pub fn len(&self) -> usize {
        self.profiles.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn profiles(&self) -> ArrayView2<'_, f64> {
        self.profiles.view()
    }

    pub fn prices(&self) -> ArrayView2<'_, f64> {
        self.prices.view()
    }

    /// Profile and price rows of one item
    pub fn day(&self, index: usize) -> Option<(ArrayView1<'_, f64>, ArrayView1<'_, f64>)> {
        (index < self.len()).then(|| (self.profiles.row(index), self.prices.row(index)))
    }
}

/// Summary statistics of one input matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl SeriesStats {
    fn of(matrix: &Array2<f64>) -> Self {
        let n = matrix.len();
        if n == 0 {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std: 0.0,
            };
        }
        let min = matrix.iter().copied().fold(f64::INFINITY, f64::min);
        let max = matrix.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = matrix.sum() / n as f64;
        // Sample standard deviation
        let std = if n > 1 {
            let ss: f64 = matrix.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            min,
            max,
            mean,
            std,
        }
    }
}

/// Input statistics logged before training
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputStats {
    pub profiles: SeriesStats,
    pub prices: SeriesStats,
}

/// All loaded days, validated once on construction
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    profiles: Array2<f64>,
    prices: Array2<f64>,
}

impl Dataset {
    /// Build a dataset from `[num_days, 24]` matrices.
    ///
    /// Fails before any computation when a row is not 24 hours long, the
    /// day counts differ, or a value is not finite.
    pub fn new(profiles: Array2<f64>, prices: Array2<f64>) -> Result<Self> {
        validate_pair(&profiles, &prices)?;
        Ok(Self { profiles, prices })
    }

    pub fn len(&self) -> usize {
        self.profiles.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn profiles(&self) -> ArrayView2<'_, f64> {
        self.profiles.view()
    }

    pub fn prices(&self) -> ArrayView2<'_, f64> {
        self.prices.view()
    }

    pub fn day(&self, index: usize) -> Option<(ArrayView1<'_, f64>, ArrayView1<'_, f64>)> {
        (index < self.len()).then(|| (self.profiles.row(index), self.prices.row(index)))
    }

    /// Dataset with every profile value sign-inverted
    pub fn with_flipped_profiles(mut self) -> Self {
        self.profiles.mapv_inplace(|v| -v);
        self
    }

    /// Split into (train, held-out), keeping day order.
    ///
    /// The first `floor(len * train_fraction)` days train; the fraction is
    /// clamped to `[0, 1]`.
    pub fn split(&self, train_fraction: f64) -> (Dataset, Dataset) {
        let fraction = if train_fraction.is_finite() {
            train_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let train_size = ((self.len() as f64 * fraction).floor() as usize).min(self.len());
        let train = Dataset {
            profiles: self.profiles.slice(ndarray::s![..train_size, ..]).to_owned(),
            prices: self.prices.slice(ndarray::s![..train_size, ..]).to_owned(),
        };
        let held_out = Dataset {
            profiles: self.profiles.slice(ndarray::s![train_size.., ..]).to_owned(),
            prices: self.prices.slice(ndarray::s![train_size.., ..]).to_owned(),
        };
        (train, held_out)
    }

    /// Batch made of the given day indices, in order.
    ///
    /// # Panics
    /// Panics if an index is out of bounds.
    pub fn gather(&self, indices: &[usize]) -> Batch {
        Batch {
            profiles: self.profiles.select(Axis(0), indices),
            prices: self.prices.select(Axis(0), indices),
        }
    }

    /// Every day as one batch
    pub fn as_batch(&self) -> Batch {
        Batch {
            profiles: self.profiles.clone(),
            prices: self.prices.clone(),
        }
    }

    pub fn stats(&self) -> InputStats {
        InputStats {
            profiles: SeriesStats::of(&self.profiles),
            prices: SeriesStats::of(&self.prices),
        }
    }
}
