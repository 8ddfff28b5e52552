//! Shared numeric helpers for subgradient bookkeeping

use ndarray::ArrayView2;
use pumpsched_core::{Batch, Result, SchedError, HOURS};

/// Actions must be one 24-hour row per batch item
pub(crate) fn check_action_shape(batch: &Batch, actions: ArrayView2<'_, f64>) -> Result<()> {
    if actions.ncols() != HOURS {
        return Err(SchedError::shape("action row", HOURS, actions.ncols()));
    }
    if actions.nrows() != batch.len() {
        return Err(SchedError::shape("action batch", batch.len(), actions.nrows()));
    }
    Ok(())
}

/// Sign with `sign(0) == 0`, matching the subgradient used for `|x|`
#[inline]
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Whether a clamp to `[lo, hi]` lets the gradient of `x` through
#[inline]
pub(crate) fn clamp_passes(x: f64, lo: f64, hi: f64) -> bool {
    x >= lo && x <= hi
}
