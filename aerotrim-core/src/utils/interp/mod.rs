//! Interpolation utility module
//!
//! Provides 1-D interpolation over monotonically increasing, non-repeating grids,
//! used to turn sampled aerodynamic polars into continuous functions of alpha.
//!
//! Control of what happens when the provided interpolant point is outside
//! of the input grid bounds is decided by the `Extrapolate` enum.
//!

pub mod one;

pub use one::*;

use crate::imports::*;

// This method contains code from RouteE Compass, another NREL-developed tool
// https://www.nrel.gov/transportation/route-energy-prediction-model.html
// https://github.com/NREL/routee-compass/
fn find_nearest_index(arr: &[f64], target: f64) -> usize {
    if Some(&target) == arr.last() {
        return arr.len() - 2;
    }

    let mut low = 0;
    let mut high = arr.len() - 1;

    while low < high {
        let mid = low + (high - low) / 2;

        if arr[mid] >= target {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    if low > 0 && arr[low] >= target {
        low - 1
    } else {
        low
    }
}

/// Interpolation strategy.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Linear interpolation: https://en.wikipedia.org/wiki/Linear_interpolation
    Linear,
    /// Cubic spline with not-a-knot end conditions: https://en.wikipedia.org/wiki/Spline_interpolation
    /// Requires at least 4 grid points. With exactly 4 points the spline is the
    /// interpolating cubic polynomial.
    Cubic,
}

/// Extrapolation strategy.
///
/// Controls what happens if supplied interpolant point
/// is outside the bounds of the interpolation grid.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Extrapolate {
    /// Return the given fill value (typically `f64::NAN`) outside the grid.
    Fill(f64),
    /// Restrict interpolant point to the limits of the interpolation grid, using [`f64::clamp`].
    Clamp,
    /// Return an error when interpolant point is beyond the limits of the interpolation grid.
    Error,
}

pub trait InterpMethods {
    fn validate(&self) -> anyhow::Result<()>;
    fn interpolate(&self, point: f64) -> anyhow::Result<f64>;
}
