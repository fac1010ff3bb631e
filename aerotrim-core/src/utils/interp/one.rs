//! 1-dimensional interpolation

use super::*;
use nalgebra::{DMatrix, DVector};

#[derive(Clone, Debug, PartialEq)]
pub struct Interp1D {
    pub x: Vec<f64>,
    pub f_x: Vec<f64>,
    pub strategy: Strategy,
    pub extrapolate: Extrapolate,
    /// second derivatives at the knots, only populated for [`Strategy::Cubic`]
    second_derivs: Vec<f64>,
}

impl Interp1D {
    /// Create and validate 1-D interpolator
    pub fn new(
        x: Vec<f64>,
        f_x: Vec<f64>,
        strategy: Strategy,
        extrapolate: Extrapolate,
    ) -> anyhow::Result<Self> {
        let mut interp = Self {
            x,
            f_x,
            strategy,
            extrapolate,
            second_derivs: vec![],
        };
        interp.validate()?;
        if matches!(interp.strategy, Strategy::Cubic) {
            interp.second_derivs = not_a_knot_second_derivs(&interp.x, &interp.f_x)?;
        }
        Ok(interp)
    }

    /// Evaluates the interpolant, mapping any failure to NaN.
    pub fn eval(&self, point: f64) -> f64 {
        self.interpolate(point).unwrap_or(f64::NAN)
    }

    pub fn linear(&self, point: f64) -> f64 {
        if let Some(i) = self.x.iter().position(|&x_val| x_val == point) {
            return self.f_x[i];
        }
        let lower_index = find_nearest_index(&self.x, point);
        let diff = (point - self.x[lower_index]) / (self.x[lower_index + 1] - self.x[lower_index]);
        self.f_x[lower_index] * (1.0 - diff) + self.f_x[lower_index + 1] * diff
    }

    pub fn cubic(&self, point: f64) -> f64 {
        if let Some(i) = self.x.iter().position(|&x_val| x_val == point) {
            return self.f_x[i];
        }
        let i = find_nearest_index(&self.x, point);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.f_x[i], self.f_x[i + 1]);
        let (m0, m1) = (self.second_derivs[i], self.second_derivs[i + 1]);
        let h = x1 - x0;
        let (a, b) = (x1 - point, point - x0);
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }

    fn in_bounds(&self, point: f64) -> bool {
        match (self.x.first(), self.x.last()) {
            (Some(&lo), Some(&hi)) => lo <= point && point <= hi,
            _ => false,
        }
    }
}

impl InterpMethods for Interp1D {
    fn validate(&self) -> anyhow::Result<()> {
        let x_grid_len = self.x.len();

        // Check that each grid dimension has elements
        ensure!(x_grid_len != 0, "Supplied x-coordinates cannot be empty");
        ensure!(
            x_grid_len >= 2,
            "At least 2 data points are required: x = {:?}, f_x = {:?}",
            self.x,
            self.f_x,
        );
        if matches!(self.strategy, Strategy::Cubic) {
            ensure!(
                x_grid_len >= 4,
                "Cubic interpolation requires at least 4 data points, got {x_grid_len}"
            );
        }
        // Check that grid points are monotonically increasing
        ensure!(
            self.x.windows(2).all(|w| w[0] < w[1]),
            "Supplied x-coordinates must be sorted and non-repeating"
        );
        // Check that grid and values are compatible shapes
        ensure!(
            x_grid_len == self.f_x.len(),
            "Supplied grid and values are not compatible shapes"
        );

        Ok(())
    }

    fn interpolate(&self, point: f64) -> anyhow::Result<f64> {
        let point = if self.in_bounds(point) {
            point
        } else {
            match self.extrapolate {
                Extrapolate::Fill(value) => return Ok(value),
                Extrapolate::Clamp => {
                    ensure!(!point.is_nan(), "Cannot clamp NaN interpolant point");
                    point.clamp(self.x[0], self.x[self.x.len() - 1])
                }
                Extrapolate::Error => bail!(
                    "Attempted to interpolate at point beyond grid data: point = {point}, grid = {:?}",
                    self.x
                ),
            }
        };
        Ok(match self.strategy {
            Strategy::Linear => self.linear(point),
            Strategy::Cubic => self.cubic(point),
        })
    }
}

/// Solves for the knot second derivatives of a not-a-knot cubic spline, i.e. the
/// third derivative is continuous across the second and second-to-last knots.
fn not_a_knot_second_derivs(x: &[f64], y: &[f64]) -> anyhow::Result<Vec<f64>> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);

    a[(0, 0)] = h[1];
    a[(0, 1)] = -(h[0] + h[1]);
    a[(0, 2)] = h[0];
    for i in 1..n - 1 {
        a[(i, i - 1)] = h[i - 1];
        a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
        a[(i, i + 1)] = h[i];
        rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
    }
    a[(n - 1, n - 3)] = h[n - 2];
    a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
    a[(n - 1, n - 1)] = h[n - 3];

    let second_derivs = a
        .lu()
        .solve(&rhs)
        .with_context(|| format!("Singular spline system for knots {x:?}"))?;
    Ok(second_derivs.as_slice().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_args() {
        assert!(Interp1D::new(vec![], vec![], Strategy::Linear, Extrapolate::Error).is_err());
        assert!(Interp1D::new(
            vec![0., 2., 1.],
            vec![0., 1., 2.],
            Strategy::Linear,
            Extrapolate::Error
        )
        .is_err());
        assert!(Interp1D::new(
            vec![0., 1., 2.],
            vec![0., 1.],
            Strategy::Linear,
            Extrapolate::Error
        )
        .is_err());
        assert!(Interp1D::new(
            vec![0., 1., 2.],
            vec![0., 1., 2.],
            Strategy::Cubic,
            Extrapolate::Error
        )
        .is_err());
    }

    #[test]
    fn test_linear() {
        let interp = Interp1D::new(
            vec![0., 1., 2., 3., 4.],
            vec![0.2, 0.4, 0.6, 0.8, 1.0],
            Strategy::Linear,
            Extrapolate::Error,
        )
        .unwrap();
        assert_eq!(interp.interpolate(1.0).unwrap(), 0.4);
        assert_eq!(interp.interpolate(4.0).unwrap(), 1.0);
        assert!((interp.interpolate(3.75).unwrap() - 0.95).abs() < 1e-12);
        assert!(interp.interpolate(4.5).is_err());
    }

    #[test]
    fn test_extrapolate_fill_and_clamp() {
        let x = vec![-10., -10. / 3., 10. / 3., 10.];
        let f_x = vec![1., 2., 3., 4.];
        let fill =
            Interp1D::new(x.clone(), f_x.clone(), Strategy::Linear, Extrapolate::Fill(f64::NAN))
                .unwrap();
        assert!(fill.interpolate(10.5).unwrap().is_nan());
        assert!(fill.eval(f64::NAN).is_nan());
        assert_eq!(fill.eval(-10.0), 1.0);
        let clamp = Interp1D::new(x, f_x, Strategy::Cubic, Extrapolate::Clamp).unwrap();
        assert!((clamp.interpolate(-20.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((clamp.interpolate(20.0).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_reproduces_cubic_polynomial() {
        let poly = |x: f64| 0.5 * x.powi(3) - 2.0 * x.powi(2) + x - 3.0;
        for x in [vec![-2., -1., 1., 2.], vec![-3., -1., 0., 0.5, 2., 4.]] {
            let f_x = x.iter().map(|&x| poly(x)).collect();
            let interp = Interp1D::new(x, f_x, Strategy::Cubic, Extrapolate::Error).unwrap();
            for point in [-0.75, 0.3, 1.5, 1.99] {
                assert!(
                    (interp.interpolate(point).unwrap() - poly(point)).abs() < 1e-9,
                    "point = {point}"
                );
            }
        }
    }

    #[test]
    fn test_not_a_knot_second_derivs_of_cubic() {
        // f(x) = 0.5 x^3 - 2 x^2 + x - 3, f''(x) = 3 x - 4
        let x = [-2., -1., 1., 2., 3.5];
        let y: Vec<f64> = x
            .iter()
            .map(|&x: &f64| 0.5 * x.powi(3) - 2.0 * x.powi(2) + x - 3.0)
            .collect();
        let second_derivs = not_a_knot_second_derivs(&x, &y).unwrap();
        assert_eq!(second_derivs.len(), x.len());
        for (x, m) in x.iter().zip(second_derivs) {
            assert!((m - (3.0 * x - 4.0)).abs() < 1e-9, "x = {x}");
        }
    }

    #[test]
    fn test_cubic_hits_knots() {
        let x = vec![0., 1., 2.5, 3., 5.];
        let f_x = vec![1., -1., 4., 2., 0.];
        let interp =
            Interp1D::new(x.clone(), f_x.clone(), Strategy::Cubic, Extrapolate::Error).unwrap();
        for (x, y) in x.iter().zip(f_x.iter()) {
            assert_eq!(interp.interpolate(*x).unwrap(), *y);
        }
        // right-end segment evaluated through the spline formula
        assert!(interp.interpolate(4.0).unwrap().is_finite());
    }
}
