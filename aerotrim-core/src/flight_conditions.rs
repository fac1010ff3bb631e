//! Flight-condition sweeps: Cartesian products of (alpha, beta, altitude, mach)
//! and their partition into solver batches.

use crate::imports::*;
use itertools::iproduct;

/// Values along one sweep axis. Deserializes from either a scalar or a list.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(from = "AxisRepr", into = "Vec<f64>")]
pub struct Axis(pub Vec<f64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum AxisRepr {
    Scalar(f64),
    List(Vec<f64>),
}

impl From<AxisRepr> for Axis {
    fn from(repr: AxisRepr) -> Self {
        match repr {
            AxisRepr::Scalar(value) => Self(vec![value]),
            AxisRepr::List(values) => Self(values),
        }
    }
}

impl From<Axis> for Vec<f64> {
    fn from(axis: Axis) -> Self {
        axis.0
    }
}

impl From<f64> for Axis {
    fn from(value: f64) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<f64>> for Axis {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for Axis {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

impl Axis {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One solver evaluation point.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FlightPoint {
    /// angle of attack \[deg\]
    pub alpha: f64,
    /// sideslip angle \[deg\]
    pub beta: f64,
    /// altitude \[m\]
    pub altitude: f64,
    pub mach: f64,
}

/// Axis values of a sweep. The sweep is the Cartesian product of the four axes,
/// alpha outermost and mach innermost.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FlightConditions {
    pub alpha: Axis,
    pub beta: Axis,
    pub altitude: Axis,
    pub mach: Axis,
}

impl SerdeAPI for FlightConditions {
    fn init(&mut self) -> anyhow::Result<()> {
        self.validate()
    }
}

impl FlightConditions {
    pub fn new(
        alpha: impl Into<Axis>,
        beta: impl Into<Axis>,
        altitude: impl Into<Axis>,
        mach: impl Into<Axis>,
    ) -> Self {
        Self {
            alpha: alpha.into(),
            beta: beta.into(),
            altitude: altitude.into(),
            mach: mach.into(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (label, axis) in [
            ("alpha", &self.alpha),
            ("beta", &self.beta),
            ("altitude", &self.altitude),
            ("mach", &self.mach),
        ] {
            ensure!(
                !axis.is_empty(),
                "{}\nFlight condition axis `{label}` has no values",
                format_dbg!()
            );
            ensure!(
                axis.0.iter().all(|v| v.is_finite()),
                "{}\nFlight condition axis `{label}` has non-finite values: {:?}",
                format_dbg!(),
                axis.0
            );
        }
        Ok(())
    }

    /// Number of flight points in the sweep
    pub fn n_cases(&self) -> usize {
        self.alpha.len() * self.beta.len() * self.altitude.len() * self.mach.len()
    }

    /// Full Cartesian product in global-index order.
    pub fn flight_points(&self) -> anyhow::Result<Vec<FlightPoint>> {
        self.validate()?;
        Ok(iproduct!(
            self.alpha.0.iter(),
            self.beta.0.iter(),
            self.altitude.0.iter(),
            self.mach.0.iter()
        )
        .map(|(&alpha, &beta, &altitude, &mach)| FlightPoint {
            alpha,
            beta,
            altitude,
            mach,
        })
        .collect())
    }
}

/// Contiguous slice of a sweep evaluated by one solver invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RunBatch {
    pub batch_id: usize,
    /// global index of the first point
    pub offset: usize,
    pub points: Vec<FlightPoint>,
}

impl RunBatch {
    /// Global indices covered by this batch
    pub fn global_indices(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.points.len()
    }
}

/// Splits `points` into ordered batches of at most `max_cases` points.
pub fn batches(points: &[FlightPoint], max_cases: usize) -> anyhow::Result<Vec<RunBatch>> {
    ensure!(max_cases > 0, "{}\n`max_cases` must be positive", format_dbg!());
    ensure!(!points.is_empty(), "{}\nNo flight points to batch", format_dbg!());
    Ok(points
        .chunks(max_cases)
        .enumerate()
        .map(|(batch_id, chunk)| RunBatch {
            batch_id,
            offset: batch_id * max_cases,
            points: chunk.to_vec(),
        })
        .collect())
}
