//! Aircraft geometry consumed by the aero models.

use crate::imports::*;

/// Reference geometry and aircraft-definition text for one airframe.
///
/// Geometry synthesis happens upstream; this struct only carries the reference
/// quantities needed to dimensionalize coefficients and the ready-to-run
/// aircraft definition handed to the external solver.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AircraftGeometry {
    #[serde(default)]
    pub name: String,
    /// reference wing area \[m^2\]
    pub s_ref: f64,
    /// reference span \[m\]
    pub b_ref: f64,
    /// reference (mean aerodynamic) chord \[m\]
    pub c_ref: f64,
    /// number of engines
    pub n_eng: u32,
    /// nacelle diameter \[m\]
    pub d_nacelle: f64,
    /// aircraft definition file contents, written as `airplane.avl`
    pub avl_definition: String,
}

impl SerdeAPI for AircraftGeometry {
    fn init(&mut self) -> anyhow::Result<()> {
        self.validate()
    }
}

impl AircraftGeometry {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (label, value) in [
            ("s_ref", self.s_ref),
            ("b_ref", self.b_ref),
            ("c_ref", self.c_ref),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                "{}\n`{label}` must be finite and positive, got {value}",
                format_dbg!()
            );
        }
        ensure!(
            self.d_nacelle.is_finite() && self.d_nacelle >= 0.0,
            "{}\n`d_nacelle` must be finite and non-negative, got {}",
            format_dbg!(),
            self.d_nacelle
        );
        Ok(())
    }

    /// Replaces this geometry with an updated description after validating it.
    pub fn update(&mut self, latest: &AircraftGeometry) -> anyhow::Result<()> {
        latest
            .validate()
            .with_context(|| format!("Rejected geometry update for {:?}", latest.name))?;
        *self = latest.clone();
        Ok(())
    }

    /// Nacelle zero-lift drag increment at dynamic pressure `q` \[Pa\]
    pub fn nacelle_drag(&self, q: f64) -> f64 {
        const NACELLE_K: f64 = 1.8e7;
        const NACELLE_C: f64 = 5.7e-3;
        self.n_eng as f64 * (self.d_nacelle * std::f64::consts::PI * q / NACELLE_K + NACELLE_C)
    }
}
