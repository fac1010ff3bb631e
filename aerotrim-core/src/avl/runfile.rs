//! Run-case text format read by AVL's `oper` menu.

use crate::atmosphere::{Atmosphere, G0};
use crate::flight_conditions::RunBatch;
use crate::geometry::AircraftGeometry;
use crate::imports::*;

/// Line separating consecutive run cases
pub const CASE_SEPARATOR: &str = "---------------------------------------------";

/// Air data derived for one flight point while encoding. AVL does not echo
/// these back, so they are kept for dimensionalizing the parsed coefficients.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PointAirData {
    /// global index of the flight point
    pub index: usize,
    /// dynamic pressure \[Pa\]
    pub q: f64,
    /// true airspeed \[m/s\]
    pub v_tas: f64,
    /// air density \[kg/m^3\]
    pub density: f64,
    /// nacelle zero-lift drag coefficient passed as `CDo`
    pub cd_nacelle: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodedBatch {
    pub text: String,
    pub air_data: Vec<PointAirData>,
}

/// Encodes every point of `batch` as an AVL run case.
pub fn encode_batch(
    batch: &RunBatch,
    geom: &AircraftGeometry,
    atmos: &Atmosphere,
) -> EncodedBatch {
    let mut lines = Vec::with_capacity(batch.points.len() * 12);
    let mut air_data = Vec::with_capacity(batch.points.len());
    for (local, (index, point)) in batch
        .global_indices()
        .zip(batch.points.iter())
        .enumerate()
    {
        let v_tas = atmos.mach_to_tas(point.mach, point.altitude);
        let density = atmos.density(point.altitude);
        let q = 0.5 * density * v_tas.powi(2);
        let cd_nacelle = geom.nacelle_drag(q);
        air_data.push(PointAirData {
            index,
            q,
            v_tas,
            density,
            cd_nacelle,
        });

        lines.push(CASE_SEPARATOR.to_string());
        lines.push(format!("Run case  {}: -{}-", local + 1, index + 1));
        lines.push(format!("alpha -> alpha = {}", point.alpha));
        lines.push(format!("beta -> beta = {}", point.beta));
        lines.push("pb/2V -> pb/2V = 0.0000".to_string());
        lines.push("qc/2V -> qc/2V = 0.0000".to_string());
        lines.push("rb/2V -> rb/2V = 0.0000".to_string());
        lines.push(format!("CDo = {cd_nacelle}"));
        lines.push(format!("Mach = {}", point.mach));
        lines.push(format!("velocity = {v_tas}"));
        lines.push(format!("density = {density}"));
        lines.push(format!("grav.acc. = {G0}"));
    }
    EncodedBatch {
        text: lines.join("\n"),
        air_data,
    }
}
