//! Convenience re-exports of the main public types

pub use crate::aero::{AeroCalculator, AeroModel, AeroModelConfig, AeroRecord, AeroResults};
pub use crate::atmosphere::Atmosphere;
pub use crate::avl::{AvlAeroCalculator, AvlConfig, AvlStdoutParser, ExecutionMode, OutputParser};
pub use crate::cache::BatchAeroCache;
pub use crate::equilibrium::{
    TrimConfig, TrimEquilibriumSolver, TrimInputs, TrimPolars, TrimSolution,
};
pub use crate::flight_conditions::{Axis, FlightConditions, FlightPoint, RunBatch};
pub use crate::geometry::AircraftGeometry;
pub use crate::traits::{ApproxEq, SerdeAPI};
