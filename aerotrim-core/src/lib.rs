//! Crate containing a batch driver for the AVL vortex-lattice solver and a cruise
//! trim solver built on top of it.
//!
//! The aero pipeline turns a sweep of flight conditions into run files, executes
//! AVL sequentially or as concurrent processes, and scrapes coefficients from its
//! output. Unresolved values are NaN so a sweep always returns a fully shaped result.

#[macro_use]
pub mod macros;

pub mod aero;
pub mod atmosphere;
pub mod avl;
pub mod cache;
pub mod equilibrium;
pub mod flight_conditions;
pub mod geometry;
pub mod imports;
pub mod prelude;
pub mod traits;
pub mod utils;
