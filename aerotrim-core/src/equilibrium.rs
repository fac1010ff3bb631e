//! Cruise trim: the angle of attack at which the thrust needed to balance the
//! horizontal forces equals the thrust needed to balance the vertical forces.

use crate::aero::{AeroCalculator, AeroResults};
use crate::atmosphere::G0;
use crate::cache::BatchAeroCache;
use crate::flight_conditions::FlightConditions;
use crate::imports::*;
use crate::utils::interp::{Extrapolate, Interp1D, Strategy};
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentRoot;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TrimConfig {
    /// number of alpha samples in the polar sweep
    pub n_alpha_samples: usize,
    /// sweep half-width \[deg\]
    pub range_alpha: f64,
    /// half-width of the bracket excluded around zero alpha \[deg\]
    pub bracket_eps: f64,
    /// root-finding tolerance on alpha \[deg\]
    pub xtol: f64,
    pub max_iters: u64,
    /// residual at an accepted root, relative to the weight force
    pub residual_rel_tol: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            n_alpha_samples: 4,
            range_alpha: 10.0,
            bracket_eps: 1e-10,
            xtol: 1e-12,
            max_iters: 100,
            residual_rel_tol: 1e-6,
        }
    }
}

impl SerdeAPI for TrimConfig {
    fn init(&mut self) -> anyhow::Result<()> {
        // cubic drag interpolation needs four samples
        ensure!(self.n_alpha_samples >= 4, format_dbg!(self.n_alpha_samples));
        ensure!(
            self.range_alpha.is_finite() && self.range_alpha > 0.0,
            format_dbg!(self.range_alpha)
        );
        ensure!(
            self.bracket_eps > 0.0 && self.bracket_eps < self.range_alpha,
            format_dbg!(self.bracket_eps)
        );
        ensure!(self.xtol > 0.0, format_dbg!(self.xtol));
        ensure!(self.max_iters > 0, format_dbg!(self.max_iters));
        ensure!(self.residual_rel_tol > 0.0, format_dbg!(self.residual_rel_tol));
        Ok(())
    }
}

impl TrimConfig {
    /// Candidate root brackets, in the order they are tried. Zero alpha is kept
    /// out of the outer brackets because the vertical balance has a pole there
    /// when the thrust line is aligned with the body axis.
    pub fn brackets(&self) -> [(f64, f64); 3] {
        [
            (-self.range_alpha, -self.bracket_eps),
            (self.bracket_eps, self.range_alpha),
            (-self.bracket_eps, self.bracket_eps),
        ]
    }
}

/// Operating point to trim.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrimInputs {
    /// aircraft weight force \[N\]
    pub weight_force: f64,
    /// engine thrust line inclination \[deg\]
    #[serde(default)]
    pub phi_thrust_eng: f64,
    pub mach: f64,
    /// altitude \[m\]
    pub altitude: f64,
}

impl SerdeAPI for TrimInputs {}

impl TrimInputs {
    /// Mid-cruise weight from take-off mass and cruise fuel mass \[kg\].
    pub fn from_masses(
        m_mto: f64,
        m_fuel_cruise: f64,
        phi_thrust_eng: f64,
        mach: f64,
        altitude: f64,
    ) -> Self {
        Self {
            weight_force: (m_mto - 0.5 * m_fuel_cruise) * G0,
            phi_thrust_eng,
            mach,
            altitude,
        }
    }
}

/// Lift and drag polars over alpha, interpolated from a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimPolars {
    lift: Interp1D,
    drag: Interp1D,
    cl: Interp1D,
    cd: Interp1D,
    /// engine thrust line inclination \[deg\]
    pub phi_thrust_eng: f64,
    /// weight force \[N\]
    pub weight_force: f64,
}

impl TrimPolars {
    /// Builds the polars from a sweep over alpha; `results` must be ordered by alpha.
    pub fn new(
        results: &AeroResults,
        phi_thrust_eng: f64,
        weight_force: f64,
    ) -> anyhow::Result<Self> {
        let alpha = results.alpha();
        let fill = Extrapolate::Fill(f64::NAN);
        let interp = |values: Vec<f64>, strategy| {
            Interp1D::new(alpha.clone(), values, strategy, fill)
                .with_context(|| format_dbg!(alpha))
        };
        Ok(Self {
            lift: interp(results.lift(), Strategy::Linear)?,
            drag: interp(results.drag(), Strategy::Cubic)?,
            cl: interp(results.cl(), Strategy::Linear)?,
            cd: interp(results.cd(), Strategy::Cubic)?,
            phi_thrust_eng,
            weight_force,
        })
    }

    /// Lift \[N\] at `alpha` \[deg\], NaN outside the sweep
    pub fn lift(&self, alpha: f64) -> f64 {
        self.lift.eval(alpha)
    }

    /// Drag \[N\] at `alpha` \[deg\], NaN outside the sweep
    pub fn drag(&self, alpha: f64) -> f64 {
        self.drag.eval(alpha)
    }

    pub fn cl(&self, alpha: f64) -> f64 {
        self.cl.eval(alpha)
    }

    pub fn cd(&self, alpha: f64) -> f64 {
        self.cd.eval(alpha)
    }

    /// Thrust \[N\] balancing the forces along the flight path
    pub fn horizontal_thrust(&self, alpha: f64) -> f64 {
        let alpha_rad = alpha.to_radians();
        let thrust_angle = self.phi_thrust_eng.to_radians() + alpha_rad;
        (self.lift(alpha) * alpha_rad.sin() + self.drag(alpha) * alpha_rad.cos())
            / thrust_angle.cos()
    }

    /// Thrust \[N\] balancing the forces normal to the flight path
    pub fn vertical_thrust(&self, alpha: f64) -> f64 {
        let alpha_rad = alpha.to_radians();
        let thrust_angle = self.phi_thrust_eng.to_radians() + alpha_rad;
        (self.drag(alpha) * alpha_rad.sin() + self.weight_force
            - self.lift(alpha) * alpha_rad.cos())
            / thrust_angle.sin()
    }

    pub fn residual(&self, alpha: f64) -> f64 {
        self.horizontal_thrust(alpha) - self.vertical_thrust(alpha)
    }

    /// Root of [`TrimPolars::residual`] in the first bracket that holds one.
    pub fn find_alpha_trim(&self, config: &TrimConfig) -> Option<f64> {
        let residual_tol = config.residual_rel_tol * self.weight_force.abs().max(1.0);
        for (lo, hi) in config.brackets() {
            let (r_lo, r_hi) = (self.residual(lo), self.residual(hi));
            if !(r_lo.is_finite() && r_hi.is_finite()) || r_lo * r_hi > 0.0 {
                log::debug!("No sign change in [{lo}, {hi}]: r = ({r_lo}, {r_hi})");
                continue;
            }
            let solver = BrentRoot::new(lo, hi, config.xtol);
            let res = Executor::new(ThrustResidual(self), solver)
                .configure(|state| state.max_iters(config.max_iters))
                .run();
            let alpha = match res {
                Ok(res) => match res.state().get_param() {
                    Some(&alpha) => alpha,
                    None => continue,
                },
                Err(err) => {
                    log::debug!("Root search failed in [{lo}, {hi}]: {err}");
                    continue;
                }
            };
            let r = self.residual(alpha);
            if r.abs() <= residual_tol {
                return Some(alpha);
            }
            // sign change across the pole rather than a root
            log::debug!("Rejected alpha = {alpha} in [{lo}, {hi}] with residual {r}");
        }
        None
    }
}

struct ThrustResidual<'a>(&'a TrimPolars);

impl CostFunction for ThrustResidual<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, alpha: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.0.residual(*alpha))
    }
}

/// Trimmed cruise state. Everything except `v_tas` is NaN when no equilibrium exists.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrimSolution {
    /// trimmed angle of attack \[deg\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub alpha_trim: f64,
    /// larger of horizontal and vertical thrust \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub thrust_required: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub thrust_horizontal: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub thrust_vertical: f64,
    /// |horizontal - vertical| \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub thrust_delta: f64,
    /// lift \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub lift: f64,
    /// drag \[N\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub drag: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub cl: f64,
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub cd: f64,
    /// true airspeed \[m/s\]
    #[serde(deserialize_with = "utils::nan_from_null")]
    pub v_tas: f64,
}

impl SerdeAPI for TrimSolution {}

impl TrimSolution {
    pub fn at_alpha(polars: &TrimPolars, alpha: f64, v_tas: f64) -> Self {
        let thrust_horizontal = polars.horizontal_thrust(alpha);
        let thrust_vertical = polars.vertical_thrust(alpha);
        Self {
            alpha_trim: alpha,
            thrust_required: thrust_horizontal.max(thrust_vertical),
            thrust_horizontal,
            thrust_vertical,
            thrust_delta: (thrust_horizontal - thrust_vertical).abs(),
            lift: polars.lift(alpha),
            drag: polars.drag(alpha),
            cl: polars.cl(alpha),
            cd: polars.cd(alpha),
            v_tas,
        }
    }

    pub fn unresolved(v_tas: f64) -> Self {
        Self {
            alpha_trim: f64::NAN,
            thrust_required: f64::NAN,
            thrust_horizontal: f64::NAN,
            thrust_vertical: f64::NAN,
            thrust_delta: f64::NAN,
            lift: f64::NAN,
            drag: f64::NAN,
            cl: f64::NAN,
            cd: f64::NAN,
            v_tas,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.alpha_trim.is_nan()
    }
}

/// Trims an aircraft using polars sampled from an aero model, memoizing sweeps.
#[derive(Debug)]
pub struct TrimEquilibriumSolver<A: AeroCalculator> {
    pub model: A,
    pub config: TrimConfig,
    cache: BatchAeroCache<AeroResults>,
}

impl<A: AeroCalculator> TrimEquilibriumSolver<A> {
    pub fn new(model: A, mut config: TrimConfig) -> anyhow::Result<Self> {
        config.init()?;
        Ok(Self {
            model,
            config,
            cache: BatchAeroCache::new(),
        })
    }

    /// Alpha sweep evaluated for `inputs`
    pub fn sweep_conditions(&self, inputs: &TrimInputs) -> FlightConditions {
        let range = self.config.range_alpha;
        FlightConditions::new(
            utils::linspace(-range, range, self.config.n_alpha_samples),
            0.0,
            inputs.altitude,
            inputs.mach,
        )
    }

    /// Sweep results for `inputs`, from the cache when available.
    pub fn sweep(&mut self, inputs: &TrimInputs) -> anyhow::Result<AeroResults> {
        let conditions = self.sweep_conditions(inputs);
        let geometry = self.model.geometry().clone();
        let model_key = self.model.cache_salt()?;
        let model = &mut self.model;
        self.cache.get_or_compute(&model_key, &geometry, &conditions, || {
            model.compute_aero(&conditions)
        })
    }

    pub fn polars(&mut self, inputs: &TrimInputs) -> anyhow::Result<TrimPolars> {
        let results = self.sweep(inputs)?;
        TrimPolars::new(&results, inputs.phi_thrust_eng, inputs.weight_force)
    }

    pub fn solve(&mut self, inputs: &TrimInputs) -> anyhow::Result<TrimSolution> {
        ensure!(
            inputs.weight_force.is_finite() && inputs.phi_thrust_eng.is_finite(),
            format_dbg!(inputs)
        );
        let results = self.sweep(inputs)?;
        let v_tas = results.records.first().map_or(f64::NAN, |r| r.v_tas);
        let polars = TrimPolars::new(&results, inputs.phi_thrust_eng, inputs.weight_force)?;
        let solution = match polars.find_alpha_trim(&self.config) {
            Some(alpha) => TrimSolution::at_alpha(&polars, alpha, v_tas),
            None => {
                log::warn!(
                    "No trim equilibrium for W = {} N at Mach {} and {} m",
                    inputs.weight_force,
                    inputs.mach,
                    inputs.altitude
                );
                TrimSolution::unresolved(v_tas)
            }
        };
        log::info!(
            "Trim: alpha = {:.4} deg, thrust required = {:.1} N, delta = {:.3e} N",
            solution.alpha_trim,
            solution.thrust_required,
            solution.thrust_delta
        );
        Ok(solution)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aero::AeroRecord;
    use crate::geometry::tests::mock_geometry;
    use crate::geometry::AircraftGeometry;

    /// Linear lift and constant drag in place of a solver.
    #[derive(Debug)]
    pub(crate) struct LinearPolarModel {
        pub geometry: AircraftGeometry,
        pub lift_0: f64,
        pub lift_alpha: f64,
        pub drag: f64,
        pub n_calls: usize,
    }

    impl Default for LinearPolarModel {
        fn default() -> Self {
            Self {
                geometry: mock_geometry(),
                lift_0: 100000.0,
                lift_alpha: 80000.0,
                drag: 20000.0,
                n_calls: 0,
            }
        }
    }

    impl AeroCalculator for LinearPolarModel {
        fn geometry(&self) -> &AircraftGeometry {
            &self.geometry
        }

        fn compute_aero(&mut self, conditions: &FlightConditions) -> anyhow::Result<AeroResults> {
            self.n_calls += 1;
            let points = conditions.flight_points()?;
            let q = 1.0e4;
            let qs = q * self.geometry.s_ref;
            let records = points
                .iter()
                .map(|p| {
                    let lift = self.lift_0 + self.lift_alpha * p.alpha;
                    AeroRecord {
                        alpha_res: p.alpha,
                        CL: lift / qs,
                        CD: self.drag / qs,
                        CY: 0.0,
                        Cl: 0.0,
                        Cm: 0.0,
                        Cn: 0.0,
                        L: lift,
                        D: self.drag,
                        Y: 0.0,
                        l_b: 0.0,
                        m_b: 0.0,
                        n_b: 0.0,
                        q,
                        v_tas: 230.0,
                    }
                })
                .collect();
            Ok(AeroResults { points, records })
        }

        fn cache_salt(&self) -> anyhow::Result<String> {
            Ok(format!("{} {} {}", self.lift_0, self.lift_alpha, self.drag))
        }
    }

    fn cruise(weight_force: f64) -> TrimInputs {
        TrimInputs {
            weight_force,
            phi_thrust_eng: 0.0,
            mach: 0.78,
            altitude: 11000.0,
        }
    }

    #[test]
    fn test_converges_to_analytic_alpha() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        let w = 500000.0;
        let sol = solver.solve(&cruise(w)).unwrap();
        assert!(sol.is_resolved());
        // with phi = 0 the balance reduces to L = W cos(alpha)
        let alpha = sol.alpha_trim;
        let lift = 100000.0 + 80000.0 * alpha;
        assert!((lift - w * alpha.to_radians().cos()).abs() < 1e-3);
        assert!(alpha > 4.9 && alpha < 5.0);
        assert!(sol.thrust_delta < 1e-3);
        assert!(sol.lift.approx_eq(&lift, 1e-9));
        assert!(sol.drag.approx_eq(&20000.0, 1e-9));
        assert_eq!(sol.thrust_required, sol.thrust_horizontal.max(sol.thrust_vertical));
        assert_eq!(sol.v_tas, 230.0);
    }

    #[test]
    fn test_no_equilibrium_is_nan() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        let sol = solver.solve(&cruise(1.0e9)).unwrap();
        assert!(!sol.is_resolved());
        assert!(sol.thrust_required.is_nan() && sol.lift.is_nan());
        assert_eq!(sol.v_tas, 230.0);

        let parsed = TrimSolution::from_json(sol.to_json().unwrap()).unwrap();
        assert!(!parsed.is_resolved());
        assert!(parsed.cd.is_nan());
        assert_eq!(parsed.v_tas, 230.0);
    }

    #[test]
    fn test_model_settings_change_invalidates_sweep() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        let inputs = cruise(500000.0);
        let first = solver.solve(&inputs).unwrap();
        solver.model.lift_0 = 150000.0;
        let changed = solver.solve(&inputs).unwrap();
        assert_eq!(solver.model.n_calls, 2);
        assert!(changed.alpha_trim < first.alpha_trim);

        solver.clear_cache();
        let recomputed = solver.solve(&inputs).unwrap();
        assert_eq!(solver.model.n_calls, 3);
        assert_eq!(changed, recomputed);
    }

    #[test]
    fn test_sweep_is_cached() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        solver.solve(&cruise(500000.0)).unwrap();
        // weight and thrust angle do not change the sweep
        solver.solve(&cruise(450000.0)).unwrap();
        let mut inclined = cruise(500000.0);
        inclined.phi_thrust_eng = 2.0;
        solver.solve(&inclined).unwrap();
        assert_eq!(solver.model.n_calls, 1);
        let mut faster = cruise(500000.0);
        faster.mach = 0.8;
        solver.solve(&faster).unwrap();
        assert_eq!(solver.model.n_calls, 2);
        solver.clear_cache();
        solver.solve(&cruise(500000.0)).unwrap();
        assert_eq!(solver.model.n_calls, 3);
    }

    #[test]
    fn test_inclined_thrust_line_balances() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        let mut inputs = cruise(500000.0);
        inputs.phi_thrust_eng = 3.0;
        let sol = solver.solve(&inputs).unwrap();
        assert!(sol.is_resolved());
        assert!(sol.thrust_delta <= 1e-6 * inputs.weight_force);
        assert!(sol.thrust_horizontal.approx_eq(&sol.thrust_vertical, 1e-6));
    }

    #[test]
    fn test_polars_outside_sweep_are_nan() {
        let mut solver =
            TrimEquilibriumSolver::new(LinearPolarModel::default(), TrimConfig::default()).unwrap();
        let polars = solver.polars(&cruise(500000.0)).unwrap();
        assert!(polars.lift(10.5).is_nan());
        assert!(polars.residual(-12.0).is_nan());
        assert!(polars.cl(0.0).is_finite());
        assert!(polars.cd(3.3).approx_eq(&polars.cd(-7.1), 1e-9));
    }

    #[test]
    fn test_from_masses() {
        let inputs = TrimInputs::from_masses(70000.0, 10000.0, 0.0, 0.78, 11000.0);
        assert_eq!(inputs.weight_force, 65000.0 * G0);
    }

    #[test]
    fn test_invalid_config() {
        for yaml in ["n_alpha_samples: 3", "range_alpha: 0.0", "bracket_eps: 20.0"] {
            assert!(TrimConfig::from_yaml(yaml).is_err(), "{yaml}");
        }
        let config = TrimConfig {
            n_alpha_samples: 2,
            ..Default::default()
        };
        assert!(TrimEquilibriumSolver::new(LinearPolarModel::default(), config).is_err());
    }
}
