//! AVL-backed aero model: run-file encoding, solver execution, and output parsing.

pub mod output;
pub mod process;
pub mod runfile;

pub use output::{AvlStdoutParser, OutputParser};
pub use process::ExecutionMode;

use crate::aero::{AeroCalculator, AeroResults};
use crate::atmosphere::Atmosphere;
use crate::flight_conditions::{batches, FlightConditions, FlightPoint};
use crate::geometry::AircraftGeometry;
use crate::imports::*;
use process::{SolverRunner, AIRCRAFT_FILE};
use runfile::{encode_batch, PointAirData};
use tempfile::TempDir;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AvlConfig {
    /// solver executable, looked up on `PATH` unless it contains a path separator
    pub command: String,
    /// keystrokes piped to the solver's interactive menu
    pub keystrokes: String,
    /// maximum run cases per run file
    pub max_cases: usize,
    /// persist run parameters and raw solver output in the working directory
    pub debug: bool,
    /// working directory; a temporary directory is used when absent
    pub working_directory: Option<PathBuf>,
    /// concurrent worker count, defaults to available cores less one
    pub n_workers: Option<usize>,
    /// accept geometry updates through [`AvlAeroCalculator::update_geometry`]
    pub update_geometry: bool,
}

impl Default for AvlConfig {
    fn default() -> Self {
        Self {
            command: "avl".into(),
            keystrokes: ["oper", "xx", "", "", "q"].join("\n"),
            max_cases: 25,
            debug: false,
            working_directory: None,
            n_workers: None,
            update_geometry: true,
        }
    }
}

impl SerdeAPI for AvlConfig {
    fn init(&mut self) -> anyhow::Result<()> {
        ensure!(
            !self.command.trim().is_empty(),
            "{}\nSolver command cannot be empty",
            format_dbg!()
        );
        ensure!(self.max_cases > 0, format_dbg!(self.max_cases));
        ensure!(self.n_workers != Some(0), format_dbg!(self.n_workers));
        Ok(())
    }
}

#[derive(Debug)]
enum WorkingDir {
    Provided(PathBuf),
    Temporary(TempDir),
}

#[derive(Serialize)]
struct RawParams<'a> {
    #[serde(flatten)]
    point: &'a FlightPoint,
    #[serde(flatten)]
    air: &'a PointAirData,
}

/// Runs flight-condition sweeps through the external AVL solver.
#[derive(Debug)]
pub struct AvlAeroCalculator {
    geometry: AircraftGeometry,
    pub config: AvlConfig,
    pub atmosphere: Atmosphere,
    /// forces a dispatch mode instead of [`ExecutionMode::select`]
    pub execution_mode: Option<ExecutionMode>,
    working_dir: WorkingDir,
}

impl AvlAeroCalculator {
    pub fn new(
        geometry: AircraftGeometry,
        mut config: AvlConfig,
        atmosphere: Atmosphere,
    ) -> anyhow::Result<Self> {
        geometry.validate()?;
        config.init()?;
        let working_dir = match &config.working_directory {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Could not create working directory {dir:?}"))?;
                WorkingDir::Provided(dir.clone())
            }
            None => WorkingDir::Temporary(
                tempfile::Builder::new()
                    .prefix("aerotrim-avl-")
                    .tempdir()
                    .with_context(|| format_dbg!())?,
            ),
        };
        Ok(Self {
            geometry,
            config,
            atmosphere,
            execution_mode: None,
            working_dir,
        })
    }

    pub fn working_dir(&self) -> &Path {
        match &self.working_dir {
            WorkingDir::Provided(dir) => dir,
            WorkingDir::Temporary(dir) => dir.path(),
        }
    }

    /// Regenerates the geometry from an updated description, if enabled.
    pub fn update_geometry(&mut self, latest: &AircraftGeometry) -> anyhow::Result<()> {
        if self.config.update_geometry {
            self.geometry.update(latest)
        } else {
            log::debug!("Geometry updates disabled, keeping {:?}", self.geometry.name);
            Ok(())
        }
    }

    /// Removes the working directory if it was created by this calculator.
    /// A caller-provided directory is left in place.
    pub fn cleanup(self) -> anyhow::Result<()> {
        match self.working_dir {
            WorkingDir::Temporary(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()
                    .with_context(|| format!("Could not remove working directory {path:?}"))
            }
            WorkingDir::Provided(_) => Ok(()),
        }
    }

    fn n_workers(&self) -> usize {
        self.config
            .n_workers
            .unwrap_or_else(process::default_n_workers)
    }
}

impl AeroCalculator for AvlAeroCalculator {
    fn geometry(&self) -> &AircraftGeometry {
        &self.geometry
    }

    fn compute_aero(&mut self, conditions: &FlightConditions) -> anyhow::Result<AeroResults> {
        let points = conditions.flight_points()?;
        let batches = batches(&points, self.config.max_cases)?;
        let working_dir = self.working_dir().to_path_buf();

        let aircraft_file = working_dir.join(AIRCRAFT_FILE);
        std::fs::write(&aircraft_file, &self.geometry.avl_definition)
            .with_context(|| format!("Could not write aircraft file {aircraft_file:?}"))?;

        let mut runs = Vec::with_capacity(batches.len());
        let mut air_data = Vec::with_capacity(points.len());
        for batch in &batches {
            let encoded = encode_batch(batch, &self.geometry, &self.atmosphere);
            runs.push((batch.batch_id, encoded.text));
            air_data.extend(encoded.air_data);
        }

        if self.config.debug {
            let raw: Vec<RawParams> = points
                .iter()
                .zip(air_data.iter())
                .map(|(point, air)| RawParams { point, air })
                .collect();
            let path = working_dir.join("avl_raw_params.json");
            std::fs::write(&path, serde_json::to_string_pretty(&raw)?)
                .with_context(|| format!("Could not write {path:?}"))?;
        }

        let mode = self
            .execution_mode
            .unwrap_or_else(|| ExecutionMode::select(points.len(), self.config.max_cases));
        let runner = SolverRunner {
            command: &self.config.command,
            keystrokes: &self.config.keystrokes,
            working_dir: &working_dir,
            debug: self.config.debug,
            n_workers: self.n_workers(),
        };
        let text = runner.run(&runs, mode)?;
        let records = output::parse_results(&AvlStdoutParser, &text, &air_data, &self.geometry);

        let n_resolved = records.iter().filter(|r| r.CL.is_finite()).count();
        log::info!(
            "{}: {} of {} cases resolved in {} batches ({:?})",
            self.geometry.name,
            n_resolved,
            points.len(),
            batches.len(),
            mode
        );
        Ok(AeroResults { points, records })
    }

    fn cache_salt(&self) -> anyhow::Result<String> {
        serde_json::to_string(&(&self.atmosphere, &self.config)).with_context(|| format_dbg!())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::mock_geometry;

    #[test]
    fn test_config_defaults() {
        let config = AvlConfig::from_yaml("debug: true").unwrap();
        assert_eq!(config.command, "avl");
        assert_eq!(config.keystrokes, "oper\nxx\n\n\nq");
        assert_eq!(config.max_cases, 25);
        assert!(config.update_geometry);
        assert!(AvlConfig::from_yaml("max_cases: 0").is_err());
        assert!(AvlConfig::from_yaml("n_workers: 0").is_err());
    }

    #[test]
    fn test_temporary_working_dir_cleanup() {
        let calc =
            AvlAeroCalculator::new(mock_geometry(), AvlConfig::default(), Atmosphere::default())
                .unwrap();
        let dir = calc.working_dir().to_path_buf();
        assert!(dir.is_dir());
        calc.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_provided_working_dir_is_kept() {
        let parent = tempfile::tempdir().unwrap();
        let dir = parent.path().join("avl-runs");
        let config = AvlConfig {
            working_directory: Some(dir.clone()),
            ..Default::default()
        };
        let calc = AvlAeroCalculator::new(mock_geometry(), config, Atmosphere::default()).unwrap();
        assert_eq!(calc.working_dir(), dir.as_path());
        calc.cleanup().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_update_geometry() {
        let mut latest = mock_geometry();
        latest.s_ref = 140.0;
        let mut calc =
            AvlAeroCalculator::new(mock_geometry(), AvlConfig::default(), Atmosphere::default())
                .unwrap();
        calc.update_geometry(&latest).unwrap();
        assert_eq!(calc.geometry().s_ref, 140.0);

        let config = AvlConfig {
            update_geometry: false,
            ..Default::default()
        };
        let mut calc =
            AvlAeroCalculator::new(mock_geometry(), config, Atmosphere::default()).unwrap();
        calc.update_geometry(&latest).unwrap();
        assert_eq!(calc.geometry().s_ref, mock_geometry().s_ref);
    }

    #[test]
    fn test_missing_solver_yields_nan_shaped_results() {
        let config = AvlConfig {
            command: "surely-not-an-installed-solver-7f3a".into(),
            debug: true,
            ..Default::default()
        };
        let mut calc =
            AvlAeroCalculator::new(mock_geometry(), config, Atmosphere::default()).unwrap();
        let conditions = FlightConditions::new(vec![-2.0, 0.0, 2.0], 0.0, 10000.0, 0.78);
        let results = calc.compute_aero(&conditions).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.records.iter().all(|r| r.CL.is_nan() && r.L.is_nan()));
        // air data survives solver failure
        assert!(results.records.iter().all(|r| r.v_tas > 200.0 && r.q > 0.0));
        let dir = calc.working_dir();
        assert!(dir.join("airplane.avl").exists());
        assert!(dir.join("avl_raw_params.json").exists());
    }

    #[test]
    fn test_cache_salt_tracks_settings() {
        let mut calc =
            AvlAeroCalculator::new(mock_geometry(), AvlConfig::default(), Atmosphere::default())
                .unwrap();
        let salt = calc.cache_salt().unwrap();
        assert_eq!(calc.cache_salt().unwrap(), salt);
        calc.atmosphere.offset_deg = 20.0;
        let warm = calc.cache_salt().unwrap();
        assert_ne!(warm, salt);
        calc.config.command = "/opt/avl/bin/avl".into();
        assert_ne!(calc.cache_salt().unwrap(), warm);
    }

    #[test]
    fn test_empty_conditions_is_error() {
        let mut calc =
            AvlAeroCalculator::new(mock_geometry(), AvlConfig::default(), Atmosphere::default())
                .unwrap();
        let conditions = FlightConditions::new(Vec::<f64>::new(), 0.0, 0.0, 0.5);
        assert!(calc.compute_aero(&conditions).is_err());
    }
}
