//! Execution of the external AVL binary over run-file batches.

use crate::imports::*;
use rayon::prelude::*;
use std::io::Write;
use std::process::{Command, Stdio};

/// Aircraft definition filename inside the working directory
pub const AIRCRAFT_FILE: &str = "airplane.avl";

/// How batches are dispatched to the solver.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum ExecutionMode {
    /// one blocking solver process per batch, in order
    Sequential,
    /// all batches as concurrent solver processes on a bounded worker pool
    Concurrent,
}

impl ExecutionMode {
    /// Sequential when the whole sweep fits into one batch.
    pub fn select(n_cases: usize, max_cases: usize) -> Self {
        if n_cases <= max_cases {
            Self::Sequential
        } else {
            Self::Concurrent
        }
    }

    /// Run-file name used for batch `batch_id`
    pub fn runfile_name(&self, batch_id: usize) -> String {
        match self {
            Self::Sequential => "airplane.run".to_string(),
            Self::Concurrent => format!("airplane_{batch_id}.run"),
        }
    }
}

/// Default worker count: physical cores less one, at least one.
pub fn default_n_workers() -> usize {
    num_cpus::get_physical().saturating_sub(1).max(1)
}

/// Launches the solver in a working directory that already holds
/// [`AIRCRAFT_FILE`].
#[derive(Clone, Debug)]
pub struct SolverRunner<'a> {
    pub command: &'a str,
    pub keystrokes: &'a str,
    pub working_dir: &'a Path,
    pub debug: bool,
    pub n_workers: usize,
}

impl<'a> SolverRunner<'a> {
    /// Runs every `(batch_id, run-file text)` pair and returns the captured
    /// stdout concatenated in batch order. Solver failures are logged and yield
    /// whatever output was captured; only working-directory I/O errors propagate.
    pub fn run(&self, runs: &[(usize, String)], mode: ExecutionMode) -> anyhow::Result<String> {
        if utils::find_executable(self.command).is_none() {
            log::warn!(
                "Solver executable {:?} not found, results will be NaN",
                self.command
            );
        }
        let outputs = match mode {
            ExecutionMode::Sequential => self.run_sequential(runs)?,
            ExecutionMode::Concurrent => self.run_concurrent(runs)?,
        };
        let all = outputs.join("\n");
        if self.debug {
            self.write_debug_file("avl_results_all.txt", &all)?;
        }
        Ok(all)
    }

    fn run_sequential(&self, runs: &[(usize, String)]) -> anyhow::Result<Vec<String>> {
        let mode = ExecutionMode::Sequential;
        let mut outputs = Vec::with_capacity(runs.len());
        for (batch_id, text) in runs {
            let runfile = mode.runfile_name(*batch_id);
            self.write_runfile(&runfile, text)?;
            let output = self.run_one(&runfile);
            if self.debug {
                self.write_debug_file(&format!("avl_results_{batch_id}.txt"), &output)?;
            }
            outputs.push(output);
        }
        Ok(outputs)
    }

    fn run_concurrent(&self, runs: &[(usize, String)]) -> anyhow::Result<Vec<String>> {
        let mode = ExecutionMode::Concurrent;
        let jobs = runs
            .iter()
            .map(|(batch_id, text)| {
                let runfile = mode.runfile_name(*batch_id);
                self.write_runfile(&runfile, text)?;
                Ok((*batch_id, runfile))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers.max(1))
            .build()
            .with_context(|| format_dbg!(self.n_workers))?;
        log::debug!(
            "Dispatching {} solver batches on {} workers",
            jobs.len(),
            self.n_workers
        );
        let mut outputs: Vec<(usize, String)> = pool.install(|| {
            jobs.par_iter()
                .map(|(batch_id, runfile)| (*batch_id, self.run_one(runfile)))
                .collect()
        });
        // reassemble by submission order, never completion order
        outputs.sort_by_key(|(batch_id, _)| *batch_id);
        Ok(outputs.into_iter().map(|(_, output)| output).collect())
    }

    fn write_runfile(&self, name: &str, text: &str) -> anyhow::Result<()> {
        let path = self.working_dir.join(name);
        std::fs::write(&path, text).with_context(|| format!("Could not write run file {path:?}"))
    }

    fn write_debug_file(&self, name: &str, contents: &str) -> anyhow::Result<()> {
        let path = self.working_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Could not write debug file {path:?}"))
    }

    /// Runs `<command> airplane.avl <runfile>` once, feeding the keystrokes on stdin.
    fn run_one(&self, runfile: &str) -> String {
        log::debug!("{} {AIRCRAFT_FILE} {runfile}", self.command);
        let child = Command::new(self.command)
            .arg(AIRCRAFT_FILE)
            .arg(runfile)
            .current_dir(self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(err) => {
                log::warn!("Failed to launch {:?} for {runfile}: {err}", self.command);
                return String::new();
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            // the solver may exit before consuming its input
            if let Err(err) = stdin.write_all(self.keystrokes.as_bytes()) {
                log::warn!("Could not send keystrokes for {runfile}: {err}");
            }
        }
        match child.wait_with_output() {
            Ok(output) => {
                if !output.status.success() {
                    log::warn!(
                        "{:?} exited with {} for {runfile}: {}",
                        self.command,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Err(err) => {
                log::warn!("Failed to collect output of {:?} for {runfile}: {err}", self.command);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_mode() {
        assert_eq!(ExecutionMode::select(1, 25), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::select(25, 25), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::select(26, 25), ExecutionMode::Concurrent);
    }

    #[test]
    fn test_runfile_names() {
        assert_eq!(ExecutionMode::Sequential.runfile_name(3), "airplane.run");
        assert_eq!(ExecutionMode::Concurrent.runfile_name(3), "airplane_3.run");
    }

    #[test]
    fn test_default_n_workers() {
        let n_workers = default_n_workers();
        assert!(n_workers >= 1);
        assert!(n_workers <= num_cpus::get_physical().max(1));
        if num_cpus::get_physical() > 1 {
            assert_eq!(n_workers, num_cpus::get_physical() - 1);
        }
    }

    /// Each call records how many solver processes are alive when it starts.
    #[cfg(unix)]
    const COUNTING_SOLVER: &str = r#"#!/bin/sh
cat > /dev/null
touch "running_$$"
ls running_* | wc -l >> concurrency.log
sleep 1
rm -f "running_$$"
"#;

    #[cfg(unix)]
    #[test]
    fn test_n_workers_caps_concurrent_processes() {
        use std::os::unix::fs::PermissionsExt;
        let bin_dir = tempfile::tempdir().unwrap();
        let exe = bin_dir.path().join("counting-solver");
        std::fs::write(&exe, COUNTING_SOLVER).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let command = exe.to_string_lossy().into_owned();

        let dir = tempfile::tempdir().unwrap();
        let runner = SolverRunner {
            command: &command,
            keystrokes: "q",
            working_dir: dir.path(),
            debug: false,
            n_workers: 2,
        };
        let runs: Vec<(usize, String)> = (0..5).map(|id| (id, String::new())).collect();
        runner.run(&runs, ExecutionMode::Concurrent).unwrap();

        let log = std::fs::read_to_string(dir.path().join("concurrency.log")).unwrap();
        let counts: Vec<usize> = log.lines().map(|l| l.trim().parse().unwrap()).collect();
        assert_eq!(counts.len(), 5);
        assert!(counts.iter().all(|&n| (1..=2).contains(&n)), "{counts:?}");
    }

    #[test]
    fn test_missing_solver_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SolverRunner {
            command: "surely-not-an-installed-solver-7f3a",
            keystrokes: "oper\nxx\n\n\nq",
            working_dir: dir.path(),
            debug: true,
            n_workers: 2,
        };
        let runs = vec![(0, "a".to_string()), (1, "b".to_string())];
        for mode in [ExecutionMode::Sequential, ExecutionMode::Concurrent] {
            assert_eq!(runner.run(&runs, mode).unwrap(), "\n");
        }
        assert!(dir.path().join("airplane.run").exists());
        assert!(dir.path().join("airplane_1.run").exists());
        assert!(dir.path().join("avl_results_0.txt").exists());
        assert!(dir.path().join("avl_results_all.txt").exists());
    }

    #[test]
    fn test_unwritable_working_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let runner = SolverRunner {
            command: "avl",
            keystrokes: "",
            working_dir: &missing,
            debug: false,
            n_workers: 1,
        };
        assert!(runner
            .run(&[(0, String::new())], ExecutionMode::Sequential)
            .is_err());
    }
}
