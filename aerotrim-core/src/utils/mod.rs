//! Module containing miscellaneous utility functions.

use crate::imports::*;

pub mod interp;

/// Deserializes an `f64` that may have been written as `null`, which is how
/// serde_json encodes NaN, back into NaN.
pub fn nan_from_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Returns `num` evenly spaced values over `[start, stop]`, endpoints included.
/// A single value returns `[start]`.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Locates an external executable.
///
/// If `program` contains a path separator it is checked directly, otherwise each
/// directory on `PATH` is searched. Returns `None` when nothing executable is found.
pub fn find_executable<S: AsRef<OsStr>>(program: S) -> Option<PathBuf> {
    let program = Path::new(program.as_ref());
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_from_null() {
        #[derive(Deserialize)]
        struct Value {
            #[serde(deserialize_with = "nan_from_null")]
            x: f64,
        }
        let value: Value = serde_json::from_str(r#"{"x": null}"#).unwrap();
        assert!(value.x.is_nan());
        let value: Value = serde_json::from_str(r#"{"x": 1.5}"#).unwrap();
        assert_eq!(value.x, 1.5);
        let value: Value = serde_yaml::from_str("x: .nan").unwrap();
        assert!(value.x.is_nan());
        assert!(serde_json::from_str::<Value>(r#"{"x": "a"}"#).is_err());
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(-10.0, 10.0, 5), vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(2.0, 3.0, 0).is_empty());
        let sweep = linspace(-10.0, 10.0, 4);
        assert_eq!(sweep.len(), 4);
        assert_eq!(*sweep.last().unwrap(), 10.0);
    }

    #[test]
    fn test_find_executable_missing() {
        assert!(find_executable("surely-not-an-installed-solver-7f3a").is_none());
        assert!(find_executable("/nonexistent/dir/avl").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_by_path() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("fake-solver");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        assert!(find_executable(&exe).is_none());
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_executable(&exe), Some(exe));
    }
}
