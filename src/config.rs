//! Configuration defaults and their override points.

use std::ffi::OsString;
use std::path::PathBuf;

/// Directory scanned for cluster definition files.
pub const DEFAULT_CLUSTERS_DIR: &str = "/etc/ood/config/clusters.d";

/// Environment variable overriding the clusters directory.
pub const CLUSTERS_DIR_ENV: &str = "JOBCTL_CLUSTERS_DIR";

/// Default file a submitted job's standard output is written to.
pub const DEFAULT_OUTPUT_PATH: &str = "job_output";

/// Default file a submitted job's standard error is written to.
pub const DEFAULT_ERROR_PATH: &str = "job_errors";

/// Resolve the clusters directory: CLI flag, then environment, then default.
pub fn clusters_dir(flag: Option<PathBuf>) -> PathBuf {
    clusters_dir_from(flag, std::env::var_os(CLUSTERS_DIR_ENV))
}

fn clusters_dir_from(flag: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Some(dir) = env.filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    PathBuf::from(DEFAULT_CLUSTERS_DIR)
}
