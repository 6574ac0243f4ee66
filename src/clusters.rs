//! Cluster definitions and the registry that loads them from disk.
//!
//! Each `*.yml`/`*.yaml` file under the clusters directory defines one
//! cluster; the file stem is the cluster's name. Files use the `v2` layout:
//!
//! ```yaml
//! v2:
//!   metadata:
//!     title: "Research Computing"
//!   job:
//!     adapter: "slurm"
//!     cluster: "rcs"
//!     bin: "/usr/bin"
//! ```

use crate::adapter::{self, JobAdapter};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Failures while loading or querying the cluster registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read clusters directory {dir}")]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read cluster file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cluster file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cluster '{name}' is defined more than once in {dir}")]
    DuplicateCluster { name: String, dir: PathBuf },

    #[error("cluster '{name}' not found in {dir}")]
    ClusterNotFound { name: String, dir: PathBuf },

    #[error("cluster '{cluster}' does not define a job adapter")]
    NoJobConfig { cluster: String },

    #[error("cluster '{cluster}' has no usable job adapter")]
    Adapter {
        cluster: String,
        #[source]
        source: adapter::AdapterError,
    },
}

#[derive(Debug, Deserialize)]
struct ClusterFile {
    v2: ClusterDef,
}

#[derive(Debug, Deserialize)]
struct ClusterDef {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    job: Option<JobConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    title: Option<String>,
}

/// The `job:` block of a cluster definition.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    adapter: String,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    bin: Option<PathBuf>,
}

impl JobConfig {
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    pub fn bin(&self) -> Option<&Path> {
        self.bin.as_deref()
    }
}

/// One configured cluster: inert definition data plus access to its job
/// adapter.
#[derive(Debug)]
pub struct Cluster {
    id: String,
    title: Option<String>,
    job: Option<JobConfig>,
}

impl Cluster {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name, falling back to the id.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Build the scheduler backend this cluster is configured for.
    pub fn job_adapter(&self) -> Result<Box<dyn JobAdapter>, RegistryError> {
        let job = self
            .job
            .as_ref()
            .ok_or_else(|| RegistryError::NoJobConfig {
                cluster: self.id.clone(),
            })?;
        adapter::build(job).map_err(|source| RegistryError::Adapter {
            cluster: self.id.clone(),
            source,
        })
    }
}

/// All clusters found in one configuration directory, keyed by name.
///
/// Loaded fresh on every invocation and immutable afterwards.
#[derive(Debug)]
pub struct ClusterRegistry {
    dir: PathBuf,
    clusters: BTreeMap<String, Cluster>,
}

impl ClusterRegistry {
    /// Read every cluster file under `dir`. Other directory entries are
    /// ignored; a stem defined by more than one file is an error, so the
    /// loaded definition never depends on directory order.
    pub fn load(dir: &Path) -> Result<Self, RegistryError> {
        let read_dir_err = |source| RegistryError::ReadDir {
            dir: dir.to_path_buf(),
            source,
        };

        let mut clusters = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            let Some(name) = cluster_name(&path) else {
                continue;
            };
            if clusters.contains_key(&name) {
                return Err(RegistryError::DuplicateCluster {
                    name,
                    dir: dir.to_path_buf(),
                });
            }
            let cluster = load_cluster(&path, name)?;
            debug!(
                cluster = cluster.id(),
                title = cluster.title(),
                path = %path.display(),
                "loaded cluster definition"
            );
            clusters.insert(cluster.id.clone(), cluster);
        }
        debug!(count = clusters.len(), dir = %dir.display(), "cluster registry loaded");

        Ok(Self {
            dir: dir.to_path_buf(),
            clusters,
        })
    }

    /// Look up a cluster by name. Unknown names are an error, never a
    /// default.
    pub fn get(&self, name: &str) -> Result<&Cluster, RegistryError> {
        self.clusters
            .get(name)
            .ok_or_else(|| RegistryError::ClusterNotFound {
                name: name.to_string(),
                dir: self.dir.clone(),
            })
    }
}

/// Cluster name for a directory entry, or None when the entry is not a
/// cluster file.
fn cluster_name(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => {}
        _ => return None,
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn load_cluster(path: &Path, id: String) -> Result<Cluster, RegistryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ClusterFile = serde_yaml::from_str(&raw).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Cluster {
        id,
        title: file.v2.metadata.title,
        job: file.v2.job,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RCS: &str = r#"
v2:
  metadata:
    title: "Research Computing"
  job:
    adapter: "slurm"
    cluster: "rcs"
    bin: "/usr/bin"
"#;

    const BARE: &str = r#"
v2:
  metadata:
    title: "Login Only"
"#;

    fn clusters_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_keys_by_file_stem() {
        let dir = clusters_dir(&[("rcs.yml", RCS), ("htc.yaml", RCS)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        assert!(registry.get("rcs").is_ok());
        assert!(registry.get("htc").is_ok());
        assert_eq!(registry.get("rcs").unwrap().title(), "Research Computing");
    }

    #[test]
    fn test_load_ignores_non_yaml_entries() {
        let dir = clusters_dir(&[("rcs.yml", RCS), ("notes.txt", "not yaml")]);
        fs::create_dir(dir.path().join("archived.yml")).unwrap();
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        assert!(registry.get("rcs").is_ok());
        assert!(registry.get("notes").is_err());
        assert!(registry.get("archived").is_err());
    }

    #[test]
    fn test_get_unknown_cluster() {
        let dir = clusters_dir(&[("rcs.yml", RCS)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        let err = registry.get("hpc").unwrap_err();
        assert!(matches!(err, RegistryError::ClusterNotFound { .. }));
        assert!(err.to_string().contains("'hpc'"));
    }

    #[test]
    fn test_get_empty_name() {
        let dir = clusters_dir(&[("rcs.yml", RCS)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        assert!(registry.get("").is_err());
    }

    #[test]
    fn test_load_duplicate_stems() {
        let dir = clusters_dir(&[("rcs.yml", RCS), ("rcs.yaml", RCS)]);
        let err = ClusterRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCluster { .. }));
        assert!(err.to_string().contains("'rcs'"));
    }

    #[test]
    fn test_load_malformed_yaml() {
        let dir = clusters_dir(&[("broken.yml", "v2: [unclosed")]);
        let err = ClusterRegistry::load(dir.path()).unwrap_err();
        match err {
            RegistryError::Parse { path, .. } => {
                assert!(path.ends_with("broken.yml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = ClusterRegistry::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::ReadDir { .. }));
    }

    #[test]
    fn test_job_adapter_slurm() {
        let dir = clusters_dir(&[("rcs.yml", RCS)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        assert!(registry.get("rcs").unwrap().job_adapter().is_ok());
    }

    #[test]
    fn test_job_adapter_without_job_block() {
        let dir = clusters_dir(&[("login.yml", BARE)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        // .err() rather than .unwrap_err(): the Ok side is a trait object
        let err = registry.get("login").unwrap().job_adapter().err().unwrap();
        assert!(matches!(err, RegistryError::NoJobConfig { .. }));
    }

    #[test]
    fn test_job_adapter_unsupported_kind() {
        let pbs = RCS.replace("slurm", "pbspro");
        let dir = clusters_dir(&[("old.yml", &pbs)]);
        let registry = ClusterRegistry::load(dir.path()).unwrap();
        let err = registry.get("old").unwrap().job_adapter().err().unwrap();
        assert!(err.to_string().contains("no usable job adapter"));
    }
}
