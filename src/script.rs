//! The job script value handed to a cluster's job adapter.

use std::path::{Path, PathBuf};

/// Describes one job submission: the script body plus optional
/// scheduler-facing settings. Built once per submission, read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct JobScript {
    content: String,
    accounting_id: Option<String>,
    output_path: Option<PathBuf>,
    error_path: Option<PathBuf>,
    workdir: Option<PathBuf>,
}

impl JobScript {
    /// Create a script from its body text. All optional settings start
    /// absent, leaving the adapter's own defaults in force.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            accounting_id: None,
            output_path: None,
            error_path: None,
            workdir: None,
        }
    }

    /// Accounting/billing identifier the job is charged to.
    pub fn with_accounting_id(mut self, id: impl Into<String>) -> Self {
        self.accounting_id = Some(id.into());
        self
    }

    /// File the job's standard output is written to.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// File the job's standard error is written to.
    pub fn with_error_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_path = Some(path.into());
        self
    }

    /// Directory the job runs in.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn accounting_id(&self) -> Option<&str> {
        self.accounting_id.as_deref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn error_path(&self) -> Option<&Path> {
        self.error_path.as_deref()
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }
}
