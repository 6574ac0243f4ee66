//! The job adapter seam: the trait every scheduler backend implements,
//! the factory that builds one from a cluster's `job:` block, and the
//! child-process plumbing the backends share.

pub mod slurm;

use crate::clusters::JobConfig;
use crate::script::JobScript;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Operations a cluster's scheduler backend supports.
///
/// Job ids are opaque strings: whatever the scheduler hands back from
/// `submit` is what `status` and `delete` expect to receive.
pub trait JobAdapter {
    /// Submit a job script, returning the scheduler-assigned job id.
    fn submit(&self, script: &JobScript) -> Result<String, AdapterError>;

    /// Query the current state of a previously submitted job.
    fn status(&self, job_id: &str) -> Result<JobStatus, AdapterError>;

    /// Remove a queued or running job from the scheduler.
    fn delete(&self, job_id: &str) -> Result<(), AdapterError>;
}

/// Build the adapter named by a cluster's `job:` block.
pub fn build(job: &JobConfig) -> Result<Box<dyn JobAdapter>, AdapterError> {
    match job.adapter() {
        "slurm" => Ok(Box::new(slurm::SlurmAdapter::new(job))),
        other => Err(AdapterError::Unsupported(other.to_string())),
    }
}

/// Failures signaled by a job adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unsupported job adapter '{0}'")]
    Unsupported(String),

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("could not parse a job id from sbatch output: {output:?}")]
    JobIdParse { output: String },

    #[error("no record of job {job_id}")]
    UnknownJob { job_id: String },
}

/// Job state as reported by a scheduler, folded to five cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Captured output of a finished scheduler command.
#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
}

/// Run a scheduler command to completion, optionally feeding it `stdin`.
///
/// Only spawn and I/O failures are errors here; a non-zero exit is not,
/// since some lookups legitimately come back non-zero. Callers that treat
/// any failure as fatal use [`run_checked`].
pub(crate) fn run_command(
    program: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<CommandResult, AdapterError> {
    let spawn_err = |source| AdapterError::Spawn {
        program: program.to_string(),
        source,
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(spawn_err)?;
    if let Some(input) = stdin {
        // take() the handle so it closes once written; the child would
        // otherwise wait forever for more input
        if let Some(mut handle) = child.stdin.take() {
            // a child that rejects its arguments exits without draining
            // stdin; its exit code and stderr are still collected below
            if let Err(err) = handle.write_all(input.as_bytes()) {
                if err.kind() != ErrorKind::BrokenPipe {
                    return Err(spawn_err(err));
                }
            }
        }
    }
    let output = child.wait_with_output().map_err(spawn_err)?;

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        return_code: output.status.code().unwrap_or(-1),
    })
}

/// Like [`run_command`], but a non-zero exit becomes an error carrying the
/// command's stderr.
pub(crate) fn run_checked(
    program: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<CommandResult, AdapterError> {
    let result = run_command(program, args, stdin)?;
    if result.return_code != 0 {
        return Err(AdapterError::CommandFailed {
            program: program.to_string(),
            code: result.return_code,
            stderr: result.stderr.trim().to_string(),
        });
    }
    Ok(result)
}
