//! Slurm backend: drives sbatch, squeue, sacct, and scancel.

use super::{run_checked, run_command, AdapterError, JobAdapter, JobStatus};
use crate::clusters::JobConfig;
use crate::script::JobScript;
use regex::Regex;
use std::path::PathBuf;
use tracing::debug;

/// Talks to a Slurm installation through its command-line tools.
pub struct SlurmAdapter {
    bin: Option<PathBuf>,
    cluster: Option<String>,
}

impl SlurmAdapter {
    pub fn new(job: &JobConfig) -> Self {
        Self {
            bin: job.bin().map(PathBuf::from),
            cluster: job.cluster().map(str::to_string),
        }
    }

    /// Tool name with the configured `bin:` directory prefixed, if any.
    fn tool(&self, name: &str) -> String {
        match &self.bin {
            Some(bin) => bin.join(name).to_string_lossy().into_owned(),
            None => name.to_string(),
        }
    }

    /// Arguments every invocation carries: `-M` when the cluster config
    /// names a scheduler-side cluster.
    fn common_args(&self) -> Vec<String> {
        match &self.cluster {
            Some(cluster) => vec!["-M".to_string(), cluster.clone()],
            None => Vec::new(),
        }
    }

    fn submit_args(&self, script: &JobScript) -> Vec<String> {
        let mut args = self.common_args();
        if let Some(id) = script.accounting_id() {
            args.push("-A".to_string());
            args.push(id.to_string());
        }
        if let Some(path) = script.output_path() {
            args.push("-o".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        if let Some(path) = script.error_path() {
            args.push("-e".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        if let Some(dir) = script.workdir() {
            args.push("-D".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        args
    }
}

impl JobAdapter for SlurmAdapter {
    fn submit(&self, script: &JobScript) -> Result<String, AdapterError> {
        let program = self.tool("sbatch");
        let args = self.submit_args(script);
        debug!(%program, ?args, "submitting job script");

        let result = run_checked(&program, &args, Some(script.content()))?;
        parse_job_id(&result.stdout).ok_or_else(|| AdapterError::JobIdParse {
            output: result.stdout.trim().to_string(),
        })
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, AdapterError> {
        // squeue only knows pending and running jobs
        let program = self.tool("squeue");
        let mut args = self.common_args();
        args.extend(["-j", job_id, "-h", "-o", "%T"].map(String::from));
        debug!(%program, job_id, "querying live job state");

        let result = run_command(&program, &args, None)?;
        if result.return_code == 0 && !result.stdout.trim().is_empty() {
            return Ok(status_from_state(first_state(&result.stdout)));
        }

        // finished jobs only show up in the accounting database
        let program = self.tool("sacct");
        let mut args = self.common_args();
        args.extend(["-j", job_id, "--format=State", "--noheader", "--parsable2"].map(String::from));
        debug!(%program, job_id, "querying accounted job state");

        let result = run_checked(&program, &args, None)?;
        let state = first_state(&result.stdout);
        if state.is_empty() {
            return Err(AdapterError::UnknownJob {
                job_id: job_id.to_string(),
            });
        }
        Ok(status_from_state(state))
    }

    fn delete(&self, job_id: &str) -> Result<(), AdapterError> {
        let program = self.tool("scancel");
        let mut args = self.common_args();
        args.push(job_id.to_string());
        debug!(%program, job_id, "cancelling job");

        run_checked(&program, &args, None)?;
        Ok(())
    }
}

/// Parse the job id out of sbatch's acknowledgement.
///
/// Typical sbatch output: "Submitted batch job 12345"
fn parse_job_id(sbatch_output: &str) -> Option<String> {
    let re = Regex::new(r"Submitted batch job (\d+)").ok()?;
    re.captures(sbatch_output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First state field of squeue/sacct output. Multi-row output (job plus
/// batch step) reports the job's own row first.
fn first_state(stdout: &str) -> &str {
    stdout
        .trim()
        .lines()
        .next()
        .and_then(|line| line.split('|').next())
        .unwrap_or("")
        .trim()
}

/// Fold a Slurm state string into a JobStatus.
fn status_from_state(state: &str) -> JobStatus {
    let state_upper = state.to_uppercase();
    match state_upper.as_str() {
        "PENDING" | "CONFIGURING" => JobStatus::Queued,
        "RUNNING" | "COMPLETING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" | "CANCELLED" | "TIMEOUT" | "NODE_FAIL" | "PREEMPTED" | "OUT_OF_MEMORY" => {
            JobStatus::Failed
        }
        _ => {
            // sacct decorates some states, e.g. "CANCELLED by 1000"
            if state_upper.contains("COMPLETED") {
                JobStatus::Completed
            } else if state_upper.contains("FAILED")
                || state_upper.contains("CANCELLED")
                || state_upper.contains("TIMEOUT")
            {
                JobStatus::Failed
            } else if state_upper.contains("RUNNING") {
                JobStatus::Running
            } else {
                JobStatus::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(cluster: Option<&str>, bin: Option<&str>) -> SlurmAdapter {
        SlurmAdapter {
            bin: bin.map(PathBuf::from),
            cluster: cluster.map(str::to_string),
        }
    }

    /// Fake Slurm bin directory whose squeue and sacct run the given
    /// shell bodies.
    #[cfg(unix)]
    fn stub_tools(squeue: &str, sacct: &str) -> tempfile::TempDir {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        for (name, body) in [("squeue", squeue), ("sacct", sacct)] {
            let path = dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(
            parse_job_id("Submitted batch job 12345"),
            Some("12345".to_string())
        );
        assert_eq!(
            parse_job_id("Submitted batch job 999999999"),
            Some("999999999".to_string())
        );
        assert_eq!(parse_job_id("Invalid output"), None);
    }

    #[test]
    fn test_submit_args_defaults() {
        let script = JobScript::new("echo hi\n")
            .with_output_path("job_output")
            .with_error_path("job_errors");
        assert_eq!(
            adapter(None, None).submit_args(&script),
            vec!["-o", "job_output", "-e", "job_errors"]
        );
    }

    #[test]
    fn test_submit_args_account_workdir_cluster() {
        let script = JobScript::new("echo hi\n")
            .with_accounting_id("proj-9")
            .with_workdir("/scratch/run");
        assert_eq!(
            adapter(Some("rcs"), None).submit_args(&script),
            vec!["-M", "rcs", "-A", "proj-9", "-D", "/scratch/run"]
        );
    }

    #[test]
    fn test_submit_args_bare_script() {
        let script = JobScript::new("echo hi\n");
        assert!(adapter(None, None).submit_args(&script).is_empty());
    }

    #[test]
    fn test_tool_bin_prefix() {
        assert_eq!(
            adapter(None, Some("/opt/slurm/bin")).tool("sbatch"),
            "/opt/slurm/bin/sbatch"
        );
        assert_eq!(adapter(None, None).tool("sbatch"), "sbatch");
    }

    #[cfg(unix)]
    #[test]
    fn test_status_prefers_live_squeue_state() {
        // sacct exits non-zero to prove squeue short-circuits the lookup
        let bin = stub_tools("echo RUNNING", "exit 7");
        let slurm = adapter(None, bin.path().to_str());
        assert_eq!(slurm.status("42").unwrap(), JobStatus::Running);
    }

    #[cfg(unix)]
    #[test]
    fn test_status_falls_back_to_sacct() {
        // squeue forgets a job as soon as it leaves the queue
        let bin = stub_tools("exit 1", "echo 'COMPLETED|'");
        let slurm = adapter(None, bin.path().to_str());
        assert_eq!(slurm.status("42").unwrap(), JobStatus::Completed);
    }

    #[cfg(unix)]
    #[test]
    fn test_status_ignores_empty_squeue_output() {
        // squeue can also exit zero with no rows for a finished job
        let bin = stub_tools("exit 0", "echo 'FAILED|'");
        let slurm = adapter(None, bin.path().to_str());
        assert_eq!(slurm.status("42").unwrap(), JobStatus::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn test_status_unknown_job() {
        // neither the queue nor accounting knows the id
        let bin = stub_tools("exit 1", "exit 0");
        let slurm = adapter(None, bin.path().to_str());
        let err = slurm.status("999").unwrap_err();
        match err {
            AdapterError::UnknownJob { job_id } => assert_eq!(job_id, "999"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_from_state() {
        assert_eq!(status_from_state("PENDING"), JobStatus::Queued);
        assert_eq!(status_from_state("RUNNING"), JobStatus::Running);
        assert_eq!(status_from_state("COMPLETED"), JobStatus::Completed);
        assert_eq!(status_from_state("FAILED"), JobStatus::Failed);
        assert_eq!(status_from_state("CANCELLED by 1000"), JobStatus::Failed);
        assert_eq!(status_from_state("REQUEUED"), JobStatus::Unknown);
    }

    #[test]
    fn test_first_state() {
        assert_eq!(first_state("RUNNING\nRUNNING\n"), "RUNNING");
        assert_eq!(first_state("COMPLETED|\nCOMPLETED|\n"), "COMPLETED");
        assert_eq!(first_state(""), "");
    }
}
