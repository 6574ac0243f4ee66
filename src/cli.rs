//! CLI entry point and command definitions.

use crate::adapter::JobAdapter;
use crate::clusters::ClusterRegistry;
use crate::config;
use crate::script::JobScript;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

/// jobctl - manage batch jobs on configured clusters.
#[derive(Parser)]
#[command(name = "jobctl")]
#[command(version = "0.1.0")]
#[command(about = "Manage batch jobs on configured clusters")]
pub struct Cli {
    /// Directory of cluster definition files
    #[arg(short = 'c', long, global = true, value_name = "DIR")]
    pub clusters_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job script to a cluster
    Submit(SubmitArgs),
    /// Show the current state of a job
    Status(StatusArgs),
    /// Delete a queued or running job
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Path to the job script
    pub script: PathBuf,
    /// Cluster the job is submitted to
    pub cluster: String,
    /// Accounting id the job is charged to
    #[arg(long, value_name = "ID")]
    pub account: Option<String>,
    /// File the job's standard output is written to
    #[arg(short, long, value_name = "PATH", default_value = config::DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,
    /// File the job's standard error is written to
    #[arg(short, long, value_name = "PATH", default_value = config::DEFAULT_ERROR_PATH)]
    pub error: PathBuf,
    /// Directory the job runs in
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Job id printed at submission
    pub job_id: String,
    /// Cluster the job was submitted to
    pub cluster: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Job id printed at submission
    pub job_id: String,
    /// Cluster the job was submitted to
    pub cluster: String,
}

/// Handle the submit command.
pub fn handle_submit(registry: &ClusterRegistry, args: &SubmitArgs) -> Result<String> {
    let adapter = job_adapter(registry, &args.cluster)?;
    run_submit(adapter.as_ref(), args)
}

/// Handle the status command.
pub fn handle_status(registry: &ClusterRegistry, args: &StatusArgs) -> Result<String> {
    let adapter = job_adapter(registry, &args.cluster)?;
    run_status(adapter.as_ref(), &args.job_id)
}

/// Handle the delete command.
pub fn handle_delete(registry: &ClusterRegistry, args: &DeleteArgs) -> Result<String> {
    let adapter = job_adapter(registry, &args.cluster)?;
    run_delete(adapter.as_ref(), &args.job_id)
}

/// Resolve a cluster by name and build its scheduler adapter.
fn job_adapter(registry: &ClusterRegistry, name: &str) -> Result<Box<dyn JobAdapter>> {
    let cluster = registry.get(name)?;
    Ok(cluster.job_adapter()?)
}

fn run_submit(adapter: &dyn JobAdapter, args: &SubmitArgs) -> Result<String> {
    let content = fs::read_to_string(&args.script)
        .with_context(|| format!("could not read job script {}", args.script.display()))?;

    let mut script = JobScript::new(content)
        .with_output_path(&args.output)
        .with_error_path(&args.error);
    if let Some(id) = args.account.as_deref() {
        script = script.with_accounting_id(id);
    }
    if let Some(dir) = args.workdir.as_deref() {
        script = script.with_workdir(dir);
    }

    let job_id = adapter
        .submit(&script)
        .with_context(|| format!("could not submit {}", args.script.display()))?;
    Ok(job_id)
}

fn run_status(adapter: &dyn JobAdapter, job_id: &str) -> Result<String> {
    let status = adapter
        .status(job_id)
        .with_context(|| format!("could not fetch the status of job {job_id}"))?;
    Ok(status.to_string())
}

fn run_delete(adapter: &dyn JobAdapter, job_id: &str) -> Result<String> {
    adapter
        .delete(job_id)
        .with_context(|| format!("could not delete job {job_id}"))?;
    Ok(format!("Deleted job {job_id}"))
}
