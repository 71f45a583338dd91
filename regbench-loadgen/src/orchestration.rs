//! Starting and stopping the benchmark target around a run.
//!
//! Both hooks are plain shell commands, for instance `podman compose up -d` and
//! `podman compose down -v`. The stop hook runs after the benchmark finishes, when the target does
//! not become ready, and when the run is interrupted by a signal.

use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Errors running an orchestration command.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The shell could not be spawned.
    #[error("failed to run `{command}`")]
    Spawn {
        /// The command line.
        command: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The command exited unsuccessfully.
    #[error("`{command}` failed with {status}")]
    Failed {
        /// The command line.
        command: String,
        /// Exit status of the shell.
        status: ExitStatus,
    },
}

/// Shell commands controlling the lifecycle of the benchmark target.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Orchestration {
    /// Command starting the target before the readiness probe.
    pub up: Option<String>,
    /// Command stopping the target at the end of the run.
    pub down: Option<String>,
}

impl Orchestration {
    /// Runs the `up` command, if configured.
    pub async fn start(&self) -> Result<(), OrchestrationError> {
        match &self.up {
            Some(command) => run_shell(command).await,
            None => Ok(()),
        }
    }

    /// Runs the `down` command, if configured.
    pub async fn stop(&self) -> Result<(), OrchestrationError> {
        match &self.down {
            Some(command) => run_shell(command).await,
            None => Ok(()),
        }
    }
}

async fn run_shell(command: &str) -> Result<(), OrchestrationError> {
    tracing::info!(command, "running orchestration command");

    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .map_err(|source| OrchestrationError::Spawn {
            command: command.to_owned(),
            source,
        })?;

    if !status.success() {
        return Err(OrchestrationError::Failed {
            command: command.to_owned(),
            status,
        });
    }

    Ok(())
}
