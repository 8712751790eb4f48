//! Process spawn boundary for shell actions.
//!
//! Shell actions run `sh -c <command>` in a new process group, so a Ctrl-C
//! in keysboard's terminal is not delivered to commands it started.  The
//! caller never waits: the child is reaped on a blocking-pool thread of the
//! tokio runtime and its exit status is logged at `debug`.

use std::{
    os::unix::process::CommandExt,
    process::{Command, Stdio},
};

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub mod mock;

/// Error type for process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawner rejected `{0}`")]
    Rejected(String),
}

/// Starts commands without waiting for them.
#[cfg_attr(test, mockall::automock)]
pub trait CommandSpawner: Send + Sync {
    /// Starts `command` detached from the caller.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the process could not be started.  Failures
    /// of the command itself are only logged.
    fn spawn_detached(&self, command: &str) -> Result<(), SpawnError>;
}

/// Spawns commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    runtime: Handle,
}

impl ShellSpawner {
    /// Creates a spawner that reaps children on `runtime`'s blocking pool.
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl CommandSpawner for ShellSpawner {
    fn spawn_detached(&self, command: &str) -> Result<(), SpawnError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| SpawnError::Io {
                command: command.to_string(),
                source,
            })?;

        let command = command.to_string();
        self.runtime.spawn_blocking(move || match child.wait() {
            Ok(status) => debug!("`{command}` finished: {status}"),
            Err(e) => warn!("could not wait for `{command}`: {e}"),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_spawner_starts_true() {
        // Arrange
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let spawner = ShellSpawner::new(runtime.handle().clone());

        // Act
        let result = spawner.spawn_detached("true");

        // Assert
        assert!(result.is_ok());
    }

    #[test]
    fn test_shell_spawner_does_not_wait_for_the_command() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let spawner = ShellSpawner::new(runtime.handle().clone());
        let started = std::time::Instant::now();

        spawner.spawn_detached("sleep 2").unwrap();

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
