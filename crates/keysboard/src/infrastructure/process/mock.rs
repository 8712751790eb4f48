//! Recording spawner for tests.
//!
//! Records each command instead of running it, so a test can assert which
//! shell actions fired and in what order without touching the system.

use std::sync::Mutex;

use super::{CommandSpawner, SpawnError};

#[derive(Default)]
pub struct RecordingSpawner {
    /// Commands passed to `spawn_detached`, in call order.
    pub commands: Mutex<Vec<String>>,
    /// When `true`, every call is recorded and then fails.
    pub should_fail: bool,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the recorded commands.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandSpawner for RecordingSpawner {
    fn spawn_detached(&self, command: &str) -> Result<(), SpawnError> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.should_fail {
            return Err(SpawnError::Rejected(command.to_string()));
        }
        Ok(())
    }
}
