//! Session Supervisor: one thread per configured device.
//!
//! The supervisor reads the config once, starts a [`DeviceSession`] on a
//! named OS thread for every device identifier, and hands the join handles
//! back without waiting.  It never restarts a session; each one runs until it
//! reaches `Stopped` on its own.
//!
//! A device whose thread cannot be spawned is logged and skipped; the other
//! devices still start.

use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{error, info};

use crate::{
    application::run_session::{DeviceSession, Engine, SessionReport},
    infrastructure::storage::ConfigError,
};

/// Errors that stop the supervisor from starting anything at all.
#[derive(Debug, Error)]
pub enum SuperviseError {
    #[error("could not read config: {0}")]
    Config(#[from] ConfigError),
    #[error("no devices are configured")]
    NoDevices,
}

/// A running session thread.
pub struct SessionHandle {
    pub device_id: String,
    pub thread: JoinHandle<SessionReport>,
}

pub struct Supervisor {
    engine: Engine,
}

impl Supervisor {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Starts one session per device in the current config.
    ///
    /// # Errors
    ///
    /// Returns [`SuperviseError`] if the config cannot be read or lists no
    /// devices.  Per-device start failures are only logged.
    pub fn run_all(&self) -> Result<Vec<SessionHandle>, SuperviseError> {
        let snapshot = self.engine.config.snapshot()?;
        if snapshot.devices.is_empty() {
            return Err(SuperviseError::NoDevices);
        }

        let mut handles = Vec::with_capacity(snapshot.devices.len());
        for device_id in snapshot.devices.keys() {
            let session = DeviceSession::new(self.engine.clone(), device_id);
            let thread_name = format!("session {}", self.engine.settings.shorten(device_id));
            match thread::Builder::new()
                .name(thread_name)
                .spawn(move || session.run())
            {
                Ok(thread) => handles.push(SessionHandle {
                    device_id: device_id.to_string(),
                    thread,
                }),
                Err(e) => error!("device [ {device_id} ] has failed to start, skipping: {e}"),
            }
        }
        info!("started {} of {} sessions", handles.len(), snapshot.devices.len());
        Ok(handles)
    }
}

/// Blocks until every session thread has ended and returns their reports.
///
/// A session thread that panicked is logged and left out.
pub fn join_all(handles: Vec<SessionHandle>) -> Vec<SessionReport> {
    handles
        .into_iter()
        .filter_map(|handle| match handle.thread.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("device [ {} ] session panicked", handle.device_id);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keysboard_core::{ConfigDocument, DeviceRecord, EngineSettings};
    use tokio::runtime::Runtime;

    use super::*;
    use crate::{
        application::run_session::{SessionError, StopReason},
        infrastructure::{
            input_device::mock::{MockDeviceOpener, MockInputDevice},
            input_emulation::mock::MockKeyboardOpener,
            process::mock::RecordingSpawner,
            storage::MemoryConfigStore,
        },
    };

    fn engine(runtime: &Runtime, document: ConfigDocument, opener: MockDeviceOpener) -> Engine {
        Engine {
            config: Arc::new(MemoryConfigStore::new(document)),
            devices: Arc::new(opener),
            keyboards: Arc::new(MockKeyboardOpener::new()),
            spawner: Arc::new(RecordingSpawner::new()),
            runtime: runtime.handle().clone(),
            settings: EngineSettings::default(),
        }
    }

    #[test]
    fn test_empty_config_is_an_error() {
        let runtime = Runtime::new().unwrap();
        let supervisor = Supervisor::new(engine(
            &runtime,
            ConfigDocument::default(),
            MockDeviceOpener::new(),
        ));

        assert!(matches!(supervisor.run_all(), Err(SuperviseError::NoDevices)));
    }

    #[test]
    fn test_one_failing_device_does_not_stop_the_others() {
        // Arrange: "a" is busy, "b" is fine
        let runtime = Runtime::new().unwrap();
        let document = ConfigDocument {
            devices: [
                ("a", DeviceRecord::starter()),
                ("b", DeviceRecord::starter()),
            ]
            .into_iter()
            .collect(),
            backup: None,
        };
        let opener = MockDeviceOpener::new()
            .with_busy_device("a")
            .with_device("b", MockInputDevice::new().key_down("KEY_ESC"));
        let supervisor = Supervisor::new(engine(&runtime, document, opener));

        // Act
        let reports = join_all(supervisor.run_all().unwrap());

        // Assert
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].device_id, "a");
        assert!(matches!(
            reports[0].stop_reason,
            StopReason::Failed(SessionError::DeviceAlreadyGrabbed(_))
        ));
        assert!(matches!(reports[1].stop_reason, StopReason::ExitRequested));
    }
}
