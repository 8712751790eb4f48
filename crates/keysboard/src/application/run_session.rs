//! Device Session: the lifecycle of one grabbed device.
//!
//! # State machine (for beginners)
//!
//! ```text
//!   Starting ──► Running ──► ExitRequested ──┐
//!      │            │                        │
//!      │            ├──► DeviceError ────────┤
//!      │            └──► (removed from config)┤
//!      └──► (not configured / unavailable / already grabbed)
//!                                            ▼
//!                                         Stopped
//! ```
//!
//! - `Starting`: the device must be in a fresh config snapshot; then it is
//!   opened and grabbed, and a virtual keyboard is created for it.
//! - `Running`: every key-down reloads the config, checks the exit keys, and
//!   dispatches each matching keybind of the current layer.  Key-up and
//!   auto-repeat transitions are ignored.  If the reload fails, the key press
//!   is still checked against the exit key and `exit_cmd` of the last record
//!   that loaded, so a broken file never traps the user in a grab.
//! - `ExitRequested`: the device's `exit_cmd` (if any) is started detached.
//! - `Stopped`: the grab is released (a failure is only logged) and the
//!   virtual keyboard is dropped.
//!
//! # Current layer
//!
//! The current layer is a plain `String` owned by the session.  It starts as
//! the device's default layer.  A layer switch returned by the executor
//! replaces it.  If a reload shows the layer was deleted, the session falls
//! back to the default layer and skips dispatch for that key press.
//!
//! Nothing here ever panics or propagates into another session; every failure
//! becomes a [`StopReason`] or a log line.

use std::sync::Arc;

use keysboard_core::{
    default_layer, domain::config::DEFAULT_FIRST_LAYER, resolve, AliasGuard, DeviceRecord,
    EngineSettings, KeyCodes,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::{
    application::{
        emit_keys::{EmulationError, SyntheticEmitter, VirtualKeyboardOpener},
        execute_action::{ActionExecutor, DispatchContext, DispatchError},
    },
    infrastructure::{
        input_device::{DeviceError, DeviceOpener, InputDevice, KeyTransition},
        process::CommandSpawner,
        storage::{ConfigError, ConfigSource},
    },
};

/// Why a session could not start or had to stop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("device is not in the config")]
    DeviceNotConfigured,
    #[error("invalid device: {0}")]
    DeviceUnavailable(#[source] DeviceError),
    #[error("device is already grabbed: {0}")]
    DeviceAlreadyGrabbed(#[source] DeviceError),
    #[error("device hit an error: {0}")]
    DeviceRuntimeError(#[source] DeviceError),
    #[error("could not read config: {0}")]
    Config(#[from] ConfigError),
    #[error("could not create a virtual keyboard: {0}")]
    Emulator(#[from] EmulationError),
}

/// How a session reached `Stopped`.
#[derive(Debug)]
pub enum StopReason {
    /// The device's exit key or the universal exit key was pressed.
    ExitRequested,
    /// A reloaded config no longer lists the device.
    RemovedFromConfig,
    /// The session could not start, or reading the device failed.
    Failed(SessionError),
}

/// Summary returned when a session thread ends.
#[derive(Debug)]
pub struct SessionReport {
    pub device_id: String,
    pub stop_reason: StopReason,
    /// Current layer at the time the session stopped (`None` if it never ran).
    pub final_layer: Option<String>,
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct Engine {
    pub config: Arc<dyn ConfigSource>,
    pub devices: Arc<dyn DeviceOpener>,
    pub keyboards: Arc<dyn VirtualKeyboardOpener>,
    pub spawner: Arc<dyn CommandSpawner>,
    /// Runtime for detached keyboard tasks.
    pub runtime: Handle,
    pub settings: EngineSettings,
}

/// One device's session.  Consumed by [`run`](Self::run).
pub struct DeviceSession {
    engine: Engine,
    device_id: String,
    /// Name used in log lines; refreshed from the nickname on every reload.
    name: String,
    /// Exit key and command from the last record that loaded.
    last_exit: DeviceRecord,
}

impl DeviceSession {
    pub fn new(engine: Engine, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let name = engine.settings.shorten(&device_id);
        Self {
            engine,
            device_id,
            name,
            last_exit: DeviceRecord::default(),
        }
    }

    /// Runs the session to `Stopped` on the calling thread.
    pub fn run(mut self) -> SessionReport {
        // ── Starting ──────────────────────────────────────────────────────────
        let (mut device, executor, mut current_layer) = match self.start() {
            Ok(started) => started,
            Err(e) => {
                error!("device [ {} ] {e}, skipping", self.name);
                return self.report(StopReason::Failed(e), None);
            }
        };
        info!("device [ {} ] started on layer [ {current_layer} ]", self.name);

        // ── Running ───────────────────────────────────────────────────────────
        let stop_reason = self.read_loop(device.as_mut(), &executor, &mut current_layer);

        // ── Stopped ───────────────────────────────────────────────────────────
        if let Err(e) = device.ungrab() {
            debug!("device [ {} ] ungrab failed (ignored): {e}", self.name);
        }
        drop(executor);
        info!("device [ {} ] stopped", self.name);
        self.report(stop_reason, Some(current_layer))
    }

    fn start(&mut self) -> Result<(Box<dyn InputDevice>, ActionExecutor, String), SessionError> {
        let snapshot = self.engine.config.snapshot()?;
        let record = snapshot
            .device(&self.device_id)
            .ok_or(SessionError::DeviceNotConfigured)?;
        self.name = self.engine.settings.short_name(&self.device_id, Some(record));
        self.last_exit = exit_only(record);

        let mut device = self
            .engine
            .devices
            .open(&self.device_id)
            .map_err(|e| match e {
                DeviceError::AlreadyGrabbed { .. } => SessionError::DeviceAlreadyGrabbed(e),
                other => SessionError::DeviceUnavailable(other),
            })?;

        let keyboard = match self.engine.keyboards.open(&format!("keysboard {}", self.name)) {
            Ok(keyboard) => keyboard,
            Err(e) => {
                if let Err(ungrab) = device.ungrab() {
                    debug!("device [ {} ] ungrab failed (ignored): {ungrab}", self.name);
                }
                return Err(e.into());
            }
        };
        let emitter = SyntheticEmitter::new(
            keyboard,
            self.engine.runtime.clone(),
            self.engine.settings.default_hold_time,
            self.name.clone(),
        );
        let executor = ActionExecutor::new(Arc::clone(&self.engine.spawner), emitter);

        Ok((device, executor, initial_layer(record)))
    }

    fn read_loop(
        &mut self,
        device: &mut dyn InputDevice,
        executor: &ActionExecutor,
        current_layer: &mut String,
    ) -> StopReason {
        loop {
            let transition = match device.next_transition() {
                Ok(transition) => transition,
                Err(e) => {
                    error!("device [ {} ] hit an error, stopping: {e}", self.name);
                    return StopReason::Failed(SessionError::DeviceRuntimeError(e));
                }
            };
            if !transition.is_key_down() {
                continue;
            }

            let snapshot = match self.engine.config.snapshot() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    if self.exit_if_requested(&transition.codes, &self.last_exit) {
                        return StopReason::ExitRequested;
                    }
                    warn!("device [ {} ] ignoring key press: {e}", self.name);
                    continue;
                }
            };
            let Some(record) = snapshot.device(&self.device_id) else {
                warn!("device [ {} ] is no longer in the config, stopping", self.name);
                return StopReason::RemovedFromConfig;
            };
            self.name = self.engine.settings.short_name(&self.device_id, Some(record));
            self.last_exit = exit_only(record);

            if self.handle_key_down(&transition, record, executor, current_layer) {
                return StopReason::ExitRequested;
            }
        }
    }

    /// Handles one key-down against a fresh record.  Returns `true` when the
    /// session must exit.
    fn handle_key_down(
        &self,
        transition: &KeyTransition,
        record: &DeviceRecord,
        executor: &ActionExecutor,
        current_layer: &mut String,
    ) -> bool {
        let settings = &self.engine.settings;
        let codes = &transition.codes;
        if settings.print_key_codes_for(record) {
            info!("device [ {} ] key: {codes}", self.name);
        } else {
            debug!("device [ {} ] key: {codes}", self.name);
        }

        if self.exit_if_requested(codes, record) {
            return true;
        }

        let resolution = match resolve(record, current_layer) {
            Ok(resolution) => resolution,
            Err(e) => {
                let fallback = initial_layer(record);
                warn!(
                    "device [ {} ] {e}; falling back to layer [ {fallback} ]",
                    self.name
                );
                *current_layer = fallback;
                return false;
            }
        };

        for (key, action) in resolution.keybinds.matching(codes) {
            debug!("device [ {} ] [ {current_layer} ] {key} matched", self.name);
            let next = {
                let ctx = DispatchContext {
                    device_name: &self.name,
                    current_layer: current_layer.as_str(),
                    aliases: &record.aliases,
                    layers: resolution.layers,
                    print_actions: settings.print_actions_for(record),
                };
                executor.execute(action, &ctx, &mut AliasGuard::new())
            };
            if let Some(next) = next {
                *current_layer = next;
            }
        }
        false
    }

    /// Starts `exit_cmd` and returns `true` if `codes` is an exit key.
    fn exit_if_requested(&self, codes: &KeyCodes, record: &DeviceRecord) -> bool {
        if !self.engine.settings.is_exit_key(codes, record) {
            return false;
        }
        info!("device [ {} ] exit key pressed, exiting", self.name);
        if let Some(command) = &record.exit_command {
            if let Err(e) = self.engine.spawner.spawn_detached(command) {
                let e = DispatchError::ActionSpawnFailure(e);
                warn!("device [ {} ] exit command: {e}", self.name);
            }
        }
        true
    }

    fn report(self, stop_reason: StopReason, final_layer: Option<String>) -> SessionReport {
        SessionReport {
            device_id: self.device_id,
            stop_reason,
            final_layer,
        }
    }
}

fn exit_only(record: &DeviceRecord) -> DeviceRecord {
    DeviceRecord {
        exit_key: record.exit_key.clone(),
        exit_command: record.exit_command.clone(),
        ..DeviceRecord::default()
    }
}

fn initial_layer(record: &DeviceRecord) -> String {
    default_layer(record)
        .unwrap_or(DEFAULT_FIRST_LAYER)
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
