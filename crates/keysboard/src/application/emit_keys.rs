//! Synthetic Emitter: turns keyboard actions into virtual key events.
//!
//! The emitter sits at the application layer and delegates to a
//! [`VirtualKeyboard`] trait object for the actual event injection.  The
//! platform implementation (uinput) lives in the infrastructure layer.
//!
//! # Timing
//!
//! A timed press (key down, wait, key up) and a key sequence both take real
//! time.  They run as detached tasks on the tokio runtime so the session's
//! read loop is never blocked by them.  A bare state set is instantaneous and
//! is emitted on the calling thread, which keeps it ordered with respect to
//! the surrounding actions of a multi action.
//!
//! Detached tasks are never joined or cancelled; two rapid key presses may
//! produce interleaved synthetic events.

use std::{sync::Arc, time::Duration};

use keysboard_core::{KeyOp, KeyboardAction};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::warn;

/// Error type for virtual keyboard operations.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("invalid key code: {0}")]
    InvalidKeyCode(String),
}

/// A virtual output device able to press and release keys.
///
/// Each implementation flushes after every state change.
pub trait VirtualKeyboard: Send + Sync {
    /// Sets `key` to pressed (`true`) or released (`false`).
    fn set_key_state(&self, key: &str, pressed: bool) -> Result<(), EmulationError>;
}

/// Creates a virtual keyboard for a session.  Dropping the returned handle
/// closes the device.
pub trait VirtualKeyboardOpener: Send + Sync {
    fn open(&self, name: &str) -> Result<Arc<dyn VirtualKeyboard>, EmulationError>;
}

/// Presses `key`, waits `hold`, releases it.
///
/// # Errors
///
/// Returns the first [`EmulationError`] from the keyboard.  The release is
/// attempted even when the press failed, so a key is never left held down;
/// a second failure is only logged.
pub async fn hold_key(
    keyboard: &dyn VirtualKeyboard,
    key: &str,
    hold: Duration,
) -> Result<(), EmulationError> {
    let pressed = keyboard.set_key_state(key, true);
    if pressed.is_ok() {
        tokio::time::sleep(hold).await;
    }
    let released = keyboard.set_key_state(key, false);
    match (pressed, released) {
        (Err(press), Err(release)) => {
            warn!("releasing {key} after a failed press also failed: {release}");
            Err(press)
        }
        (pressed, released) => pressed.and(released),
    }
}

async fn run_op(
    keyboard: &dyn VirtualKeyboard,
    op: &KeyOp,
    default_hold: Duration,
) -> Result<(), EmulationError> {
    match op {
        KeyOp::Press { key, hold } => hold_key(keyboard, key, hold.unwrap_or(default_hold)).await,
        KeyOp::Set { key, pressed } => keyboard.set_key_state(key, *pressed),
    }
}

/// Runs a whole keyboard action to completion.
///
/// Sequence steps run strictly in order; a step's `delay` is slept before
/// the step.  The first failing step ends the sequence.
///
/// # Errors
///
/// Returns the first [`EmulationError`] encountered.
pub async fn run_keyboard_action(
    keyboard: &dyn VirtualKeyboard,
    action: &KeyboardAction,
    default_hold: Duration,
) -> Result<(), EmulationError> {
    match action {
        KeyboardAction::Single(op) => run_op(keyboard, op, default_hold).await,
        KeyboardAction::Sequence(steps) => {
            for step in steps {
                if let Some(delay) = step.delay {
                    tokio::time::sleep(delay).await;
                }
                run_op(keyboard, &step.op, default_hold).await?;
            }
            Ok(())
        }
    }
}

/// One session's synthetic keyboard.
#[derive(Clone)]
pub struct SyntheticEmitter {
    keyboard: Arc<dyn VirtualKeyboard>,
    runtime: Handle,
    default_hold: Duration,
    /// Device short name used in log lines from detached tasks.
    device_name: String,
}

impl SyntheticEmitter {
    pub fn new(
        keyboard: Arc<dyn VirtualKeyboard>,
        runtime: Handle,
        default_hold: Duration,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            keyboard,
            runtime,
            default_hold,
            device_name: device_name.into(),
        }
    }

    /// Emits one state change immediately.
    pub fn set_state(&self, key: &str, pressed: bool) -> Result<(), EmulationError> {
        self.keyboard.set_key_state(key, pressed)
    }

    /// Performs `action`.
    ///
    /// A single state set is emitted before this returns.  Anything timed is
    /// started as a detached task and this returns at once; failures inside
    /// the task are logged there.
    ///
    /// # Errors
    ///
    /// Returns [`EmulationError`] only for the immediate state-set case.
    pub fn dispatch(&self, action: &KeyboardAction) -> Result<(), EmulationError> {
        match action {
            KeyboardAction::Single(KeyOp::Set { key, pressed }) => self.set_state(key, *pressed),
            timed => {
                self.spawn(timed.clone());
                Ok(())
            }
        }
    }

    fn spawn(&self, action: KeyboardAction) {
        let keyboard = Arc::clone(&self.keyboard);
        let default_hold = self.default_hold;
        let device_name = self.device_name.clone();
        self.runtime.spawn(async move {
            if let Err(e) = run_keyboard_action(keyboard.as_ref(), &action, default_hold).await {
                warn!("[ {device_name} ] keyboard action failed: {e}");
            }
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
