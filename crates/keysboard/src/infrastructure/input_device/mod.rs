//! Physical input device boundary.
//!
//! On Linux a device is an evdev node (`/dev/input/eventN` or a stable
//! `/dev/input/by-id/...` link).  keysboard opens it and takes an exclusive
//! *grab* (`EVIOCGRAB`), so its key presses stop reaching the desktop and are
//! only seen by keysboard.
//!
//! # Blocking reads
//!
//! [`InputDevice::next_transition`] blocks the calling thread until the next
//! key transition arrives.  Each device session runs on its own thread, so a
//! blocked read never stalls another device.
//!
//! # Testability
//!
//! The [`DeviceOpener`] and [`InputDevice`] traits let tests drive a session
//! with scripted key presses ([`mock::MockInputDevice`]) instead of hardware.

use keysboard_core::KeyCodes;
use thiserror::Error;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

/// Whether a key went down, came up, or is auto-repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
    Repeat,
}

impl KeyState {
    /// Maps an evdev key event value (0, 1, 2) to a state.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Released),
            1 => Some(KeyState::Pressed),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }
}

/// One key transition read from a physical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransition {
    /// Identifier(s) of the key, e.g. `KEY_A`.
    pub codes: KeyCodes,
    pub state: KeyState,
}

impl KeyTransition {
    /// A key-down transition for a single key.
    pub fn down(code: &str) -> Self {
        Self {
            codes: KeyCodes::from(code),
            state: KeyState::Pressed,
        }
    }

    /// A key-up transition for a single key.
    pub fn up(code: &str) -> Self {
        Self {
            codes: KeyCodes::from(code),
            state: KeyState::Released,
        }
    }

    pub fn is_key_down(&self) -> bool {
        self.state == KeyState::Pressed
    }
}

/// Error type for physical device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device node could not be opened.
    #[error("device {device} is unavailable: {source}")]
    Unavailable {
        device: String,
        #[source]
        source: std::io::Error,
    },
    /// Another process (or another session) already holds the grab.
    #[error("device {device} is already grabbed: {source}")]
    AlreadyGrabbed {
        device: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading the next event failed.
    #[error("failed to read device events: {0}")]
    Read(#[source] std::io::Error),
    /// The event source ended (device unplugged or handle closed).
    #[error("device disconnected")]
    Disconnected,
    /// Releasing the grab failed.
    #[error("failed to release device grab: {0}")]
    Ungrab(#[source] std::io::Error),
}

/// An opened, exclusively grabbed physical device.
pub trait InputDevice: Send {
    /// Blocks until the next key transition.
    ///
    /// Non-key events (sync reports, LEDs, relative axes) are skipped.
    fn next_transition(&mut self) -> Result<KeyTransition, DeviceError>;

    /// Releases the exclusive grab.  Callers treat failure as best-effort.
    fn ungrab(&mut self) -> Result<(), DeviceError>;
}

/// Opens devices by identifier.
pub trait DeviceOpener: Send + Sync {
    /// Opens `device_id` and takes an exclusive grab on it.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Unavailable`] if the node cannot be opened and
    /// [`DeviceError::AlreadyGrabbed`] if the grab is refused.
    fn open(&self, device_id: &str) -> Result<Box<dyn InputDevice>, DeviceError>;
}
