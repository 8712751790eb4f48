//! Linux evdev input devices.
//!
//! # How grabbing works (for beginners)
//!
//! Every keyboard on Linux appears as a character device under
//! `/dev/input/`.  Any process with read access can read its events, but the
//! events are *also* delivered to the desktop.  The `EVIOCGRAB` ioctl asks the
//! kernel to deliver the device's events to this file descriptor only.  Only
//! one grab can be held at a time; a second grab attempt fails with `EBUSY`.
//!
//! Closing the file descriptor releases the grab, so dropping
//! [`EvdevDevice`] is enough even if the explicit [`InputDevice::ungrab`]
//! call fails.
//!
//! # Permissions
//!
//! The user must be able to read the device node, normally by being in the
//! `input` group:
//!
//! ```text
//! sudo usermod -aG input $USER
//! ```

use std::collections::VecDeque;

use evdev::{Device, InputEventKind};
use keysboard_core::KeyCodes;
use tracing::debug;

use super::{DeviceError, DeviceOpener, InputDevice, KeyState, KeyTransition};

/// An evdev device node opened and grabbed by keysboard.
pub struct EvdevDevice {
    device: Device,
    /// Transitions from the last `fetch_events` batch not yet handed out.
    pending: VecDeque<KeyTransition>,
}

impl InputDevice for EvdevDevice {
    fn next_transition(&mut self) -> Result<KeyTransition, DeviceError> {
        loop {
            if let Some(transition) = self.pending.pop_front() {
                return Ok(transition);
            }
            // Blocks until the kernel delivers the next SYN_REPORT batch.
            let events = self.device.fetch_events().map_err(DeviceError::Read)?;
            for event in events {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };
                if let Some(state) = KeyState::from_value(event.value()) {
                    self.pending.push_back(KeyTransition {
                        codes: KeyCodes::with_aliases(format!("{key:?}"), key.code()),
                        state,
                    });
                }
            }
        }
    }

    fn ungrab(&mut self) -> Result<(), DeviceError> {
        self.device.ungrab().map_err(DeviceError::Ungrab)
    }
}

/// Opens evdev nodes by path.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevOpener;

impl DeviceOpener for EvdevOpener {
    fn open(&self, device_id: &str) -> Result<Box<dyn InputDevice>, DeviceError> {
        let mut device = Device::open(device_id).map_err(|source| DeviceError::Unavailable {
            device: device_id.to_string(),
            source,
        })?;
        device.grab().map_err(|source| DeviceError::AlreadyGrabbed {
            device: device_id.to_string(),
            source,
        })?;
        debug!(
            "grabbed {device_id} ({})",
            device.name().unwrap_or("unnamed device")
        );
        Ok(Box::new(EvdevDevice {
            device,
            pending: VecDeque::new(),
        }))
    }
}
