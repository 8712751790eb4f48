//! Scripted input devices for unit and integration tests.
//!
//! # How scripting works (for beginners)
//!
//! A [`MockInputDevice`] holds a queue of steps.  Each call to
//! `next_transition` pops steps until it finds a key transition to return:
//!
//! - a *transition* step is returned to the session as if a key were pressed;
//! - a *hook* step is a closure run in between, e.g. to edit the config
//!   store between two key presses;
//! - when the queue is empty the device reports `Disconnected`, which ends
//!   the session exactly like an unplugged keyboard.
//!
//! ```ignore
//! let device = MockInputDevice::new()
//!     .key_down("KEY_1")
//!     .then(move || store.replace(next_config))
//!     .key_down("KEY_2");
//! let ungrabs = device.ungrab_count();
//! ```

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use keysboard_core::KeyCodes;

use super::{DeviceError, DeviceOpener, InputDevice, KeyState, KeyTransition};

enum Step {
    Transition(KeyTransition),
    Hook(Box<dyn FnOnce() + Send>),
    Fail(DeviceError),
}

/// A device that replays a fixed script of key transitions.
#[derive(Default)]
pub struct MockInputDevice {
    steps: VecDeque<Step>,
    ungrabs: Arc<AtomicUsize>,
}

impl MockInputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key-down followed by the matching key-up.
    pub fn key_down(self, code: &str) -> Self {
        self.transition(KeyTransition::down(code))
            .transition(KeyTransition::up(code))
    }

    /// Appends a key-down reporting several identifiers at once.
    pub fn key_down_many(self, codes: &[&str]) -> Self {
        let codes = KeyCodes::Many(codes.iter().map(|c| c.to_string()).collect());
        self.transition(KeyTransition {
            codes,
            state: KeyState::Pressed,
        })
    }

    /// Appends an arbitrary transition.
    pub fn transition(mut self, transition: KeyTransition) -> Self {
        self.steps.push_back(Step::Transition(transition));
        self
    }

    /// Appends a closure run before the next transition is returned.
    pub fn then(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.steps.push_back(Step::Hook(Box::new(hook)));
        self
    }

    /// Appends a read failure.
    pub fn fail(mut self, error: DeviceError) -> Self {
        self.steps.push_back(Step::Fail(error));
        self
    }

    /// Counter incremented on every `ungrab` call.
    pub fn ungrab_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.ungrabs)
    }
}

impl InputDevice for MockInputDevice {
    fn next_transition(&mut self) -> Result<KeyTransition, DeviceError> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Transition(transition)) => return Ok(transition),
                Some(Step::Hook(hook)) => hook(),
                Some(Step::Fail(error)) => return Err(error),
                None => return Err(DeviceError::Disconnected),
            }
        }
    }

    fn ungrab(&mut self) -> Result<(), DeviceError> {
        self.ungrabs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a [`MockDeviceOpener`] does when asked for one identifier.
enum Slot {
    Ready(MockInputDevice),
    Busy,
}

/// Opens scripted devices by identifier.
///
/// Unknown identifiers (and identifiers opened a second time) fail with
/// `DeviceError::Unavailable`.
#[derive(Default)]
pub struct MockDeviceOpener {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MockDeviceOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` under `device_id`.
    pub fn with_device(self, device_id: &str, device: MockInputDevice) -> Self {
        self.slots
            .lock()
            .unwrap()
            .insert(device_id.to_string(), Slot::Ready(device));
        self
    }

    /// Makes `device_id` refuse the exclusive grab.
    pub fn with_busy_device(self, device_id: &str) -> Self {
        self.slots
            .lock()
            .unwrap()
            .insert(device_id.to_string(), Slot::Busy);
        self
    }
}

impl DeviceOpener for MockDeviceOpener {
    fn open(&self, device_id: &str) -> Result<Box<dyn InputDevice>, DeviceError> {
        match self.slots.lock().unwrap().remove(device_id) {
            Some(Slot::Ready(device)) => Ok(Box::new(device)),
            Some(Slot::Busy) => Err(DeviceError::AlreadyGrabbed {
                device: device_id.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "device or resource busy"),
            }),
            None => Err(DeviceError::Unavailable {
                device: device_id.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
            }),
        }
    }
}
