//! Linux synthetic keyboard via uinput.
//!
//! # What is uinput? (for beginners)
//!
//! `/dev/uinput` lets a user-space process create a *virtual* input device.
//! Events written to it are delivered by the kernel exactly like events from
//! a physical keyboard, so the desktop (X11, Wayland, or a text console)
//! cannot tell them apart.
//!
//! A virtual device must declare up front which keys it can emit.  keysboard
//! declares every key code up to `KEY_MAX`, so any key name a keybind uses
//! can be emitted without recreating the device.
//!
//! # Key names
//!
//! Keybinds name keys the way the kernel headers do (`KEY_A`, `KEY_LEFTCTRL`,
//! `BTN_LEFT`).  evdev's `Key` type prints exactly those names through its
//! `Debug` implementation, so the name→code table is built by formatting
//! every code once when the device is opened.  `Debug` gives one name per
//! code, so the other kernel names for that code (`BTN_MOUSE`, `BTN_A`,
//! `KEY_MIN_INTERESTING`, …) come from [`kernel_aliases`].
//!
//! # Flushing
//!
//! Each state change is followed by a `SYN_REPORT` event, which tells the
//! kernel the report is complete and delivers it immediately.
//!
//! # Permissions
//!
//! The user needs write access to `/dev/uinput`, normally via a udev rule
//! or the `input` group.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key,
};
use keysboard_core::kernel_aliases;
use tracing::debug;

use crate::application::emit_keys::{EmulationError, VirtualKeyboard, VirtualKeyboardOpener};

/// One past the highest key code the kernel defines (`KEY_MAX` = 0x2ff).
const KEY_CODE_LIMIT: u16 = 0x300;

/// A uinput virtual keyboard able to emit every key code.
pub struct UinputKeyboard {
    device: Mutex<VirtualDevice>,
    codes: HashMap<String, Key>,
}

impl UinputKeyboard {
    /// Creates the virtual device `name`.
    ///
    /// # Errors
    ///
    /// Returns `EmulationError::Platform` if `/dev/uinput` cannot be opened
    /// or the device cannot be created.
    pub fn open(name: &str) -> Result<Self, EmulationError> {
        let mut keys = AttributeSet::<Key>::new();
        let mut codes = HashMap::new();
        for code in 0..KEY_CODE_LIMIT {
            let key = Key::new(code);
            keys.insert(key);
            codes.entry(format!("{key:?}")).or_insert(key);
            for alias in kernel_aliases(code) {
                codes.entry((*alias).to_string()).or_insert(key);
            }
        }

        let device = VirtualDeviceBuilder::new()
            .and_then(|builder| builder.name(name).with_keys(&keys))
            .and_then(|builder| builder.build())
            .map_err(|e| EmulationError::Platform(format!("cannot create uinput device: {e}")))?;
        debug!("created virtual keyboard \"{name}\"");

        Ok(Self {
            device: Mutex::new(device),
            codes,
        })
    }
}

impl VirtualKeyboard for UinputKeyboard {
    fn set_key_state(&self, key: &str, pressed: bool) -> Result<(), EmulationError> {
        let code = self
            .codes
            .get(key)
            .ok_or_else(|| EmulationError::InvalidKeyCode(key.to_string()))?;
        let events = [
            InputEvent::new(EventType::KEY, code.code(), i32::from(pressed)),
            InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
        ];
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        device
            .emit(&events)
            .map_err(|e| EmulationError::Platform(format!("uinput write failed: {e}")))
    }
}

/// Opens one [`UinputKeyboard`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct UinputOpener;

impl VirtualKeyboardOpener for UinputOpener {
    fn open(&self, name: &str) -> Result<std::sync::Arc<dyn VirtualKeyboard>, EmulationError> {
        Ok(std::sync::Arc::new(UinputKeyboard::open(name)?))
    }
}
