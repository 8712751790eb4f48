//! Mock synthetic keyboard for unit testing.
//!
//! # Why a mock keyboard?
//!
//! The real [`UinputKeyboard`](super::linux::UinputKeyboard) creates a
//! virtual device in the kernel.  That needs write access to `/dev/uinput`
//! and actually types into whatever window has focus on the test machine.
//!
//! `RecordingKeyboard` replaces the kernel call with in-memory recording.
//! Each emitted state change is pushed into a `Mutex<Vec<...>>` so test
//! assertions can inspect exactly what was emitted and in what order.
//!
//! # Usage in tests
//!
//! ```ignore
//! let keyboard = Arc::new(RecordingKeyboard::new());
//! let opener = MockKeyboardOpener::sharing(Arc::clone(&keyboard));
//!
//! // ... run a session that presses KEY_A ...
//!
//! assert_eq!(keyboard.events(), vec![("KEY_A".into(), true), ("KEY_A".into(), false)]);
//! ```

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::application::emit_keys::{EmulationError, VirtualKeyboard, VirtualKeyboardOpener};

/// A keyboard that records every state change instead of emitting it.
#[derive(Default)]
pub struct RecordingKeyboard {
    /// `(key, pressed)` pairs in emission order.
    pub emitted: Mutex<Vec<(String, bool)>>,
    /// When `true`, every call returns `EmulationError::Platform`.
    pub should_fail: bool,
    /// When `true`, only key-down calls fail; releases are still recorded.
    pub fail_presses: bool,
}

impl RecordingKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A keyboard whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A keyboard that rejects key-downs but records releases.
    pub fn failing_presses() -> Self {
        Self {
            fail_presses: true,
            ..Self::default()
        }
    }

    /// Snapshot of the recorded state changes.
    pub fn events(&self) -> Vec<(String, bool)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl VirtualKeyboard for RecordingKeyboard {
    fn set_key_state(&self, key: &str, pressed: bool) -> Result<(), EmulationError> {
        if self.should_fail || (pressed && self.fail_presses) {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.emitted.lock().unwrap().push((key.to_string(), pressed));
        Ok(())
    }
}

/// Hands out one shared [`RecordingKeyboard`] to every session that opens one.
#[derive(Default)]
pub struct MockKeyboardOpener {
    keyboard: Arc<RecordingKeyboard>,
    /// Number of successful `open` calls.
    pub opened: AtomicUsize,
    /// When `true`, `open` fails with `EmulationError::Platform`.
    pub should_fail: bool,
}

impl MockKeyboardOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// An opener whose every `open` fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// An opener that hands out `keyboard`, so the test keeps a handle to it.
    pub fn sharing(keyboard: Arc<RecordingKeyboard>) -> Self {
        Self {
            keyboard,
            ..Self::default()
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl VirtualKeyboardOpener for MockKeyboardOpener {
    fn open(&self, _name: &str) -> Result<Arc<dyn VirtualKeyboard>, EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.keyboard.clone() as Arc<dyn VirtualKeyboard>)
    }
}
