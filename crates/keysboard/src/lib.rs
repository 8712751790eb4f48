//! keysboard engine library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does keysboard do? (for beginners)
//!
//! keysboard turns spare keyboards, keypads, and macro pads into dedicated
//! control surfaces.  For every device listed in its configuration it:
//!
//! 1. Opens the device and *grabs* it, so its key presses no longer reach the
//!    rest of the system.
//! 2. Reads key presses one at a time, re-reading the configuration file on
//!    each press so edits take effect immediately.
//! 3. Resolves the press against the device's current *layer* (a named set of
//!    keybinds that may inherit another layer's keybinds).
//! 4. Runs the bound action: a shell command, synthetic key presses on a
//!    virtual keyboard, a layer switch, a named alias, or a list of actions.
//! 5. Stops when the device's exit key is pressed, the device disappears from
//!    the configuration, or the device fails.
//!
//! Each device runs in its own session; one failing device never stops another.

/// Application layer: sessions, the supervisor, action execution, and
/// configuration management.
pub mod application;

/// Infrastructure layer: evdev/uinput adapters, process spawning, and the
/// JSON configuration store.
pub mod infrastructure;
