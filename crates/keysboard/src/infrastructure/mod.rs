//! Infrastructure layer for the keysboard engine.
//!
//! Contains OS-facing adapters: physical input devices, the virtual output
//! keyboard, process spawning, and the configuration file.
//!
//! **Dependency rule**: this layer may depend on `keysboard_core`, and the
//! application layer talks to it only through the traits declared in each
//! sub-module.
//!
//! # Sub-modules
//!
//! - **`input_device`** – `InputDevice`/`DeviceOpener` traits, the evdev
//!   implementation (Linux), and a scripted mock device for tests.
//!
//! - **`input_emulation`** – `VirtualKeyboard`/`KeyboardOpener` traits, the
//!   uinput implementation (Linux), and a recording mock.
//!
//! - **`process`** – `CommandSpawner` trait and the detached `sh -c` spawner.
//!
//! - **`storage`** – The JSON configuration store: default document
//!   generation, corruption backup, and pretty-printed saves.

pub mod input_device;
pub mod input_emulation;
pub mod process;
pub mod storage;
