//! Application layer use cases for keysboard.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The *application* layer sits between the domain (pure remapping rules in
//! `keysboard-core`) and the infrastructure (device nodes, uinput, processes,
//! the JSON file).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "when KEY_1
//!   is pressed on the keypad, switch it to the `alt` layer").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so tests can drive a whole session with scripted key presses.
//!
//! # Sub-modules
//!
//! - **`run_session`**   – The per-device state machine: grab, read, reload
//!   config, resolve, dispatch, ungrab.  Runs on every key press.
//!
//! - **`execute_action`** – Performs one resolved action, including alias
//!   expansion with cycle protection.
//!
//! - **`emit_keys`**     – Synthetic key presses and key sequences.
//!
//! - **`supervise`**     – Starts one session thread per configured device.
//!
//! - **`manage_config`** – The `add-device` / `add-layer` / `add-keybind` /
//!   `list` commands.

pub mod emit_keys;
pub mod execute_action;
pub mod manage_config;
pub mod run_session;
pub mod supervise;
