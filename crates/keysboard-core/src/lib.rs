//! # keysboard-core
//!
//! Shared library for the keysboard remapping engine containing the config
//! snapshot model, the action types, layer resolution, and key code matching.
//!
//! This crate has zero dependencies on OS APIs, device nodes, or processes.
//!
//! # Architecture overview (for beginners)
//!
//! keysboard takes exclusive ownership of one or more physical keyboard-like
//! devices and turns each key press into a configured *action*: run a shell
//! command, type synthetic keys, switch to another binding *layer*, call a
//! named *alias*, or run a list of actions.
//!
//! This crate (`keysboard-core`) is the pure foundation.  It defines:
//!
//! - **`domain`** – The configuration document as the engine sees it (devices,
//!   layers, keybinds, aliases), the five-way [`Action`] enum, the layer
//!   resolver that applies one level of layer inheritance, and the alias guard
//!   used to break recursive alias definitions.
//!
//! - **`keycode`** – How key identifiers reported by a device are matched
//!   against keybind keys.
//!
//! - **`ordered`** – An insertion-ordered map.  Layer order and keybind order
//!   are meaningful (the first layer is the default; keybinds fire in document
//!   order), so plain `HashMap`s are not used for the document.
//!
//! - **`settings`** – Engine-wide defaults that each session may override from
//!   its own device record.

pub mod domain;
pub mod keycode;
pub mod ordered;
pub mod settings;

// Re-export the most-used types at the crate root so callers can write
// `keysboard_core::Action` instead of `keysboard_core::domain::action::Action`.
pub use domain::action::{Action, ActionDecodeError, InvalidAction, KeyOp, KeyStep, KeyboardAction};
pub use domain::alias_guard::AliasGuard;
pub use domain::config::{ConfigDocument, DeviceRecord, Inherit, Layer};
pub use domain::layer::{default_layer, resolve, EffectiveKeybinds, LayerError, Resolution};
pub use keycode::{kernel_aliases, KeyCodes};
pub use ordered::OrderedMap;
pub use settings::EngineSettings;
