//! Domain entities for keysboard.
//!
//! This module contains pure remapping logic with no infrastructure
//! dependencies: no device nodes, no uinput, no processes, no files.
//!
//! # What lives here? (for beginners)
//!
//! - **`config`** – One parsed read of the configuration store (a *snapshot*).
//!   Sessions re-read the store on every key press, so a snapshot is treated as
//!   an immutable, fully-owned value.
//! - **`action`** – The things a key press can do, decoded once at parse time
//!   into a five-way enum so dispatch never has to inspect raw JSON.
//! - **`layer`** – The layer resolver: which keybinds are effective for the
//!   current layer after applying one level of inheritance.
//! - **`alias_guard`** – The per-key-press set of alias names being expanded,
//!   used to stop an alias from (directly or indirectly) calling itself.

pub mod action;
pub mod alias_guard;
pub mod config;
pub mod layer;
