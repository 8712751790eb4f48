//! Synthetic keyboard implementations.
//!
//! The real implementation (Linux uinput) is selected at compile time via
//! `#[cfg(target_os = ...)]`; the mock is always available for tests.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;
