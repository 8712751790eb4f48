//! Engine-wide settings.
//!
//! [`EngineSettings`] is built once at startup (from CLI flags or defaults)
//! and passed by value into every session.  Nothing reads ambient global
//! state: a session combines these defaults with its own device record's
//! overrides through the helper methods below.

use std::time::Duration;

use crate::domain::config::DeviceRecord;
use crate::keycode::{KeyCodes, UNIVERSAL_EXIT_KEY};

/// Default time a single synthetic key press is held.
pub const DEFAULT_HOLD_TIME: Duration = Duration::from_millis(200);

/// Default number of characters a device identifier is shortened to in logs.
pub const DEFAULT_SHORTEN_NAME_AMOUNT: usize = 15;

/// Runtime settings shared by every session.
///
/// | Field                 | Default            |
/// |-----------------------|--------------------|
/// | print_key_codes       | `true`             |
/// | print_actions         | `true`             |
/// | universal_exit_key    | `Some("KEY_ESC")`  |
/// | default_hold_time     | 200 ms             |
/// | shorten_name_amount   | `Some(15)`         |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Log every pressed key at `info` (otherwise `debug`).
    pub print_key_codes: bool,
    /// Log every dispatched action at `info` (otherwise `debug`).
    pub print_actions: bool,
    /// Key that exits any session; `None` disables it.
    pub universal_exit_key: Option<String>,
    /// Hold time for keyboard presses that do not specify one.
    pub default_hold_time: Duration,
    /// Maximum length of a device identifier in log lines; `None` disables
    /// shortening.
    pub shorten_name_amount: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            print_key_codes: true,
            print_actions: true,
            universal_exit_key: Some(UNIVERSAL_EXIT_KEY.to_string()),
            default_hold_time: DEFAULT_HOLD_TIME,
            shorten_name_amount: Some(DEFAULT_SHORTEN_NAME_AMOUNT),
        }
    }
}

impl EngineSettings {
    /// Shortens `device_id` for log lines: the first `shorten_name_amount`
    /// characters followed by `...`.
    pub fn shorten(&self, device_id: &str) -> String {
        match self.shorten_name_amount {
            Some(limit) if device_id.chars().count() > limit => {
                let head: String = device_id.chars().take(limit).collect();
                format!("{head}...")
            }
            _ => device_id.to_string(),
        }
    }

    /// The name a session logs under: the device nickname, falling back to
    /// the shortened identifier.
    pub fn short_name(&self, device_id: &str, record: Option<&DeviceRecord>) -> String {
        record
            .and_then(|r| r.nickname.clone())
            .unwrap_or_else(|| self.shorten(device_id))
    }

    /// Effective `print_key_codes` for `record`.
    pub fn print_key_codes_for(&self, record: &DeviceRecord) -> bool {
        record.print_key_codes.unwrap_or(self.print_key_codes)
    }

    /// Effective `print_actions` for `record`.
    pub fn print_actions_for(&self, record: &DeviceRecord) -> bool {
        record.print_actions.unwrap_or(self.print_actions)
    }

    /// Returns `true` if `codes` is the device's exit key or the universal
    /// exit key.
    pub fn is_exit_key(&self, codes: &KeyCodes, record: &DeviceRecord) -> bool {
        let is = |key: Option<&str>| key.is_some_and(|k| codes.matches(k));
        is(record.exit_key.as_deref()) || is(self.universal_exit_key.as_deref())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
