//! Key identifiers reported by physical devices and how they match keybinds.
//!
//! Key identifiers are the kernel's symbolic names (`KEY_A`, `KEY_ESC`,
//! `BTN_LEFT`, …).  Most events carry a single name, but some codes have
//! several aliases (for example `KEY_MUTE` and `KEY_MIN_INTERESTING` share a
//! code) and some devices report combos; those events carry a list.
//!
//! Matching rules:
//!
//! | Event codes        | Keybind `key` matches when…      |
//! |--------------------|----------------------------------|
//! | `Single(code)`     | `key == code`                    |
//! | `Many(codes)`      | `codes` contains `key`           |
//!
//! Backends only know one name per code, so [`KeyCodes::with_aliases`] adds
//! the other kernel names from [`kernel_aliases`].

use std::fmt;

/// Key name that exits every session regardless of its configured exit key.
pub const UNIVERSAL_EXIT_KEY: &str = "KEY_ESC";

/// Kernel key names that share one code, from `linux/input-event-codes.h`.
const KERNEL_ALIASES: &[(u16, &[&str])] = &[
    (113, &["KEY_MUTE", "KEY_MIN_INTERESTING"]),
    (122, &["KEY_HANGEUL", "KEY_HANGUEL"]),
    (152, &["KEY_SCREENLOCK", "KEY_COFFEE"]),
    (153, &["KEY_ROTATE_DISPLAY", "KEY_DIRECTION"]),
    (244, &["KEY_BRIGHTNESS_AUTO", "KEY_BRIGHTNESS_ZERO"]),
    (246, &["KEY_WWAN", "KEY_WIMAX"]),
    (0x100, &["BTN_0", "BTN_MISC"]),
    (0x110, &["BTN_LEFT", "BTN_MOUSE"]),
    (0x120, &["BTN_TRIGGER", "BTN_JOYSTICK"]),
    (0x130, &["BTN_SOUTH", "BTN_A", "BTN_GAMEPAD"]),
    (0x131, &["BTN_EAST", "BTN_B"]),
    (0x133, &["BTN_NORTH", "BTN_X"]),
    (0x134, &["BTN_WEST", "BTN_Y"]),
    (0x140, &["BTN_TOOL_PEN", "BTN_DIGI"]),
    (0x150, &["BTN_GEAR_DOWN", "BTN_WHEEL"]),
    (0x174, &["KEY_FULL_SCREEN", "KEY_ZOOM"]),
    (0x177, &["KEY_ASPECT_RATIO", "KEY_SCREEN"]),
    (0x1af, &["KEY_DISPLAYTOGGLE", "KEY_BRIGHTNESS_TOGGLE"]),
    (0x2c0, &["BTN_TRIGGER_HAPPY1", "BTN_TRIGGER_HAPPY"]),
];

/// Every kernel name for `code`, or an empty slice when it has only one.
pub fn kernel_aliases(code: u16) -> &'static [&'static str] {
    KERNEL_ALIASES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|&(_, names)| names)
        .unwrap_or(&[])
}

/// The key identifier(s) carried by one key transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyCodes {
    Single(String),
    Many(Vec<String>),
}

impl KeyCodes {
    /// Codes for kernel key `code`, named `name` by the backend, plus any
    /// other kernel names for the same code.  `name` stays first.
    pub fn with_aliases(name: impl Into<String>, code: u16) -> Self {
        let mut names = vec![name.into()];
        for alias in kernel_aliases(code) {
            if !names.iter().any(|n| n == alias) {
                names.push((*alias).to_string());
            }
        }
        if names.len() == 1 {
            KeyCodes::Single(names.remove(0))
        } else {
            KeyCodes::Many(names)
        }
    }

    /// Returns `true` if a keybind on `key` is triggered by these codes.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyCodes::Single(code) => code == key,
            KeyCodes::Many(codes) => codes.iter().any(|c| c == key),
        }
    }

    /// Iterates over every reported identifier.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            KeyCodes::Single(code) => std::slice::from_ref(code),
            KeyCodes::Many(codes) => codes.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for KeyCodes {
    fn from(code: &str) -> Self {
        KeyCodes::Single(code.to_string())
    }
}

impl fmt::Display for KeyCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCodes::Single(code) => f.write_str(code),
            KeyCodes::Many(codes) => write!(f, "[{}]", codes.join(", ")),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_matches_exactly() {
        let codes = KeyCodes::from("KEY_A");
        assert!(codes.matches("KEY_A"));
        assert!(!codes.matches("KEY_AB"));
        assert!(!codes.matches("key_a"));
    }

    #[test]
    fn test_many_matches_by_membership() {
        let codes = KeyCodes::Many(vec!["KEY_MUTE".into(), "KEY_MIN_INTERESTING".into()]);
        assert!(codes.matches("KEY_MUTE"));
        assert!(codes.matches("KEY_MIN_INTERESTING"));
        assert!(!codes.matches("KEY_VOLUMEUP"));
    }

    #[test]
    fn test_display_formats_single_and_list() {
        assert_eq!(KeyCodes::from("KEY_A").to_string(), "KEY_A");
        assert_eq!(
            KeyCodes::Many(vec!["A".into(), "B".into()]).to_string(),
            "[A, B]"
        );
    }

    #[test]
    fn test_iter_yields_all_codes() {
        let codes = KeyCodes::Many(vec!["A".into(), "B".into()]);
        assert_eq!(codes.iter().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(KeyCodes::from("C").iter().collect::<Vec<_>>(), vec!["C"]);
    }

    // ── Kernel aliases ────────────────────────────────────────────────────────

    #[test]
    fn test_gamepad_south_button_answers_to_every_name() {
        // Arrange: evdev names code 304 BTN_SOUTH
        let codes = KeyCodes::with_aliases("BTN_SOUTH", 0x130);

        // Assert
        assert!(codes.matches("BTN_SOUTH"));
        assert!(codes.matches("BTN_A"));
        assert!(codes.matches("BTN_GAMEPAD"));
        assert_eq!(codes.iter().next(), Some("BTN_SOUTH"));
    }

    #[test]
    fn test_alias_names_are_not_repeated() {
        let codes = KeyCodes::with_aliases("KEY_MUTE", 113);

        assert_eq!(
            codes,
            KeyCodes::Many(vec!["KEY_MUTE".into(), "KEY_MIN_INTERESTING".into()])
        );
    }

    #[test]
    fn test_mouse_and_screenlock_aliases() {
        assert!(KeyCodes::with_aliases("BTN_LEFT", 272).matches("BTN_MOUSE"));
        assert!(KeyCodes::with_aliases("KEY_COFFEE", 152).matches("KEY_SCREENLOCK"));
    }

    #[test]
    fn test_code_without_aliases_stays_single() {
        assert_eq!(KeyCodes::with_aliases("KEY_A", 30), KeyCodes::from("KEY_A"));
        assert!(kernel_aliases(30).is_empty());
    }
}
