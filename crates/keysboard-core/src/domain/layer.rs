//! Layer Resolver: computes the keybinds in effect for the current layer.
//!
//! # Inheritance (for beginners)
//!
//! A layer may name other layers in its `inherit` field.  Inheritance is one
//! level deep: a layer borrows the *own* keybinds of each inherited layer, not
//! the keybinds those layers inherit in turn.  The merge happens in order:
//!
//! ```text
//! effective = own(inherit[0])  ⟵ overridden by  own(inherit[1])  ⟵ … ⟵  own(current)
//! ```
//!
//! A key bound in a later source replaces the action of an earlier source but
//! keeps the earlier position, so iteration order is "first time the key was
//! seen during the merge".  Inherited names that do not exist are skipped.
//!
//! The resolver never falls back to another layer.  When the current layer is
//! missing it returns [`LayerError::UnknownLayer`] and the session resets to
//! the default layer itself.

use thiserror::Error;
use tracing::debug;

use crate::domain::action::Action;
use crate::domain::config::{DeviceRecord, Layer};
use crate::keycode::KeyCodes;
use crate::ordered::OrderedMap;

/// Error type for layer resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayerError {
    /// The requested layer is not defined for the device.
    #[error("layer [ {0} ] is not in the config")]
    UnknownLayer(String),
}

/// The effective keybind mapping for one layer, in merge order.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveKeybinds<'a> {
    entries: Vec<(&'a str, &'a Action)>,
}

impl<'a> EffectiveKeybinds<'a> {
    fn merge(&mut self, keybinds: &'a OrderedMap<Action>) {
        for (key, action) in keybinds.iter() {
            match self.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = action,
                None => self.entries.push((key, action)),
            }
        }
    }

    /// Number of effective keybinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keybinds are in effect.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the action bound to exactly `key`.
    pub fn get(&self, key: &str) -> Option<&'a Action> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, action)| *action)
    }

    /// Iterates over `(key, action)` pairs in merge order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Action)> + '_ {
        self.entries.iter().copied()
    }

    /// Iterates over the keybinds triggered by `codes`, in merge order.
    pub fn matching<'c>(
        &'c self,
        codes: &'c KeyCodes,
    ) -> impl Iterator<Item = (&'a str, &'a Action)> + 'c {
        self.iter().filter(move |(key, _)| codes.matches(key))
    }
}

/// Output of [`resolve`]: the effective keybinds plus the device's layer map
/// (needed to validate layer switches).
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub keybinds: EffectiveKeybinds<'a>,
    pub layers: &'a OrderedMap<Layer>,
}

/// Resolves the effective keybinds of `current_layer` for `device`.
///
/// # Errors
///
/// Returns [`LayerError::UnknownLayer`] if `current_layer` is not one of the
/// device's layers.
pub fn resolve<'a>(
    device: &'a DeviceRecord,
    current_layer: &str,
) -> Result<Resolution<'a>, LayerError> {
    let layers = &device.layers;
    let layer = layers
        .get(current_layer)
        .ok_or_else(|| LayerError::UnknownLayer(current_layer.to_string()))?;

    let mut keybinds = EffectiveKeybinds {
        entries: Vec::new(),
    };
    if let Some(inherit) = &layer.inherit {
        for name in inherit.names() {
            match layers.get(name) {
                Some(parent) => keybinds.merge(&parent.keybinds),
                None => debug!("layer [ {current_layer} ] inherits missing layer [ {name} ], skipping"),
            }
        }
    }
    keybinds.merge(&layer.keybinds);

    Ok(Resolution { keybinds, layers })
}

/// The layer a session starts on (and falls back to): the declared
/// `first_layer` when it exists, otherwise the first layer in document order.
///
/// Returns `None` only for a record with no layers at all; a normalized
/// record always yields a name.
pub fn default_layer(device: &DeviceRecord) -> Option<&str> {
    device
        .first_layer
        .as_deref()
        .filter(|name| device.layers.contains_key(name))
        .or_else(|| device.layers.first_key())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Inherit;

    fn shell(cmd: &str) -> Action {
        Action::Shell(cmd.to_string())
    }

    fn layer(binds: &[(&str, &str)], inherit: Option<Inherit>) -> Layer {
        Layer {
            keybinds: binds.iter().map(|(k, c)| (*k, shell(c))).collect(),
            inherit,
        }
    }

    fn device(layers: Vec<(&str, Layer)>) -> DeviceRecord {
        DeviceRecord {
            layers: layers.into_iter().collect(),
            ..DeviceRecord::default()
        }
    }

    #[test]
    fn test_resolve_layer_without_inheritance_returns_own_keybinds() {
        let dev = device(vec![("main", layer(&[("KEY_A", "a"), ("KEY_B", "b")], None))]);

        let res = resolve(&dev, "main").expect("layer exists");

        let keys: Vec<&str> = res.keybinds.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["KEY_A", "KEY_B"]);
    }

    #[test]
    fn test_resolve_inherit_list_later_sources_override_earlier() {
        // Arrange: A and B both bind KEY_X; L binds KEY_Y which B also binds.
        let dev = device(vec![
            ("A", layer(&[("KEY_X", "from-a"), ("KEY_A", "a")], None)),
            ("B", layer(&[("KEY_X", "from-b"), ("KEY_Y", "from-b")], None)),
            (
                "L",
                layer(
                    &[("KEY_Y", "from-l"), ("KEY_L", "l")],
                    Some(Inherit::Many(vec!["A".into(), "B".into()])),
                ),
            ),
        ]);

        // Act
        let res = resolve(&dev, "L").expect("layer exists");

        // Assert
        assert_eq!(res.keybinds.get("KEY_X"), Some(&shell("from-b")));
        assert_eq!(res.keybinds.get("KEY_Y"), Some(&shell("from-l")));
        assert_eq!(res.keybinds.get("KEY_A"), Some(&shell("a")));
        assert_eq!(res.keybinds.get("KEY_L"), Some(&shell("l")));
        let keys: Vec<&str> = res.keybinds.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["KEY_X", "KEY_A", "KEY_Y", "KEY_L"]);
    }

    #[test]
    fn test_resolve_accepts_single_name_inherit() {
        let dev = device(vec![
            ("main", layer(&[("KEY_1", "one")], None)),
            ("alt", layer(&[("KEY_2", "two")], Some(Inherit::One("main".into())))),
        ]);

        let res = resolve(&dev, "alt").unwrap();

        assert_eq!(res.keybinds.len(), 2);
        assert_eq!(res.keybinds.get("KEY_1"), Some(&shell("one")));
    }

    #[test]
    fn test_resolve_inheritance_is_one_level_only() {
        // grand → parent → child: child must not see grand's keybinds.
        let dev = device(vec![
            ("grand", layer(&[("KEY_G", "g")], None)),
            ("parent", layer(&[("KEY_P", "p")], Some(Inherit::One("grand".into())))),
            ("child", layer(&[], Some(Inherit::One("parent".into())))),
        ]);

        let res = resolve(&dev, "child").unwrap();

        assert_eq!(res.keybinds.get("KEY_P"), Some(&shell("p")));
        assert!(res.keybinds.get("KEY_G").is_none());
    }

    #[test]
    fn test_resolve_skips_missing_inherited_layers() {
        let dev = device(vec![(
            "main",
            layer(
                &[("KEY_A", "a")],
                Some(Inherit::Many(vec!["ghost".into(), "main".into()])),
            ),
        )]);

        let res = resolve(&dev, "main").expect("missing parents are not an error");

        assert_eq!(res.keybinds.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_layer_returns_error() {
        let dev = device(vec![("main", layer(&[], None))]);

        let err = resolve(&dev, "nope").unwrap_err();

        assert_eq!(err, LayerError::UnknownLayer("nope".to_string()));
    }

    #[test]
    fn test_resolve_exposes_layer_map() {
        let dev = device(vec![("main", layer(&[], None)), ("alt", layer(&[], None))]);

        let res = resolve(&dev, "main").unwrap();

        assert!(res.layers.contains_key("alt"));
    }

    #[test]
    fn test_matching_filters_by_scalar_and_list_codes() {
        let dev = device(vec![(
            "main",
            layer(&[("KEY_A", "a"), ("KEY_B", "b"), ("KEY_C", "c")], None),
        )]);
        let res = resolve(&dev, "main").unwrap();

        let single = KeyCodes::Single("KEY_B".into());
        let many = KeyCodes::Many(vec!["KEY_C".into(), "KEY_A".into()]);

        let hits: Vec<&str> = res.keybinds.matching(&single).map(|(k, _)| k).collect();
        assert_eq!(hits, vec!["KEY_B"]);
        // Order follows the keybinds, not the reported codes.
        let hits: Vec<&str> = res.keybinds.matching(&many).map(|(k, _)| k).collect();
        assert_eq!(hits, vec!["KEY_A", "KEY_C"]);
    }

    #[test]
    fn test_default_layer_prefers_declared_first_layer() {
        let mut dev = device(vec![("main", layer(&[], None)), ("alt", layer(&[], None))]);
        assert_eq!(default_layer(&dev), Some("main"));

        dev.first_layer = Some("alt".into());
        assert_eq!(default_layer(&dev), Some("alt"));

        dev.first_layer = Some("missing".into());
        assert_eq!(default_layer(&dev), Some("main"));
    }

    #[test]
    fn test_default_layer_of_empty_record_is_none() {
        assert_eq!(default_layer(&DeviceRecord::default()), None);
    }
}
