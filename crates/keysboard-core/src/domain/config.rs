//! Config Snapshot: one parsed read of the persistent store.
//!
//! ```json
//! {
//!     "devices": {
//!         "/dev/input/by-id/usb-Some_Keypad-event-kbd": {
//!             "device_nickname": "Keypad",
//!             "exit_key": "KEY_ESC",
//!             "exit_cmd": "echo Keysboard has exited!",
//!             "layers": {
//!                 "main": { "keybinds": { "KEY_1": { "action_type": "set_layer", "action": "alt" } } },
//!                 "alt":  { "keybinds": { "KEY_2": { "action": "echo hi" } }, "inherit": "main" }
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Every optional field has a serde default so that hand-edited documents
//! missing newer fields still load.  Sessions never write a snapshot; they
//! re-read the store on every key press and drop the old snapshot.
//!
//! # Tolerating hand edits
//!
//! A mistake in one part of the document must not take down the rest, since
//! every running session reads the same file.  So below the top level:
//!
//! - a field of the wrong type is logged and takes its default;
//! - a device or layer entry that is not an object is logged and dropped;
//! - a keybind or alias that does not decode becomes [`Action::Invalid`] and
//!   is skipped when pressed.
//!
//! Only a document whose top level is not an object fails to parse.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::action::Action;
use crate::ordered::OrderedMap;

/// Device identifier written into a freshly generated document.
pub const PLACEHOLDER_DEVICE: &str = "the_path_to_a_device";
/// Nickname given to newly added devices.
pub const DEFAULT_NICKNAME: &str = "NotARealDevice";
/// Exit key given to newly added devices.
pub const DEFAULT_EXIT_KEY: &str = "KEY_ESC";
/// Name of the first layer of newly added devices.
pub const DEFAULT_FIRST_LAYER: &str = "main";
/// Exit command given to newly added devices.
pub const DEFAULT_EXIT_CMD: &str = "echo Keysboard has exited!";

/// Top-level document stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Device identifier → device record.
    #[serde(default, deserialize_with = "skip_malformed")]
    pub devices: OrderedMap<DeviceRecord>,
    /// Raw text of a previous document that failed to parse.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

impl ConfigDocument {
    /// The document written when no store exists yet: one placeholder device
    /// with a single default layer.
    pub fn starter() -> Self {
        let mut devices = OrderedMap::new();
        devices.insert(PLACEHOLDER_DEVICE, DeviceRecord::starter());
        Self {
            devices,
            backup: None,
        }
    }

    /// Returns the record for `device_id`.
    pub fn device(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    /// Normalizes every device record (see [`DeviceRecord::normalize`]).
    pub fn normalize(&mut self) {
        self.devices.values_mut().for_each(DeviceRecord::normalize);
    }
}

/// Per-device configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Friendly name used in log lines.
    #[serde(default, rename = "device_nickname", deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Key that ends this device's session.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub exit_key: Option<String>,
    /// Shell command run (detached) when the exit key is pressed.
    #[serde(default, rename = "exit_cmd", deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub exit_command: Option<String>,
    /// Layer a session starts on; defaults to the first layer in the document.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub first_layer: Option<String>,
    /// Overrides the engine-wide `print_key_codes` setting.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub print_key_codes: Option<bool>,
    /// Overrides the engine-wide `print_actions` setting.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub print_actions: Option<bool>,
    /// Named actions callable from any keybind through an alias action.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "OrderedMap::is_empty")]
    pub aliases: OrderedMap<Action>,
    /// Layer name → layer, in document order.
    #[serde(default, deserialize_with = "skip_malformed")]
    pub layers: OrderedMap<Layer>,
}

impl DeviceRecord {
    /// The record given to a newly added device.
    pub fn starter() -> Self {
        let mut layers = OrderedMap::new();
        layers.insert(DEFAULT_FIRST_LAYER, Layer::starter());
        Self {
            nickname: Some(DEFAULT_NICKNAME.to_string()),
            exit_key: Some(DEFAULT_EXIT_KEY.to_string()),
            exit_command: Some(DEFAULT_EXIT_CMD.to_string()),
            first_layer: None,
            print_key_codes: None,
            print_actions: None,
            aliases: OrderedMap::new(),
            layers,
        }
    }

    /// Guarantees the record has at least one layer by adding an empty
    /// [`DEFAULT_FIRST_LAYER`] when `layers` is empty.
    pub fn normalize(&mut self) {
        if self.layers.is_empty() {
            self.layers.insert(DEFAULT_FIRST_LAYER, Layer::default());
        }
    }

    /// Returns the record with [`normalize`](Self::normalize) applied.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// A named set of keybinds, optionally borrowing another layer's keybinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Key identifier → action, in document order.
    #[serde(default, deserialize_with = "or_default")]
    pub keybinds: OrderedMap<Action>,
    /// Layers whose own keybinds this layer inherits.
    #[serde(default, deserialize_with = "or_default", skip_serializing_if = "Option::is_none")]
    pub inherit: Option<Inherit>,
}

impl Layer {
    /// The layer given to newly added layers: `KEY_1` returns to the first
    /// layer and `KEY_2` echoes a greeting.
    pub fn starter() -> Self {
        let mut keybinds = OrderedMap::new();
        keybinds.insert("KEY_1", Action::SetLayer(DEFAULT_FIRST_LAYER.to_string()));
        keybinds.insert("KEY_2", Action::Shell("echo hi".to_string()));
        Self {
            keybinds,
            inherit: None,
        }
    }
}

/// The `inherit` field: a single layer name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inherit {
    One(String),
    Many(Vec<String>),
}

impl Inherit {
    /// The inherited layer names in declaration order.
    pub fn names(&self) -> &[String] {
        match self {
            Inherit::One(name) => std::slice::from_ref(name),
            Inherit::Many(names) => names,
        }
    }
}

// ── Lenient decoding ──────────────────────────────────────────────────────────

/// A value that either decodes as `T` or is kept as raw JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum Decoded<T> {
    Valid(T),
    Malformed(Value),
}

impl<T: DeserializeOwned> Decoded<T> {
    fn into_valid(self, what: &str) -> Option<T> {
        match self {
            Decoded::Valid(value) => Some(value),
            Decoded::Malformed(raw) => {
                let reason = serde_json::from_value::<T>(raw)
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!("ignoring malformed {what}: {reason}");
                None
            }
        }
    }
}

/// Field decoder: a value of the wrong shape is logged and replaced by the
/// default.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(Decoded::<T>::deserialize(deserializer)?
        .into_valid("config value")
        .unwrap_or_default())
}

/// Map decoder: entries that do not decode are logged and dropped; the rest
/// keep their order.
fn skip_malformed<'de, D, T>(deserializer: D) -> Result<OrderedMap<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries: OrderedMap<Decoded<T>> = or_default(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|(name, entry)| {
            let value = entry.into_valid(&format!("entry \"{name}\""))?;
            Some((name, value))
        })
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
