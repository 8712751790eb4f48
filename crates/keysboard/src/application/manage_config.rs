//! Management commands: add devices, layers and keybinds, list devices.
//!
//! Each command is a read-modify-write of the store and is idempotent: an
//! existing device, layer or keybind is never overwritten.  Missing parents
//! are created on the way, so `add-keybind` on a brand new device creates the
//! device (with the starter layer) and the layer first.
//!
//! Running sessions pick the changes up on their next key press.

use keysboard_core::{
    domain::action::{ALIAS_TAG, KEYBOARD_TAG, MULTI_TAG, SET_LAYER_TAG, SHELL_TAG},
    Action, ActionDecodeError, ConfigDocument, DeviceRecord, EngineSettings, Layer,
};
use thiserror::Error;
use tracing::info;

use crate::infrastructure::storage::{ConfigError, JsonConfigStore};

const ACTION_TYPES: [&str; 5] = [SHELL_TAG, KEYBOARD_TAG, SET_LAYER_TAG, ALIAS_TAG, MULTI_TAG];

/// Error type for management commands.
#[derive(Debug, Error)]
pub enum ManageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown action type \"{0}\" (expected one of: shell, keyboard, set_layer, alias, multi)")]
    UnknownActionType(String),
    #[error("invalid {action_type} action: {source}")]
    InvalidAction {
        action_type: String,
        #[source]
        source: ActionDecodeError,
    },
}

/// Whether a command changed the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Added,
    AlreadyPresent,
}

/// One row of `keysboard list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub device_id: String,
    /// Nickname, or the shortened identifier.
    pub name: String,
    pub layers: Vec<String>,
}

// ── Document edits ────────────────────────────────────────────────────────────

fn ensure_device<'d>(doc: &'d mut ConfigDocument, device_id: &str) -> (&'d mut DeviceRecord, Change) {
    let change = if doc.devices.contains_key(device_id) {
        Change::AlreadyPresent
    } else {
        Change::Added
    };
    (doc.devices.get_or_insert_with(device_id, DeviceRecord::starter), change)
}

fn ensure_layer<'d>(
    doc: &'d mut ConfigDocument,
    device_id: &str,
    layer: &str,
) -> (&'d mut Layer, Change) {
    let (record, _) = ensure_device(doc, device_id);
    let change = if record.layers.contains_key(layer) {
        Change::AlreadyPresent
    } else {
        Change::Added
    };
    (record.layers.get_or_insert_with(layer, Layer::starter), change)
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Adds `device_id` with the starter record unless it exists.
///
/// # Errors
///
/// Returns [`ManageError::Config`] if the store cannot be read or written.
pub fn add_device(store: &JsonConfigStore, device_id: &str) -> Result<Change, ManageError> {
    let change = store.update(|doc| ensure_device(doc, device_id).1)?;
    info!("device [ {device_id} ]: {change:?}");
    Ok(change)
}

/// Adds `layer` (with the starter keybinds) to `device_id` unless it exists.
///
/// # Errors
///
/// Returns [`ManageError::Config`] if the store cannot be read or written.
pub fn add_layer(store: &JsonConfigStore, device_id: &str, layer: &str) -> Result<Change, ManageError> {
    let change = store.update(|doc| ensure_layer(doc, device_id, layer).1)?;
    info!("device [ {device_id} ] layer [ {layer} ]: {change:?}");
    Ok(change)
}

/// Binds `key` on `layer` of `device_id` unless the key is already bound.
///
/// `payload` is taken literally; a JSON array is accepted for keyboard
/// sequences and multi actions.
///
/// # Errors
///
/// Returns [`ManageError::UnknownActionType`] or
/// [`ManageError::InvalidAction`] before touching the store, and
/// [`ManageError::Config`] if the store cannot be read or written.
pub fn add_keybind(
    store: &JsonConfigStore,
    device_id: &str,
    layer: &str,
    key: &str,
    action_type: &str,
    payload: &str,
) -> Result<Change, ManageError> {
    if !ACTION_TYPES.contains(&action_type) {
        return Err(ManageError::UnknownActionType(action_type.to_string()));
    }
    let action =
        Action::from_parts(action_type, payload).map_err(|source| ManageError::InvalidAction {
            action_type: action_type.to_string(),
            source,
        })?;

    let change = store.update(|doc| {
        let (target, _) = ensure_layer(doc, device_id, layer);
        if target.keybinds.contains_key(key) {
            Change::AlreadyPresent
        } else {
            target.keybinds.insert(key, action);
            Change::Added
        }
    })?;
    info!("device [ {device_id} ] layer [ {layer} ] key {key}: {change:?}");
    Ok(change)
}

/// Lists every configured device in document order.
///
/// # Errors
///
/// Returns [`ManageError::Config`] if the store cannot be read.
pub fn list_devices(
    store: &JsonConfigStore,
    settings: &EngineSettings,
) -> Result<Vec<DeviceSummary>, ManageError> {
    let doc = store.load()?;
    Ok(doc
        .devices
        .iter()
        .map(|(device_id, record)| DeviceSummary {
            device_id: device_id.to_string(),
            name: settings.short_name(device_id, Some(record)),
            layers: record.layers.keys().map(str::to_string).collect(),
        })
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keysboard_core::{domain::config::PLACEHOLDER_DEVICE, KeyOp, KeyboardAction};

    use super::*;

    const PAD: &str = "/dev/input/event7";

    fn temp_store() -> (tempfile::TempDir, JsonConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("keysboard-conf.json"));
        (dir, store)
    }

    // ── add_device ────────────────────────────────────────────────────────────

    #[test]
    fn test_add_device_adds_starter_record_once() {
        // Arrange
        let (_dir, store) = temp_store();

        // Act
        let first = add_device(&store, PAD).unwrap();
        let second = add_device(&store, PAD).unwrap();

        // Assert
        assert_eq!(first, Change::Added);
        assert_eq!(second, Change::AlreadyPresent);
        let doc = store.load().unwrap();
        assert_eq!(doc.devices.keys().collect::<Vec<_>>(), vec![PLACEHOLDER_DEVICE, PAD]);
        assert_eq!(doc.device(PAD), Some(&DeviceRecord::starter()));
    }

    #[test]
    fn test_add_device_keeps_existing_record() {
        let (_dir, store) = temp_store();
        add_device(&store, PAD).unwrap();
        store
            .update(|doc| doc.devices.get_mut(PAD).unwrap().nickname = Some("Mine".into()))
            .unwrap();

        add_device(&store, PAD).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.device(PAD).unwrap().nickname.as_deref(), Some("Mine"));
    }

    // ── add_layer ─────────────────────────────────────────────────────────────

    #[test]
    fn test_add_layer_creates_device_and_layer() {
        let (_dir, store) = temp_store();

        let change = add_layer(&store, PAD, "alt").unwrap();

        assert_eq!(change, Change::Added);
        let doc = store.load().unwrap();
        let layers: Vec<_> = doc.device(PAD).unwrap().layers.keys().collect();
        assert_eq!(layers, vec!["main", "alt"]);
    }

    #[test]
    fn test_add_layer_is_idempotent() {
        let (_dir, store) = temp_store();

        add_layer(&store, PAD, "main").unwrap();
        let change = add_layer(&store, PAD, "main").unwrap();

        assert_eq!(change, Change::AlreadyPresent);
    }

    // ── add_keybind ───────────────────────────────────────────────────────────

    #[test]
    fn test_add_keybind_stores_decoded_action() {
        // Arrange
        let (_dir, store) = temp_store();

        // Act
        let change = add_keybind(&store, PAD, "alt", "KEY_5", "keyboard", "KEY_A").unwrap();

        // Assert
        assert_eq!(change, Change::Added);
        let doc = store.load().unwrap();
        let bound = doc.device(PAD).unwrap().layers.get("alt").unwrap().keybinds.get("KEY_5");
        assert_eq!(
            bound,
            Some(&Action::Keyboard(KeyboardAction::Single(KeyOp::Press {
                key: "KEY_A".into(),
                hold: None,
            })))
        );
    }

    #[test]
    fn test_add_keybind_never_overwrites() {
        let (_dir, store) = temp_store();
        add_keybind(&store, PAD, "main", "KEY_9", "shell", "echo one").unwrap();

        let change = add_keybind(&store, PAD, "main", "KEY_9", "shell", "echo two").unwrap();

        assert_eq!(change, Change::AlreadyPresent);
        let doc = store.load().unwrap();
        let bound = doc.device(PAD).unwrap().layers.get("main").unwrap().keybinds.get("KEY_9");
        assert_eq!(bound, Some(&Action::Shell("echo one".into())));
    }

    #[test]
    fn test_add_keybind_rejects_unknown_type_without_writing() {
        let (_dir, store) = temp_store();

        let result = add_keybind(&store, PAD, "main", "KEY_9", "launch", "x");

        assert!(matches!(result, Err(ManageError::UnknownActionType(_))));
        assert!(!store.path().exists());
    }

    // ── list_devices ──────────────────────────────────────────────────────────

    #[test]
    fn test_list_devices_reports_names_and_layers() {
        let (_dir, store) = temp_store();
        add_layer(&store, "/dev/input/by-id/usb-very-long-name", "alt").unwrap();

        let rows = list_devices(&store, &EngineSettings::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device_id, PLACEHOLDER_DEVICE);
        assert_eq!(rows[0].name, "NotARealDevice");
        assert_eq!(rows[1].layers, vec!["main".to_string(), "alt".to_string()]);
    }
}
