//! JSON-based persistence for the keysboard configuration.
//!
//! The store is a single JSON file, by default
//! `~/.config/keysboard/keysboard-conf.json` (or under `$XDG_CONFIG_HOME`).
//! A different file can be chosen with `--config` or `KEYSBOARD_CONFIG`.
//!
//! # Document shape (for beginners)
//!
//! ```json
//! {
//!     "devices": {
//!         "/dev/input/by-id/usb-Keypad-event-kbd": {
//!             "device_nickname": "Keypad",
//!             "exit_key": "KEY_ESC",
//!             "exit_cmd": "echo bye",
//!             "aliases": {},
//!             "layers": {
//!                 "main": {
//!                     "keybinds": {
//!                         "KEY_1": { "action_type": "set_layer", "action": "alt" }
//!                     }
//!                 },
//!                 "alt": {
//!                     "keybinds": { "KEY_2": { "action": "echo hi" } },
//!                     "inherit": "main"
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Every field of a device record is optional; missing fields take their
//! defaults when the document is parsed.  Fields, devices, layers and keybinds
//! that do not decode are logged and skipped, so one bad hand edit does not
//! disable every device.
//!
//! # First run and corruption
//!
//! | File state                 | What `load` does                                   |
//! |----------------------------|----------------------------------------------------|
//! | missing                    | writes the starter document and returns it         |
//! | not valid JSON (or empty)  | writes the starter document with the old text kept |
//! |                            | under `"backup"`, and returns it                   |
//! | top level is not an object | returns [`ConfigError::Schema`], file untouched    |

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use keysboard_core::ConfigDocument;
use serde::Serialize;
use serde_json::{error::Category, ser::PrettyFormatter, Serializer};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming the store file.
pub const CONFIG_ENV_VAR: &str = "KEYSBOARD_CONFIG";

const CONFIG_DIR_NAME: &str = "keysboard";
const CONFIG_FILE_NAME: &str = "keysboard-conf.json";

/// Saved documents are indented with four spaces.
const INDENT: &[u8] = b"    ";

/// Error type for configuration store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine the config directory (set HOME or --config)")]
    NoPlatformConfigDir,
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is valid JSON but not a keysboard configuration.
    #[error("config at {path} has an invalid layout: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The document could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Path resolution ───────────────────────────────────────────────────────────

/// The default store path: `<config dir>/keysboard/keysboard-conf.json`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolves the store path from an explicit argument or the default.
///
/// A leading `~/` in `explicit` is expanded to `$HOME`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if no path was given and the
/// default cannot be determined.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(expand_home(path, std::env::var_os("HOME").map(PathBuf::from))),
        None => default_config_path(),
    }
}

fn expand_home(path: &str, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// `$XDG_CONFIG_HOME`, or `~/.config`.
fn platform_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// The JSON file holding every device's configuration.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document, creating or repairing the file as described in
    /// the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read or (re)written
    /// and [`ConfigError::Schema`] if it holds JSON of the wrong shape.
    pub fn load(&self) -> Result<ConfigDocument, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let document = ConfigDocument::starter();
                self.save(&document)?;
                info!("created a new config at {}", self.path.display());
                return Ok(document);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        // Parsed straight from text: going through `Value` would sort the keys.
        match serde_json::from_str::<ConfigDocument>(&text) {
            Ok(document) => Ok(document),
            Err(source) if source.classify() == Category::Data => Err(ConfigError::Schema {
                path: self.path.clone(),
                source,
            }),
            Err(e) => {
                warn!(
                    "config at {} is not valid JSON ({e}); regenerating it with the old text kept under \"backup\"",
                    self.path.display()
                );
                let document = ConfigDocument {
                    backup: Some(text),
                    ..ConfigDocument::starter()
                };
                self.save(&document)?;
                Ok(document)
            }
        }
    }

    /// Writes `document`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save(&self, document: &ConfigDocument) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut buffer = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
        document.serialize(&mut serializer)?;

        std::fs::write(&self.path, buffer).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Read-modify-write: loads the document, applies `edit`, saves it.
    ///
    /// # Errors
    ///
    /// Propagates [`load`](Self::load) and [`save`](Self::save) errors.
    pub fn update<T>(
        &self,
        edit: impl FnOnce(&mut ConfigDocument) -> T,
    ) -> Result<T, ConfigError> {
        let mut document = self.load()?;
        let out = edit(&mut document);
        self.save(&document)?;
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
