//! Storage infrastructure: the persistent configuration store.
//!
//! Sessions never cache the configuration.  They ask a [`ConfigSource`] for
//! a fresh [`ConfigDocument`] on every key-down, which is what makes live
//! editing of the JSON file take effect without a restart.
//!
//! - [`config::JsonConfigStore`] reads and writes the JSON file on disk.
//! - [`MemoryConfigStore`] keeps the document in memory for tests.

use std::sync::{Mutex, PoisonError};

use keysboard_core::ConfigDocument;

pub mod config;

pub use config::{ConfigError, JsonConfigStore};

/// Anything that can produce a fresh configuration snapshot.
pub trait ConfigSource: Send + Sync {
    /// Reads the current document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the store cannot be read or its content
    /// does not describe a configuration.
    fn snapshot(&self) -> Result<ConfigDocument, ConfigError>;
}

impl ConfigSource for JsonConfigStore {
    fn snapshot(&self) -> Result<ConfigDocument, ConfigError> {
        let mut document = self.load()?;
        document.normalize();
        Ok(document)
    }
}

/// An in-memory store; tests edit it between key presses.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    document: Mutex<ConfigDocument>,
}

impl MemoryConfigStore {
    pub fn new(document: ConfigDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    /// Applies `edit` to the stored document.
    pub fn update(&self, edit: impl FnOnce(&mut ConfigDocument)) {
        edit(&mut self.document.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ConfigSource for MemoryConfigStore {
    fn snapshot(&self) -> Result<ConfigDocument, ConfigError> {
        let mut document = self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        document.normalize();
        Ok(document)
    }
}
