//! Alias Guard: cycle protection for alias expansion.
//!
//! A guard is created fresh for each key-down dispatch and dropped when that
//! dispatch's action tree has finished.  It holds, in entry order, the alias
//! names currently being expanded.  An alias whose name is already present is
//! a recursive call and is skipped.

/// Ordered, duplicate-free set of alias names being expanded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AliasGuard {
    active: Vec<String>,
}

impl AliasGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` is currently being expanded.
    pub fn contains(&self, name: &str) -> bool {
        self.active.iter().any(|n| n == name)
    }

    /// Marks `name` as being expanded.
    ///
    /// Returns `false` (and leaves the guard unchanged) if `name` is already
    /// present, i.e. entering it would be a cycle.
    pub fn enter(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.active.push(name.to_string());
        true
    }

    /// Removes `name` from the guard if present.
    pub fn release(&mut self, name: &str) {
        self.active.retain(|n| n != name);
    }

    /// The names being expanded, outermost first.
    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
