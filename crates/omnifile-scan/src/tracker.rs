//! Cycle detection for one walk.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::session::DirKey;

/// Directories entered during a walk, keyed by [`DirKey`].
///
/// Only consulted for sessions that report a key. A symbolic link back to
/// an ancestor resolves to a key that is already present.
#[derive(Debug, Default)]
pub struct DirectoryTracker {
    entered: DashMap<DirKey, String>,
}

impl DirectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the directory at `path` as entered.
    ///
    /// Returns the path the same directory was first entered through, or
    /// `None` if it is new.
    pub fn enter(&self, key: DirKey, path: &str) -> Option<String> {
        match self.entered.entry(key) {
            Entry::Occupied(first) => Some(first.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(path.to_string());
                None
            }
        }
    }
}
