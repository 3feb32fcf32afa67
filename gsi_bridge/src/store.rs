//! # Snapshot Store
//!
//! Holds the latest typed snapshot behind a single mutex. `apply` commits a
//! whole delta inside one critical section, so readers never observe a
//! half-updated snapshot. Request rates are a few updates per second at
//! most; one coarse lock is sufficient.

use std::sync::Mutex;

use crate::model::{Snapshot, SnapshotDelta};

pub struct SnapshotStore {
    inner: Mutex<Snapshot>,
}

impl SnapshotStore {
    /// Creates the store holding the all-defaults (invalid) snapshot.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Snapshot::default()),
        }
    }

    /// Atomically applies one delta. Sections the delta does not carry are
    /// left untouched; ability/item lists are replaced wholesale.
    pub fn apply(&self, delta: SnapshotDelta) {
        let mut snap = self.inner.lock().expect("SnapshotStore lock poisoned");
        if let Some(provider) = delta.provider {
            snap.provider = provider;
        }
        if let Some(map) = delta.map {
            snap.map = map;
        }
        if let Some(player) = delta.player {
            snap.player = player;
        }
        if let Some(hero) = delta.hero {
            snap.hero = hero;
        }
        if let Some(abilities) = delta.abilities {
            snap.abilities = abilities;
        }
        if let Some(items) = delta.items {
            snap.items = items;
        }
    }

    /// Returns a consistent copy of the current snapshot.
    pub fn read(&self) -> Snapshot {
        self.inner.lock().expect("SnapshotStore lock poisoned").clone()
    }

    /// Restores the all-defaults state.
    pub fn reset(&self) {
        *self.inner.lock().expect("SnapshotStore lock poisoned") = Snapshot::default();
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
