//! Translation of snapshot location ids into live location ids.
//!
//! Location ids are assigned independently by every store, so an ownership
//! read from a snapshot can only be compared with live ownerships after its
//! `location_id` has been mapped onto the live location with the same
//! natural key.

use crate::{Location, LocationId, LocationKey, OwnershipKey, SnapshotLocation, SnapshotOwnership};
use std::collections::HashMap;

/// Snapshot location id → live location id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationRemap {
    ids: HashMap<LocationId, LocationId>,
}

/// What a snapshot ownership turns into for a given user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipResolution {
    /// Key of the ownership in live ids.
    Resolved(OwnershipKey),
    /// Belongs to another user; never considered.
    ForeignOwner,
    /// Missing its book key or location id.
    Unkeyed,
    /// Its location has no live counterpart.
    Unmapped(LocationId),
}

impl LocationRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match snapshot locations onto live ones by `(name, type)`.
    ///
    /// Snapshot locations without an id, a name or a type, and those with no
    /// live counterpart, are left out.
    pub fn by_natural_key(snapshot: &[SnapshotLocation], live: &[Location]) -> Self {
        let live_ids: HashMap<LocationKey, LocationId> = live
            .iter()
            .map(|l| (LocationKey::new(l.name.clone(), l.kind), l.id))
            .collect();

        let mut remap = Self::new();
        for location in snapshot {
            if let (Some(snapshot_id), Some(key)) = (location.id, location.key()) {
                if let Some(&live_id) = live_ids.get(&key) {
                    remap.insert(snapshot_id, live_id);
                }
            }
        }
        remap
    }

    pub fn insert(&mut self, snapshot_id: LocationId, live_id: LocationId) {
        self.ids.insert(snapshot_id, live_id);
    }

    pub fn get(&self, snapshot_id: LocationId) -> Option<LocationId> {
        self.ids.get(&snapshot_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolve a snapshot ownership on behalf of `user_id`.
    pub fn resolve(&self, user_id: &str, ownership: &SnapshotOwnership) -> OwnershipResolution {
        if ownership.user_id.as_deref() != Some(user_id) {
            return OwnershipResolution::ForeignOwner;
        }
        let (Some(isbn), Some(snapshot_location)) = (
            ownership.isbn.as_deref().filter(|isbn| !isbn.is_empty()),
            ownership.location_id,
        ) else {
            return OwnershipResolution::Unkeyed;
        };

        match self.get(snapshot_location) {
            Some(live_location) => {
                OwnershipResolution::Resolved(OwnershipKey::new(user_id, isbn, live_location))
            }
            None => OwnershipResolution::Unmapped(snapshot_location),
        }
    }
}
