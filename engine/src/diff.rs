//! Diff detection between a snapshot and the live store.
//!
//! # Algorithm
//!
//! Each entity type is matched on its natural key, never on surrogate ids:
//!
//! 1. Books by ISBN/token: snapshot-only → addition, live-only → deletion,
//!    present in both with differing fields → modification
//! 2. Locations by `"{name}:{type}"`: additions and deletions only
//! 3. Ownerships by `"{user}:{isbn}:{location}"` after translating snapshot
//!    location ids through a [`LocationRemap`]: additions and deletions only
//!
//! Snapshot ownerships whose location cannot be translated are reported in
//! [`DiffResult::unresolved`] instead of being dropped.
//!
//! Detection is read-only and deterministic: results are emitted in
//! ascending key order per type.

use crate::{
    error::Result, remap::OwnershipResolution, Book, BookDraft, EntityStore, LiveState, Location,
    LocationId, LocationKey, LocationRemap, Ownership, OwnershipKey, Snapshot, SnapshotBook,
    SnapshotLocation, SnapshotOwnership,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single classified record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum Difference {
    Book(BookDiff),
    Location(LocationDiff),
    Ownership(OwnershipDiff),
}

impl Difference {
    /// The identity a caller uses to select a side for this difference.
    pub fn entity_id(&self) -> &str {
        match self {
            Difference::Book(d) => &d.entity_id,
            Difference::Location(d) => &d.entity_id,
            Difference::Ownership(d) => &d.entity_id,
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            Difference::Book(_) => "book",
            Difference::Location(_) => "location",
            Difference::Ownership(_) => "ownership",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDiff {
    pub entity_id: String,
    pub database: Option<Book>,
    pub import: Option<SnapshotBook>,
    /// Names of differing fields; only set for modifications
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_changed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDiff {
    pub entity_id: String,
    pub database: Option<Location>,
    pub import: Option<SnapshotLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipDiff {
    pub entity_id: String,
    pub database: Option<Ownership>,
    pub import: Option<SnapshotOwnership>,
}

/// Why a snapshot ownership could not be matched against live ownerships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Its location is itself new; applying the import creates both.
    LocationPending,
    /// Another location already holds the name with a different type.
    LocationConflict,
    /// The referenced id is not among the snapshot's locations.
    LocationMissing,
}

/// A snapshot ownership left out of the addition/deletion buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedOwnership {
    pub import: SnapshotOwnership,
    /// `"{name}:{type}"` of the referenced snapshot location, when known
    pub location_key: Option<String>,
    pub reason: UnresolvedReason,
    /// For a conflict, `"{name}:{type}"` of the location holding the name.
    /// Selecting a live one for deletion lets the import replace it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts_with: Option<String>,
}

/// Output of a diff run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub additions: Vec<Difference>,
    pub modifications: Vec<Difference>,
    pub deletions: Vec<Difference>,
    #[serde(default)]
    pub unresolved: Vec<UnresolvedOwnership>,
}

impl DiffResult {
    /// No changes of any kind.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty()
            && self.modifications.is_empty()
            && self.deletions.is_empty()
            && self.unresolved.is_empty()
    }

    /// Total number of classified differences (unresolved excluded).
    pub fn len(&self) -> usize {
        self.additions.len() + self.modifications.len() + self.deletions.len()
    }
}

/// Read `user_id`'s live state from `store` and diff it against `snapshot`.
pub async fn detect_diff<S: EntityStore + ?Sized>(
    store: &S,
    user_id: &str,
    snapshot: &Snapshot,
) -> Result<DiffResult> {
    let live = LiveState::load(store, user_id).await?;
    let result = detect(user_id, snapshot, &live);
    tracing::debug!(
        user_id,
        additions = result.additions.len(),
        modifications = result.modifications.len(),
        deletions = result.deletions.len(),
        unresolved = result.unresolved.len(),
        "diff detected"
    );
    Ok(result)
}

/// Classify every record of `snapshot` and `live` for `user_id`.
pub fn detect(user_id: &str, snapshot: &Snapshot, live: &LiveState) -> DiffResult {
    let mut result = DiffResult::default();
    diff_books(snapshot, live, &mut result);
    diff_locations(snapshot, live, &mut result);
    diff_ownerships(user_id, snapshot, live, &mut result);
    result
}

fn diff_books(snapshot: &Snapshot, live: &LiveState, result: &mut DiffResult) {
    let live_books: BTreeMap<&str, &Book> =
        live.books.iter().map(|b| (b.isbn.as_str(), b)).collect();
    let snapshot_books: BTreeMap<&str, (&SnapshotBook, BookDraft)> = snapshot
        .data
        .books
        .iter()
        .filter_map(|b| Some((b.key()?, (b, b.draft()?))))
        .collect();

    for (&key, (incoming, draft)) in &snapshot_books {
        match live_books.get(key) {
            None => result.additions.push(Difference::Book(BookDiff {
                entity_id: key.to_string(),
                database: None,
                import: Some((*incoming).clone()),
                fields_changed: Vec::new(),
            })),
            Some(existing) => {
                let fields_changed = draft.changed_fields(existing);
                if !fields_changed.is_empty() {
                    result.modifications.push(Difference::Book(BookDiff {
                        entity_id: key.to_string(),
                        database: Some((*existing).clone()),
                        import: Some((*incoming).clone()),
                        fields_changed,
                    }));
                }
            }
        }
    }

    for (&key, existing) in &live_books {
        if !snapshot_books.contains_key(key) {
            result.deletions.push(Difference::Book(BookDiff {
                entity_id: key.to_string(),
                database: Some((*existing).clone()),
                import: None,
                fields_changed: Vec::new(),
            }));
        }
    }
}

fn diff_locations(snapshot: &Snapshot, live: &LiveState, result: &mut DiffResult) {
    let live_locations: BTreeMap<LocationKey, &Location> = live
        .locations
        .iter()
        .map(|l| (LocationKey::new(l.name.clone(), l.kind), l))
        .collect();
    let snapshot_locations: BTreeMap<LocationKey, &SnapshotLocation> = snapshot
        .data
        .locations
        .iter()
        .filter_map(|l| Some((l.key()?, l)))
        .collect();

    for (key, incoming) in &snapshot_locations {
        if !live_locations.contains_key(key) {
            result.additions.push(Difference::Location(LocationDiff {
                entity_id: key.to_string(),
                database: None,
                import: Some((*incoming).clone()),
            }));
        }
    }

    for (key, existing) in &live_locations {
        if !snapshot_locations.contains_key(key) {
            result.deletions.push(Difference::Location(LocationDiff {
                entity_id: key.to_string(),
                database: Some((*existing).clone()),
                import: None,
            }));
        }
    }
}

fn diff_ownerships(user_id: &str, snapshot: &Snapshot, live: &LiveState, result: &mut DiffResult) {
    let remap = LocationRemap::by_natural_key(&snapshot.data.locations, &live.locations);

    let live_ownerships: BTreeMap<OwnershipKey, &Ownership> = live
        .ownerships
        .iter()
        .filter(|o| o.user_id == user_id)
        .map(|o| (OwnershipKey::new(o.user_id.clone(), o.isbn.clone(), o.location_id), o))
        .collect();

    let mut snapshot_ownerships: BTreeMap<OwnershipKey, &SnapshotOwnership> = BTreeMap::new();
    for ownership in &snapshot.data.ownerships {
        match remap.resolve(user_id, ownership) {
            OwnershipResolution::Resolved(key) => {
                snapshot_ownerships.insert(key, ownership);
            }
            OwnershipResolution::Unmapped(location_id) => {
                result
                    .unresolved
                    .push(unresolved(ownership, location_id, snapshot, live));
            }
            OwnershipResolution::ForeignOwner | OwnershipResolution::Unkeyed => {}
        }
    }

    for (key, incoming) in &snapshot_ownerships {
        if !live_ownerships.contains_key(key) {
            result.additions.push(Difference::Ownership(OwnershipDiff {
                entity_id: key.to_string(),
                database: None,
                import: Some((*incoming).clone()),
            }));
        }
    }

    for (key, existing) in &live_ownerships {
        if !snapshot_ownerships.contains_key(key) {
            result.deletions.push(Difference::Ownership(OwnershipDiff {
                entity_id: key.to_string(),
                database: Some((*existing).clone()),
                import: None,
            }));
        }
    }
}

fn unresolved(
    ownership: &SnapshotOwnership,
    location_id: LocationId,
    snapshot: &Snapshot,
    live: &LiveState,
) -> UnresolvedOwnership {
    let locations = &snapshot.data.locations;
    let referenced = locations
        .iter()
        .position(|l| l.id == Some(location_id))
        .and_then(|at| Some((at, locations[at].key()?)));

    let (reason, conflicts_with) = match &referenced {
        None => (UnresolvedReason::LocationMissing, None),
        Some((at, key)) => {
            // A live location takes the name first, then earlier snapshot
            // entries in the order the merge creates them
            let live_holder = live
                .locations
                .iter()
                .find(|l| l.name == key.name() && l.kind != key.kind())
                .map(|l| LocationKey::new(l.name.clone(), l.kind));
            let holder = live_holder.or_else(|| {
                locations[..*at]
                    .iter()
                    .filter_map(SnapshotLocation::key)
                    .find(|earlier| earlier.name() == key.name() && earlier.kind() != key.kind())
            });
            match holder {
                Some(holder) => (UnresolvedReason::LocationConflict, Some(holder.to_string())),
                None => (UnresolvedReason::LocationPending, None),
            }
        }
    };

    UnresolvedOwnership {
        import: ownership.clone(),
        location_key: referenced.map(|(_, key)| key.to_string()),
        reason,
        conflicts_with,
    }
}
