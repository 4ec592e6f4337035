//! Merge application: writes a reviewed import into the live store.
//!
//! # Phases
//!
//! 1. Materialize every snapshot location (find, create, or replace a live
//!    location whose type changed) and build the location remap
//! 2. Create or update books
//! 3. Create ownerships present in the snapshot
//! 4. Delete live ownerships absent from the snapshot
//! 5. Delete owned books absent from the snapshot
//! 6. Delete live locations absent from the snapshot
//!
//! Phases run strictly in this order: ownerships need their books and
//! locations, and deletions come last so nothing left behind dangles. A
//! failure aborts the remaining phases; work already written stays written.

use crate::{
    error::Result, remap::OwnershipResolution, Book, BookDraft, EntityStore, Error, LocationKey,
    LocationRemap, OwnershipKey, Snapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Which side wins for one difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Keep the live store as it is
    Database,
    /// Apply the incoming addition, change or deletion
    Import,
}

/// A caller's choice for one difference, addressed by its `entity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub entity_id: String,
    pub priority: Priority,
}

impl Selection {
    pub fn new(entity_id: impl Into<String>, priority: Priority) -> Self {
        Self {
            entity_id: entity_id.into(),
            priority,
        }
    }
}

/// The kind of change a priority is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    BookAddition,
    BookModification,
    OwnershipAddition,
    OwnershipDeletion,
    BookDeletion,
    LocationDeletion,
}

impl ChangeKind {
    /// Priority used when the caller made no selection.
    ///
    /// Additions apply by default; modifications and deletions of existing
    /// data only happen when explicitly selected.
    pub fn default_priority(self) -> Priority {
        match self {
            ChangeKind::BookAddition | ChangeKind::OwnershipAddition => Priority::Import,
            ChangeKind::BookModification
            | ChangeKind::OwnershipDeletion
            | ChangeKind::BookDeletion
            | ChangeKind::LocationDeletion => Priority::Database,
        }
    }
}

/// Caller selections indexed by entity id. Later entries win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    priorities: HashMap<String, Priority>,
}

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the selection for `entity_id`.
    pub fn select(mut self, entity_id: impl Into<String>, priority: Priority) -> Self {
        self.priorities.insert(entity_id.into(), priority);
        self
    }

    /// The priority for `entity_id`, falling back to the default of `kind`.
    pub fn resolve_priority(&self, entity_id: &str, kind: ChangeKind) -> Priority {
        self.priorities
            .get(entity_id)
            .copied()
            .unwrap_or_else(|| kind.default_priority())
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }
}

impl FromIterator<Selection> for Selections {
    fn from_iter<I: IntoIterator<Item = Selection>>(iter: I) -> Self {
        Self {
            priorities: iter
                .into_iter()
                .map(|s| (s.entity_id, s.priority))
                .collect(),
        }
    }
}

/// Counts of books and ownerships written by an import.
///
/// Locations created or deleted along the way are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

/// Apply `snapshot` to `user_id`'s data according to `selections`.
pub async fn apply_import<S: EntityStore + ?Sized>(
    store: &S,
    user_id: &str,
    snapshot: &Snapshot,
    selections: &Selections,
) -> Result<ImportSummary> {
    let summary = MergeApplicator::new(store, user_id, selections)
        .run(snapshot)
        .await?;
    tracing::info!(
        user_id,
        added = summary.added,
        modified = summary.modified,
        deleted = summary.deleted,
        "import applied"
    );
    Ok(summary)
}

/// Walks the merge phases for one user, accumulating the summary.
struct MergeApplicator<'a, S: ?Sized> {
    store: &'a S,
    user_id: &'a str,
    selections: &'a Selections,
    summary: ImportSummary,
}

impl<'a, S: EntityStore + ?Sized> MergeApplicator<'a, S> {
    fn new(store: &'a S, user_id: &'a str, selections: &'a Selections) -> Self {
        Self {
            store,
            user_id,
            selections,
            summary: ImportSummary::default(),
        }
    }

    async fn run(mut self, snapshot: &Snapshot) -> Result<ImportSummary> {
        // Deletion candidates are the books held before anything changes
        let owned_books = self.store.list_books_by_owner(self.user_id).await?;

        let remap = self.materialize_locations(snapshot).await?;
        self.apply_books(snapshot, &owned_books).await?;
        let incoming = self.add_ownerships(snapshot, &remap).await?;
        self.remove_ownerships(&incoming).await?;
        self.remove_books(snapshot, &owned_books).await?;
        self.remove_locations(snapshot).await?;

        Ok(self.summary)
    }

    /// Phase 1. Runs regardless of selections: later phases need live ids.
    ///
    /// A live location holding the name with another type is replaced only
    /// when it is absent from the snapshot and its deletion was selected.
    async fn materialize_locations(&self, snapshot: &Snapshot) -> Result<LocationRemap> {
        let mut remap = LocationRemap::new();
        let incoming: HashSet<LocationKey> = snapshot
            .data
            .locations
            .iter()
            .filter_map(|l| l.key())
            .collect();

        for location in &snapshot.data.locations {
            let Some(key) = location.key() else {
                continue;
            };

            let live = match self
                .store
                .find_location_by_name(self.user_id, key.name())
                .await?
            {
                Some(existing) if existing.kind == key.kind() => existing,
                Some(existing) => {
                    let existing_key = LocationKey::new(existing.name.clone(), existing.kind);
                    let replace = !incoming.contains(&existing_key)
                        && self
                            .selections
                            .resolve_priority(&existing_key.to_string(), ChangeKind::LocationDeletion)
                            == Priority::Import;
                    if !replace {
                        tracing::warn!(
                            user_id = self.user_id,
                            location = %key,
                            existing_type = %existing.kind,
                            "location name already used with another type; not mapped"
                        );
                        continue;
                    }

                    tracing::debug!(from = %existing_key, to = %key, "replacing location");
                    self.store.delete_location(self.user_id, existing.id).await?;
                    self.store
                        .create_location(self.user_id, key.name(), key.kind())
                        .await?
                }
                None => {
                    self.store
                        .create_location(self.user_id, key.name(), key.kind())
                        .await?
                }
            };

            if let Some(snapshot_id) = location.id {
                remap.insert(snapshot_id, live.id);
            }
        }

        tracing::debug!(mapped = remap.len(), "locations materialized");
        Ok(remap)
    }

    /// Phase 2.
    async fn apply_books(&mut self, snapshot: &Snapshot, owned_books: &[Book]) -> Result<()> {
        let owned: HashSet<&str> = owned_books.iter().map(|b| b.isbn.as_str()).collect();
        let drafts: BTreeMap<&str, BookDraft> = snapshot
            .data
            .books
            .iter()
            .filter_map(|b| Some((b.key()?, b.draft()?)))
            .collect();

        for (key, draft) in drafts {
            let kind = if owned.contains(key) {
                ChangeKind::BookModification
            } else {
                ChangeKind::BookAddition
            };
            if self.selections.resolve_priority(key, kind) != Priority::Import {
                continue;
            }

            if self.store.find_book(key).await?.is_some() {
                self.store.update_book(&draft).await?;
                self.summary.modified += 1;
            } else {
                self.store.create_book(&draft).await?;
                self.summary.added += 1;
            }
        }
        Ok(())
    }

    /// Phase 3. Returns the snapshot's ownership set in live ids.
    async fn add_ownerships(
        &mut self,
        snapshot: &Snapshot,
        remap: &LocationRemap,
    ) -> Result<HashSet<OwnershipKey>> {
        let mut incoming = HashSet::new();

        for ownership in &snapshot.data.ownerships {
            let OwnershipResolution::Resolved(key) = remap.resolve(self.user_id, ownership) else {
                continue;
            };
            if !incoming.insert(key.clone()) {
                continue;
            }

            let entity_id = key.to_string();
            if self
                .selections
                .resolve_priority(&entity_id, ChangeKind::OwnershipAddition)
                != Priority::Import
            {
                continue;
            }

            match self
                .store
                .create_ownership(self.user_id, key.isbn(), key.location_id())
                .await
            {
                Ok(_) => self.summary.added += 1,
                Err(Error::DuplicateEntity(reason)) => {
                    tracing::debug!(ownership = %entity_id, %reason, "ownership already exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(incoming)
    }

    /// Phase 4.
    async fn remove_ownerships(&mut self, incoming: &HashSet<OwnershipKey>) -> Result<()> {
        for ownership in self.store.list_ownerships_by_owner(self.user_id).await? {
            let key = OwnershipKey::new(
                ownership.user_id.clone(),
                ownership.isbn.clone(),
                ownership.location_id,
            );
            if incoming.contains(&key) {
                continue;
            }
            if self
                .selections
                .resolve_priority(&key.to_string(), ChangeKind::OwnershipDeletion)
                == Priority::Import
            {
                self.store
                    .delete_ownership(self.user_id, ownership.id)
                    .await?;
                self.summary.deleted += 1;
            }
        }
        Ok(())
    }

    /// Phase 5. Books still referenced by any ownership stay.
    async fn remove_books(&mut self, snapshot: &Snapshot, owned_books: &[Book]) -> Result<()> {
        let incoming: HashSet<&str> = snapshot.data.books.iter().filter_map(|b| b.key()).collect();

        for book in owned_books {
            if incoming.contains(book.isbn.as_str()) {
                continue;
            }
            if self
                .selections
                .resolve_priority(&book.isbn, ChangeKind::BookDeletion)
                != Priority::Import
            {
                continue;
            }

            match self.store.delete_book(&book.isbn).await {
                Ok(()) => self.summary.deleted += 1,
                Err(Error::ReferentialConstraint(reason)) => {
                    tracing::debug!(isbn = %book.isbn, %reason, "book still referenced; kept");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Phase 6. The store removes dependent ownerships with the location.
    async fn remove_locations(&mut self, snapshot: &Snapshot) -> Result<()> {
        let incoming: HashSet<LocationKey> = snapshot
            .data
            .locations
            .iter()
            .filter_map(|l| l.key())
            .collect();

        for location in self.store.list_locations_by_owner(self.user_id).await? {
            let key = LocationKey::new(location.name.clone(), location.kind);
            if incoming.contains(&key) {
                continue;
            }
            if self
                .selections
                .resolve_priority(&key.to_string(), ChangeKind::LocationDeletion)
                != Priority::Import
            {
                continue;
            }

            match self.store.delete_location(self.user_id, location.id).await {
                Ok(()) => {}
                Err(Error::NotFound(reason)) => {
                    tracing::debug!(location = %key, %reason, "location already gone");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
