//! # Shelf Engine
//!
//! Import reconciliation for a personal book inventory.
//!
//! A user's collection (books, the locations that hold them, and the
//! ownerships linking the two) can be exported as a JSON [`Snapshot`] and
//! later re-imported, on the same installation or another one. Re-importing
//! is a two-step process:
//!
//! 1. [`detect_diff`] compares the snapshot against the live store and
//!    classifies every record into additions, modifications and deletions
//! 2. [`apply_import`] writes the merge, honouring a per-record
//!    [`Selection`] of which side wins
//!
//! ## Design Principles
//!
//! - **Natural keys**: records are matched by ISBN, `(name, type)` and
//!   `(user, isbn, location)`, never by storage-assigned ids
//! - **Deterministic**: the same snapshot and live state always classify
//!   the same way
//! - **Explicit conflicts**: nothing existing is changed or deleted unless
//!   the caller selects it; only additions apply by default
//! - **Pluggable storage**: all persistence goes through [`EntityStore`];
//!   [`MemoryStore`] is the in-memory implementation
//!
//! ## Identities
//!
//! | Entity    | `entity_id`                         |
//! |-----------|-------------------------------------|
//! | Book      | `"{isbn}"`                          |
//! | Location  | `"{name}:{type}"`                   |
//! | Ownership | `"{user_id}:{isbn}:{location_id}"`  |
//!
//! Ownership ids always use the *live* location id; see [`LocationRemap`].
//!
//! ## Quick Start
//!
//! ```rust
//! use shelf_engine::{diff, parse_snapshot, LiveState};
//! use serde_json::json;
//!
//! // 1. Validate an uploaded document
//! let snapshot = parse_snapshot(&json!({
//!     "version": "1.0",
//!     "exported_at": "2024-03-01T10:00:00.000Z",
//!     "data": {
//!         "books": [{"isbn": "9784088725093", "title": "One Piece 1"}],
//!         "locations": [],
//!         "ownerships": []
//!     }
//! }))
//! .unwrap();
//!
//! // 2. Classify it against the live state (empty here)
//! let result = diff::detect("user-1", &snapshot, &LiveState::default());
//! assert_eq!(result.additions.len(), 1);
//! assert_eq!(result.additions[0].entity_id(), "9784088725093");
//! ```
//!
//! ## Errors
//!
//! Store implementations report failures with the closed set of kinds in
//! [`Error`]; the merge applicator tolerates `DuplicateEntity` while adding
//! ownerships, `ReferentialConstraint` while deleting books and `NotFound`
//! while deleting locations, and propagates everything else.

pub mod diff;
pub mod error;
pub mod keys;
pub mod merge;
pub mod model;
pub mod remap;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use diff::{
    detect_diff, BookDiff, DiffResult, Difference, LocationDiff, OwnershipDiff,
    UnresolvedOwnership, UnresolvedReason,
};
pub use error::Error;
pub use keys::{LocationKey, OwnershipKey, KEY_DELIMITER};
pub use merge::{apply_import, ChangeKind, ImportSummary, Priority, Selection, Selections};
pub use model::{Book, BookDraft, Location, LocationType, Ownership};
pub use remap::{LocationRemap, OwnershipResolution};
pub use snapshot::{
    parse_snapshot, Snapshot, SnapshotBook, SnapshotData, SnapshotLocation, SnapshotOwnership,
    SnapshotSummary, SNAPSHOT_VERSION,
};
pub use store::{EntityStore, LiveState, MemoryStore};

/// Type aliases for clarity
pub type UserId = String;
pub type BookKey = String;
pub type LocationId = i64;
pub type OwnershipId = i64;
