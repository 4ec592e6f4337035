//! Snapshot documents: the unit of export and re-import.
//!
//! A snapshot is a plain JSON projection of one user's books, locations and
//! ownerships. Parsing validates only the document envelope. Entries are
//! decoded leniently: a field holding the wrong JSON type reads as absent and
//! an entry that is not an object is skipped, so every field of a snapshot
//! entity is optional and downstream code must cope with its absence.

use crate::{
    error::Result, BookDraft, BookKey, Error, LiveState, LocationId, LocationKey, LocationType,
    UserId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only snapshot format version this engine reads and writes.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Sections of `data` that must be arrays when present.
const SECTIONS: [&str; 3] = ["books", "locations", "ownerships"];

/// An exported collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: String,
    /// When the snapshot was produced (ISO-8601)
    pub exported_at: String,
    pub data: SnapshotData,
}

/// The entity sections of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default, deserialize_with = "lenient::entries")]
    pub books: Vec<SnapshotBook>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub locations: Vec<SnapshotLocation>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub ownerships: Vec<SnapshotOwnership>,
}

/// A book as written in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBook {
    #[serde(default, deserialize_with = "lenient::string")]
    pub isbn: Option<BookKey>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub thumbnail_url: Option<String>,
    /// Also read from `0` / `1`
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_doujin: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub updated_at: Option<String>,
}

impl SnapshotBook {
    /// The book key, if the entry carries a usable one.
    pub fn key(&self) -> Option<&str> {
        self.isbn.as_deref().filter(|isbn| !isbn.is_empty())
    }

    /// The fields a merge writes for this entry.
    ///
    /// Absent values take the defaults a freshly created book would have.
    pub fn draft(&self) -> Option<BookDraft> {
        Some(BookDraft {
            isbn: self.key()?.to_string(),
            title: self.title.clone().unwrap_or_default(),
            author: self.author.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            is_doujin: self.is_doujin.unwrap_or(false),
        })
    }
}

/// A location as written in a snapshot. `id` is the exporting store's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLocation {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<LocationId>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::location_type")]
    pub kind: Option<LocationType>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub updated_at: Option<String>,
}

impl SnapshotLocation {
    /// Natural key, if both name and type are present.
    pub fn key(&self) -> Option<LocationKey> {
        Some(LocationKey::new(self.name.clone()?, self.kind?))
    }
}

/// An ownership as written in a snapshot. `location_id` refers to a
/// [`SnapshotLocation::id`], not to a live location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOwnership {
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub isbn: Option<BookKey>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub location_id: Option<LocationId>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_at: Option<String>,
}

/// Field decoders that never fail: a value of the wrong JSON type reads as
/// absent.
mod lenient {
    use crate::{LocationId, LocationType};
    use serde::{de::DeserializeOwned, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<LocationId>, D::Error> {
        Ok(Value::deserialize(d)?.as_i64())
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn location_type<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<LocationType>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }

    /// Keeps the object entries of an array section; anything else is dropped.
    pub fn entries<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(values) => values
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

/// Validate a raw JSON document and re-type it as a [`Snapshot`].
///
/// Performs no IO. Unknown fields are ignored.
pub fn parse_snapshot(raw: &Value) -> Result<Snapshot> {
    let root = raw
        .as_object()
        .ok_or_else(|| invalid("snapshot must be a JSON object"))?;

    match root.get("version") {
        Some(Value::String(version)) if version == SNAPSHOT_VERSION => {}
        Some(Value::String(version)) => {
            return Err(invalid(format!(
                "unsupported snapshot version: {} (supported: {})",
                version, SNAPSHOT_VERSION
            )))
        }
        Some(_) => return Err(invalid("version must be a string")),
        None => return Err(invalid("missing version")),
    }

    match root.get("exported_at") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(invalid("exported_at must be a string")),
        None => return Err(invalid("missing exported_at")),
    }

    let data = match root.get("data") {
        Some(Value::Object(data)) => data,
        Some(_) => return Err(invalid("data must be an object")),
        None => return Err(invalid("missing data")),
    };

    for section in SECTIONS {
        if let Some(value) = data.get(section) {
            if !value.is_array() {
                return Err(invalid(format!("data.{} must be an array", section)));
            }
        }
    }

    serde_json::from_value(raw.clone()).map_err(|e| invalid(e.to_string()))
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidSnapshot(reason.into())
}

impl Snapshot {
    /// Build the export document for one user's live state.
    ///
    /// Entities are written in key order so repeated exports of the same
    /// state are byte-identical apart from `exported_at`.
    pub fn from_live(live: &LiveState, exported_at: DateTime<Utc>) -> Self {
        let mut books: Vec<_> = live
            .books
            .iter()
            .map(|book| SnapshotBook {
                isbn: Some(book.isbn.clone()),
                title: Some(book.title.clone()),
                author: book.author.clone(),
                thumbnail_url: book.thumbnail_url.clone(),
                is_doujin: Some(book.is_doujin),
                created_at: Some(timestamp(&book.created_at)),
                updated_at: Some(timestamp(&book.updated_at)),
            })
            .collect();
        books.sort_by(|a, b| a.isbn.cmp(&b.isbn));

        let mut locations: Vec<_> = live
            .locations
            .iter()
            .map(|location| SnapshotLocation {
                id: Some(location.id),
                name: Some(location.name.clone()),
                kind: Some(location.kind),
                created_at: Some(timestamp(&location.created_at)),
                updated_at: Some(timestamp(&location.updated_at)),
            })
            .collect();
        locations.sort_by_key(|location| location.id);

        let mut ownerships: Vec<_> = live
            .ownerships
            .iter()
            .map(|ownership| SnapshotOwnership {
                user_id: Some(ownership.user_id.clone()),
                isbn: Some(ownership.isbn.clone()),
                location_id: Some(ownership.location_id),
                created_at: Some(timestamp(&ownership.created_at)),
            })
            .collect();
        ownerships.sort_by(|a, b| (&a.isbn, a.location_id).cmp(&(&b.isbn, b.location_id)));

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: timestamp(&exported_at),
            data: SnapshotData {
                books,
                locations,
                ownerships,
            },
        }
    }

    /// Parse and validate a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        parse_snapshot(&raw)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Unexpected(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Unexpected(e.to_string()))
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Counts describing a snapshot without its entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub version: String,
    pub exported_at: String,
    pub book_count: usize,
    pub location_count: usize,
    pub ownership_count: usize,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            version: snapshot.version.clone(),
            exported_at: snapshot.exported_at.clone(),
            book_count: snapshot.data.books.len(),
            location_count: snapshot.data.locations.len(),
            ownership_count: snapshot.data.ownerships.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Book, Location, Ownership};
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "version": "1.0",
            "exported_at": "2024-03-01T10:00:00.000Z",
            "data": {
                "books": [{
                    "isbn": "9784088725093",
                    "title": "One Piece 1",
                    "author": null,
                    "thumbnail_url": null,
                    "is_doujin": false,
                    "created_at": "2024-01-01T00:00:00.000Z",
                    "updated_at": "2024-01-01T00:00:00.000Z"
                }],
                "locations": [{"id": 3, "name": "Shelf", "type": "Physical"}],
                "ownerships": [{"user_id": "u1", "isbn": "9784088725093", "location_id": 3}]
            }
        })
    }

    fn assert_invalid(raw: Value) {
        let result = parse_snapshot(&raw);
        assert!(
            matches!(result, Err(Error::InvalidSnapshot(_))),
            "expected InvalidSnapshot, got {:?}",
            result
        );
    }

    #[test]
    fn parse_valid_snapshot() {
        let snapshot = parse_snapshot(&valid_document()).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.data.books.len(), 1);
        assert_eq!(snapshot.data.books[0].key(), Some("9784088725093"));
        assert_eq!(
            snapshot.data.locations[0].key(),
            Some(LocationKey::new("Shelf", LocationType::Physical))
        );
        assert_eq!(snapshot.data.ownerships[0].location_id, Some(3));
    }

    #[test]
    fn reject_non_object() {
        assert_invalid(json!([1, 2, 3]));
        assert_invalid(json!("1.0"));
    }

    #[test]
    fn reject_bad_version() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("version");
        assert_invalid(doc);

        let mut doc = valid_document();
        doc["version"] = json!(1.0);
        assert_invalid(doc);

        let mut doc = valid_document();
        doc["version"] = json!("2.0");
        assert_invalid(doc);
    }

    #[test]
    fn reject_bad_exported_at() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("exported_at");
        assert_invalid(doc);

        let mut doc = valid_document();
        doc["exported_at"] = json!(1709287200);
        assert_invalid(doc);
    }

    #[test]
    fn reject_bad_data() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("data");
        assert_invalid(doc);

        let mut doc = valid_document();
        doc["data"] = json!([]);
        assert_invalid(doc);

        for section in SECTIONS {
            let mut doc = valid_document();
            doc["data"][section] = json!({"not": "an array"});
            assert_invalid(doc);
        }
    }

    #[test]
    fn missing_sections_are_empty() {
        let doc = json!({"version": "1.0", "exported_at": "x", "data": {}});
        let snapshot = parse_snapshot(&doc).unwrap();
        assert!(snapshot.data.books.is_empty());
        assert!(snapshot.data.locations.is_empty());
        assert!(snapshot.data.ownerships.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut doc = valid_document();
        doc["app"] = json!("bookshelf");
        doc["data"]["books"][0]["publisher"] = json!("Shueisha");
        doc["data"]["tags"] = json!("not checked");
        assert!(parse_snapshot(&doc).is_ok());
    }

    #[test]
    fn mistyped_entry_fields_read_as_absent() {
        let mut doc = valid_document();
        doc["data"]["books"][0]["title"] = json!(42);
        doc["data"]["books"][0]["is_doujin"] = json!("yes");
        doc["data"]["locations"][0]["id"] = json!("3");
        doc["data"]["locations"][0]["type"] = json!("Cloud");
        doc["data"]["ownerships"][0]["user_id"] = json!(["u1"]);

        let snapshot = parse_snapshot(&doc).unwrap();
        assert_eq!(snapshot.data.books[0].key(), Some("9784088725093"));
        assert_eq!(snapshot.data.books[0].title, None);
        assert_eq!(snapshot.data.books[0].is_doujin, None);
        assert_eq!(snapshot.data.locations[0].id, None);
        assert_eq!(snapshot.data.locations[0].kind, None);
        assert_eq!(snapshot.data.locations[0].name.as_deref(), Some("Shelf"));
        assert_eq!(snapshot.data.ownerships[0].user_id, None);
        assert_eq!(snapshot.data.ownerships[0].location_id, Some(3));
    }

    #[test]
    fn doujin_flag_accepts_zero_and_one() {
        let mut doc = valid_document();
        doc["data"]["books"][0]["is_doujin"] = json!(1);
        let snapshot = parse_snapshot(&doc).unwrap();
        assert_eq!(snapshot.data.books[0].is_doujin, Some(true));

        doc["data"]["books"][0]["is_doujin"] = json!(0);
        let snapshot = parse_snapshot(&doc).unwrap();
        assert_eq!(snapshot.data.books[0].is_doujin, Some(false));

        doc["data"]["books"][0]["is_doujin"] = json!(2);
        let snapshot = parse_snapshot(&doc).unwrap();
        assert_eq!(snapshot.data.books[0].is_doujin, None);
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let mut doc = valid_document();
        doc["data"]["books"] = json!([null, 7, "X", {"isbn": "Y"}]);
        doc["data"]["ownerships"] = json!([[], null]);

        let snapshot = parse_snapshot(&doc).unwrap();
        assert_eq!(snapshot.data.books.len(), 1);
        assert_eq!(snapshot.data.books[0].key(), Some("Y"));
        assert!(snapshot.data.ownerships.is_empty());
        assert_eq!(snapshot.data.locations.len(), 1);
    }

    #[test]
    fn book_without_key_has_no_draft() {
        let book = SnapshotBook {
            title: Some("Untitled".into()),
            ..Default::default()
        };
        assert_eq!(book.key(), None);
        assert_eq!(book.draft(), None);

        let empty = SnapshotBook {
            isbn: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(empty.key(), None);
    }

    #[test]
    fn draft_fills_defaults() {
        let book = SnapshotBook {
            isbn: Some("X".into()),
            ..Default::default()
        };
        let draft = book.draft().unwrap();
        assert_eq!(draft.title, "");
        assert!(!draft.is_doujin);
    }

    #[test]
    fn from_json_reports_syntax_errors_as_invalid() {
        let result = Snapshot::from_json("{not json");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn export_is_sorted_and_reparses() {
        let at = Utc::now();
        let live = LiveState {
            books: vec![
                Book {
                    isbn: "B".into(),
                    title: "Second".into(),
                    author: None,
                    thumbnail_url: None,
                    is_doujin: false,
                    created_at: at,
                    updated_at: at,
                },
                Book {
                    isbn: "A".into(),
                    title: "First".into(),
                    author: Some("Someone".into()),
                    thumbnail_url: None,
                    is_doujin: true,
                    created_at: at,
                    updated_at: at,
                },
            ],
            locations: vec![Location {
                id: 7,
                user_id: "u1".into(),
                name: "Shelf".into(),
                kind: LocationType::Physical,
                created_at: at,
                updated_at: at,
            }],
            ownerships: vec![Ownership {
                id: 1,
                user_id: "u1".into(),
                isbn: "A".into(),
                location_id: 7,
                created_at: at,
            }],
        };

        let snapshot = Snapshot::from_live(&live, at);
        assert_eq!(snapshot.data.books[0].key(), Some("A"));
        assert_eq!(snapshot.data.books[1].key(), Some("B"));

        let json = snapshot.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, restored);

        let summary = SnapshotSummary::from(&restored);
        assert_eq!(summary.book_count, 2);
        assert_eq!(summary.location_count, 1);
        assert_eq!(summary.ownership_count, 1);
    }
}
