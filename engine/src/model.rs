//! Live entity types: books, locations and ownerships.

use crate::{BookKey, LocationId, OwnershipId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A book known to the store.
///
/// Books are shared across users; a user "owns" a book through one or more
/// [`Ownership`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// ISBN, or a generated token for works without one
    pub isbn: BookKey,
    pub title: String,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Marks self-published / fan works that have no ISBN
    pub is_doujin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// The mutable fields of this book.
    pub fn draft(&self) -> BookDraft {
        BookDraft {
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            is_doujin: self.is_doujin,
        }
    }
}

/// Fields written when creating or updating a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    pub isbn: BookKey,
    pub title: String,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_doujin: bool,
}

impl BookDraft {
    /// Names of the fields that differ from `book`, in a fixed order.
    pub fn changed_fields(&self, book: &Book) -> Vec<String> {
        let mut changed = Vec::new();
        if self.title != book.title {
            changed.push("title".to_string());
        }
        if self.author != book.author {
            changed.push("author".to_string());
        }
        if self.thumbnail_url != book.thumbnail_url {
            changed.push("thumbnail_url".to_string());
        }
        if self.is_doujin != book.is_doujin {
            changed.push("is_doujin".to_string());
        }
        changed
    }
}

/// Kind of place a book can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationType {
    Physical,
    Digital,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Physical => "Physical",
            LocationType::Digital => "Digital",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Physical" => Ok(LocationType::Physical),
            "Digital" => Ok(LocationType::Digital),
            other => Err(format!("unknown location type: {}", other)),
        }
    }
}

/// A shelf, box, e-reader or other place owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user holding a book at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub id: OwnershipId,
    pub user_id: UserId,
    pub isbn: BookKey,
    pub location_id: LocationId,
    pub created_at: DateTime<Utc>,
}
