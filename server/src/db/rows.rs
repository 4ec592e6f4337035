//! Row types for the books, locations and ownerships tables.

use chrono::{DateTime, Utc};
use shelf_engine::{Book, Location, LocationType, Ownership};
use sqlx::{postgres::PgRow, FromRow, Row};

/// A stored book row.
#[derive(Debug)]
pub struct BookRow {
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_doujin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for BookRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BookRow {
            isbn: row.try_get("isbn")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            is_doujin: row.try_get("is_doujin")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            isbn: row.isbn,
            title: row.title,
            author: row.author,
            thumbnail_url: row.thumbnail_url,
            is_doujin: row.is_doujin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A stored location row. `kind` is kept as text until conversion.
#[derive(Debug)]
pub struct LocationRow {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LocationRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            kind: row.try_get("type")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl LocationRow {
    /// Convert to the engine type, failing on a type the schema should
    /// never have admitted.
    pub fn into_location(self) -> shelf_engine::error::Result<Location> {
        let kind: LocationType = self
            .kind
            .parse()
            .map_err(shelf_engine::Error::Unexpected)?;

        Ok(Location {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            kind,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A stored ownership row.
#[derive(Debug)]
pub struct OwnershipRow {
    pub id: i64,
    pub user_id: String,
    pub isbn: String,
    pub location_id: i64,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OwnershipRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OwnershipRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            isbn: row.try_get("isbn")?,
            location_id: row.try_get("location_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<OwnershipRow> for Ownership {
    fn from(row: OwnershipRow) -> Self {
        Ownership {
            id: row.id,
            user_id: row.user_id,
            isbn: row.isbn,
            location_id: row.location_id,
            created_at: row.created_at,
        }
    }
}
