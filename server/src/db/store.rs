//! PostgreSQL implementation of the engine's entity store.

use async_trait::async_trait;
use shelf_engine::{
    error::Result, Book, BookDraft, EntityStore, Error, Location, LocationId, LocationType,
    Ownership, OwnershipId,
};

use super::rows::{BookRow, LocationRow, OwnershipRow};
use super::Pool;

/// PostgreSQL unique violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// [`EntityStore`] backed by the `books`, `locations` and `ownerships`
/// tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Map a database failure onto the engine's error kinds.
fn store_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::RowNotFound => Error::NotFound(e.to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => Error::DuplicateEntity(db_err.message().to_string()),
            Some(FOREIGN_KEY_VIOLATION) => {
                Error::ReferentialConstraint(db_err.message().to_string())
            }
            _ => Error::Unexpected(e.to_string()),
        },
        _ => Error::Unexpected(e.to_string()),
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_book(&self, isbn: &str) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(row.map(Book::from))
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
        let row: BookRow = sqlx::query_as(
            r#"
            INSERT INTO books (isbn, title, author, thumbnail_url, is_doujin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&draft.isbn)
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_doujin)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn update_book(&self, draft: &BookDraft) -> Result<Book> {
        let row: Option<BookRow> = sqlx::query_as(
            r#"
            UPDATE books SET
                title = $2,
                author = $3,
                thumbnail_url = $4,
                is_doujin = $5,
                updated_at = NOW()
            WHERE isbn = $1
            RETURNING *
            "#,
        )
        .bind(&draft.isbn)
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_doujin)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(Book::from)
            .ok_or_else(|| Error::NotFound(format!("book {}", draft.isbn)))
    }

    async fn delete_book(&self, isbn: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = $1")
            .bind(isbn)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("book {}", isbn)));
        }
        Ok(())
    }

    async fn list_books_by_owner(&self, user_id: &str) -> Result<Vec<Book>> {
        let rows: Vec<BookRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT b.*
            FROM books b
            JOIN ownerships o ON o.isbn = b.isbn
            WHERE o.user_id = $1
            ORDER BY b.isbn
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_location_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Location>> {
        let row: Option<LocationRow> =
            sqlx::query_as("SELECT * FROM locations WHERE user_id = $1 AND name = $2")
                .bind(user_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        row.map(LocationRow::into_location).transpose()
    }

    async fn create_location(
        &self,
        user_id: &str,
        name: &str,
        kind: LocationType,
    ) -> Result<Location> {
        let row: LocationRow = sqlx::query_as(
            r#"
            INSERT INTO locations (user_id, name, type)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(user_id, location_id = row.id, name, "location created");
        row.into_location()
    }

    async fn delete_location(&self, user_id: &str, id: LocationId) -> Result<()> {
        // Ownerships go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM locations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("location {}", id)));
        }
        Ok(())
    }

    async fn list_locations_by_owner(&self, user_id: &str) -> Result<Vec<Location>> {
        let rows: Vec<LocationRow> =
            sqlx::query_as("SELECT * FROM locations WHERE user_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;

        rows.into_iter().map(LocationRow::into_location).collect()
    }

    async fn find_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Option<Ownership>> {
        let row: Option<OwnershipRow> = sqlx::query_as(
            "SELECT * FROM ownerships WHERE user_id = $1 AND isbn = $2 AND location_id = $3",
        )
        .bind(user_id)
        .bind(isbn)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Ownership::from))
    }

    async fn create_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Ownership> {
        let row: OwnershipRow = sqlx::query_as(
            r#"
            INSERT INTO ownerships (user_id, isbn, location_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(isbn)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn delete_ownership(&self, user_id: &str, id: OwnershipId) -> Result<()> {
        let result = sqlx::query("DELETE FROM ownerships WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("ownership {}", id)));
        }
        Ok(())
    }

    async fn list_ownerships_by_owner(&self, user_id: &str) -> Result<Vec<Ownership>> {
        let rows: Vec<OwnershipRow> =
            sqlx::query_as("SELECT * FROM ownerships WHERE user_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;

        Ok(rows.into_iter().map(Ownership::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_classified() {
        assert!(matches!(
            store_error(sqlx::Error::RowNotFound),
            Error::NotFound(_)
        ));
        assert!(matches!(
            store_error(sqlx::Error::PoolTimedOut),
            Error::Unexpected(_)
        ));
    }
}
