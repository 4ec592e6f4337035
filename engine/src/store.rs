//! Entity stores - the persistence seam of the engine.
//!
//! [`EntityStore`] is the minimum surface the diff detector and merge
//! applicator need from persistence. [`MemoryStore`] implements it in memory
//! with the same uniqueness and referential rules as the database schema:
//!
//! - book keys are unique; a book referenced by any ownership cannot be deleted
//! - `(user_id, name)` is unique among locations
//! - `(user_id, isbn, location_id)` is unique among ownerships, and an
//!   ownership needs both its book and its location to exist
//! - deleting a location removes the ownerships that reference it

use crate::{
    error::Result, Book, BookDraft, BookKey, Error, Location, LocationId, LocationType, Ownership,
    OwnershipId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Persistence operations required by the reconciliation engine.
///
/// Implementations report failures with the engine's error kinds:
/// [`Error::DuplicateEntity`] for uniqueness violations,
/// [`Error::ReferentialConstraint`] for foreign-key violations,
/// [`Error::NotFound`] when the target row does not exist, and
/// [`Error::Unexpected`] for everything else.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_book(&self, isbn: &str) -> Result<Option<Book>>;

    async fn create_book(&self, draft: &BookDraft) -> Result<Book>;

    async fn update_book(&self, draft: &BookDraft) -> Result<Book>;

    async fn delete_book(&self, isbn: &str) -> Result<()>;

    /// Books the user holds through at least one ownership.
    async fn list_books_by_owner(&self, user_id: &str) -> Result<Vec<Book>>;

    async fn find_location_by_name(&self, user_id: &str, name: &str)
        -> Result<Option<Location>>;

    async fn create_location(
        &self,
        user_id: &str,
        name: &str,
        kind: LocationType,
    ) -> Result<Location>;

    /// Delete a location and, with it, every ownership that references it.
    async fn delete_location(&self, user_id: &str, id: LocationId) -> Result<()>;

    async fn list_locations_by_owner(&self, user_id: &str) -> Result<Vec<Location>>;

    async fn find_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Option<Ownership>>;

    async fn create_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Ownership>;

    async fn delete_ownership(&self, user_id: &str, id: OwnershipId) -> Result<()>;

    async fn list_ownerships_by_owner(&self, user_id: &str) -> Result<Vec<Ownership>>;
}

/// One user's slice of the live store, read at a single point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveState {
    pub books: Vec<Book>,
    pub locations: Vec<Location>,
    pub ownerships: Vec<Ownership>,
}

impl LiveState {
    /// Read everything the given user can see.
    pub async fn load<S: EntityStore + ?Sized>(store: &S, user_id: &str) -> Result<Self> {
        Ok(Self {
            books: store.list_books_by_owner(user_id).await?,
            locations: store.list_locations_by_owner(user_id).await?,
            ownerships: store.list_ownerships_by_owner(user_id).await?,
        })
    }
}

#[derive(Debug, Default)]
struct Tables {
    books: BTreeMap<BookKey, Book>,
    locations: BTreeMap<LocationId, Location>,
    ownerships: BTreeMap<OwnershipId, Ownership>,
    last_location_id: LocationId,
    last_ownership_id: OwnershipId,
}

/// An in-memory [`EntityStore`].
///
/// Surrogate ids are assigned from per-table counters starting at 1, the way
/// a database sequence would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the location id sequence after `last_id`.
    ///
    /// Lets two stores hand out disjoint ids, which is how two independent
    /// installations behave.
    pub fn with_location_ids_after(self, last_id: LocationId) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.last_location_id = last_id;
        }
        self
    }

    /// Total number of books, regardless of owner.
    pub fn book_count(&self) -> Result<usize> {
        Ok(self.tables()?.books.len())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Unexpected("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_book(&self, isbn: &str) -> Result<Option<Book>> {
        Ok(self.tables()?.books.get(isbn).cloned())
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
        let mut tables = self.tables()?;
        if tables.books.contains_key(&draft.isbn) {
            return Err(Error::DuplicateEntity(format!("book {}", draft.isbn)));
        }

        let now = Utc::now();
        let book = Book {
            isbn: draft.isbn.clone(),
            title: draft.title.clone(),
            author: draft.author.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            is_doujin: draft.is_doujin,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(book.isbn.clone(), book.clone());
        Ok(book)
    }

    async fn update_book(&self, draft: &BookDraft) -> Result<Book> {
        let mut tables = self.tables()?;
        let book = tables
            .books
            .get_mut(&draft.isbn)
            .ok_or_else(|| Error::NotFound(format!("book {}", draft.isbn)))?;

        book.title = draft.title.clone();
        book.author = draft.author.clone();
        book.thumbnail_url = draft.thumbnail_url.clone();
        book.is_doujin = draft.is_doujin;
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn delete_book(&self, isbn: &str) -> Result<()> {
        let mut tables = self.tables()?;
        if !tables.books.contains_key(isbn) {
            return Err(Error::NotFound(format!("book {}", isbn)));
        }
        if tables.ownerships.values().any(|o| o.isbn == isbn) {
            return Err(Error::ReferentialConstraint(format!(
                "book {} is still referenced by ownerships",
                isbn
            )));
        }
        tables.books.remove(isbn);
        Ok(())
    }

    async fn list_books_by_owner(&self, user_id: &str) -> Result<Vec<Book>> {
        let tables = self.tables()?;
        let owned: BTreeSet<&str> = tables
            .ownerships
            .values()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.isbn.as_str())
            .collect();

        Ok(owned
            .into_iter()
            .filter_map(|isbn| tables.books.get(isbn).cloned())
            .collect())
    }

    async fn find_location_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Location>> {
        Ok(self
            .tables()?
            .locations
            .values()
            .find(|l| l.user_id == user_id && l.name == name)
            .cloned())
    }

    async fn create_location(
        &self,
        user_id: &str,
        name: &str,
        kind: LocationType,
    ) -> Result<Location> {
        let mut tables = self.tables()?;
        if tables
            .locations
            .values()
            .any(|l| l.user_id == user_id && l.name == name)
        {
            return Err(Error::DuplicateEntity(format!("location {}", name)));
        }

        tables.last_location_id += 1;
        let now = Utc::now();
        let location = Location {
            id: tables.last_location_id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            kind,
            created_at: now,
            updated_at: now,
        };
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn delete_location(&self, user_id: &str, id: LocationId) -> Result<()> {
        let mut tables = self.tables()?;
        let owned = matches!(tables.locations.get(&id), Some(l) if l.user_id == user_id);
        if !owned {
            return Err(Error::NotFound(format!("location {}", id)));
        }
        tables.locations.remove(&id);
        tables.ownerships.retain(|_, o| o.location_id != id);
        Ok(())
    }

    async fn list_locations_by_owner(&self, user_id: &str) -> Result<Vec<Location>> {
        Ok(self
            .tables()?
            .locations
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Option<Ownership>> {
        Ok(self
            .tables()?
            .ownerships
            .values()
            .find(|o| o.user_id == user_id && o.isbn == isbn && o.location_id == location_id)
            .cloned())
    }

    async fn create_ownership(
        &self,
        user_id: &str,
        isbn: &str,
        location_id: LocationId,
    ) -> Result<Ownership> {
        let mut tables = self.tables()?;
        if !tables.books.contains_key(isbn) {
            return Err(Error::ReferentialConstraint(format!("book {} does not exist", isbn)));
        }
        if !tables.locations.contains_key(&location_id) {
            return Err(Error::ReferentialConstraint(format!(
                "location {} does not exist",
                location_id
            )));
        }
        if tables
            .ownerships
            .values()
            .any(|o| o.user_id == user_id && o.isbn == isbn && o.location_id == location_id)
        {
            return Err(Error::DuplicateEntity(format!(
                "ownership {}:{}:{}",
                user_id, isbn, location_id
            )));
        }

        tables.last_ownership_id += 1;
        let ownership = Ownership {
            id: tables.last_ownership_id,
            user_id: user_id.to_string(),
            isbn: isbn.to_string(),
            location_id,
            created_at: Utc::now(),
        };
        tables.ownerships.insert(ownership.id, ownership.clone());
        Ok(ownership)
    }

    async fn delete_ownership(&self, user_id: &str, id: OwnershipId) -> Result<()> {
        let mut tables = self.tables()?;
        let owned = matches!(tables.ownerships.get(&id), Some(o) if o.user_id == user_id);
        if !owned {
            return Err(Error::NotFound(format!("ownership {}", id)));
        }
        tables.ownerships.remove(&id);
        Ok(())
    }

    async fn list_ownerships_by_owner(&self, user_id: &str) -> Result<Vec<Ownership>> {
        Ok(self
            .tables()?
            .ownerships
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(isbn: &str, title: &str) -> BookDraft {
        BookDraft {
            isbn: isbn.into(),
            title: title.into(),
            author: None,
            thumbnail_url: None,
            is_doujin: false,
        }
    }

    #[tokio::test]
    async fn create_and_update_book() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Old")).await.unwrap();

        let updated = store.update_book(&draft("X", "New")).await.unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(store.find_book("X").await.unwrap().unwrap().title, "New");
    }

    #[tokio::test]
    async fn duplicate_book_rejected() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Old")).await.unwrap();
        let result = store.create_book(&draft("X", "Again")).await;
        assert!(matches!(result, Err(Error::DuplicateEntity(_))));
    }

    #[tokio::test]
    async fn update_missing_book_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update_book(&draft("X", "New")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn referenced_book_cannot_be_deleted() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Title")).await.unwrap();
        let shelf = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let ownership = store.create_ownership("u1", "X", shelf.id).await.unwrap();

        let result = store.delete_book("X").await;
        assert!(matches!(result, Err(Error::ReferentialConstraint(_))));

        store.delete_ownership("u1", ownership.id).await.unwrap();
        store.delete_book("X").await.unwrap();
        assert_eq!(store.book_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn location_names_unique_per_user() {
        let store = MemoryStore::new();
        store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let result = store
            .create_location("u1", "Shelf", LocationType::Digital)
            .await;
        assert!(matches!(result, Err(Error::DuplicateEntity(_))));

        // Another user may reuse the name
        store
            .create_location("u2", "Shelf", LocationType::Physical)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleting_location_cascades_ownerships() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Title")).await.unwrap();
        let shelf = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        store.create_ownership("u1", "X", shelf.id).await.unwrap();

        store.delete_location("u1", shelf.id).await.unwrap();
        assert!(store.list_ownerships_by_owner("u1").await.unwrap().is_empty());

        let again = store.delete_location("u1", shelf.id).await;
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn other_users_rows_are_not_found() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Title")).await.unwrap();
        let shelf = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let ownership = store.create_ownership("u1", "X", shelf.id).await.unwrap();

        assert!(matches!(
            store.delete_location("u2", shelf.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete_ownership("u2", ownership.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_ownership_by_natural_key() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Title")).await.unwrap();
        let shelf = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let created = store.create_ownership("u1", "X", shelf.id).await.unwrap();

        let found = store.find_ownership("u1", "X", shelf.id).await.unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(store.find_ownership("u2", "X", shelf.id).await.unwrap(), None);
        assert_eq!(store.find_ownership("u1", "Y", shelf.id).await.unwrap(), None);

        let again = store.create_ownership("u1", "X", shelf.id).await;
        assert!(matches!(again, Err(Error::DuplicateEntity(_))));
    }

    #[tokio::test]
    async fn ownership_requires_book_and_location() {
        let store = MemoryStore::new();
        let shelf = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let result = store.create_ownership("u1", "missing", shelf.id).await;
        assert!(matches!(result, Err(Error::ReferentialConstraint(_))));

        store.create_book(&draft("X", "Title")).await.unwrap();
        let result = store.create_ownership("u1", "X", 999).await;
        assert!(matches!(result, Err(Error::ReferentialConstraint(_))));
    }

    #[tokio::test]
    async fn live_state_is_owner_scoped() {
        let store = MemoryStore::new();
        store.create_book(&draft("X", "Mine")).await.unwrap();
        store.create_book(&draft("Y", "Theirs")).await.unwrap();
        let mine = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        let theirs = store
            .create_location("u2", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        store.create_ownership("u1", "X", mine.id).await.unwrap();
        store.create_ownership("u2", "Y", theirs.id).await.unwrap();

        let live = LiveState::load(&store, "u1").await.unwrap();
        assert_eq!(live.books.len(), 1);
        assert_eq!(live.books[0].isbn, "X");
        assert_eq!(live.locations.len(), 1);
        assert_eq!(live.ownerships.len(), 1);
    }

    #[tokio::test]
    async fn location_ids_can_start_later() {
        let store = MemoryStore::new().with_location_ids_after(100);
        let location = store
            .create_location("u1", "Shelf", LocationType::Physical)
            .await
            .unwrap();
        assert_eq!(location.id, 101);
    }
}
