use application::{ApplicationError, BookRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Book, BookFilter, BookId, BookPatch};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Ordered in-memory book collection.
///
/// Clones are handles on the same collection. Every operation holds the
/// lock for its whole duration, so writers are serialized against each
/// other and against listings.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookRepository {
    // Insertion order is the listing order
    books: Arc<RwLock<Vec<Book>>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self {
            books: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, ApplicationError> {
        let books = self.books.read().await;
        debug!(total = books.len(), "Listing books from in-memory store");
        if filter.is_empty() {
            return Ok(books.clone());
        }
        let matcher = filter.matcher();
        Ok(books
            .iter()
            .filter(|book| matcher.matches(book))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &BookId) -> Result<Option<Book>, ApplicationError> {
        debug!(book_id = %id, "Getting book from in-memory store");
        let books = self.books.read().await;
        Ok(books.iter().find(|book| book.id() == id).cloned())
    }

    #[instrument(skip(self, book), fields(book_id = %book.id()))]
    async fn insert(&self, book: Book) -> Result<bool, ApplicationError> {
        let mut books = self.books.write().await;
        if books.iter().any(|stored| stored.id() == book.id()) {
            debug!("Refusing to insert duplicate book ID");
            return Ok(false);
        }
        books.push(book);
        debug!(total = books.len(), "Book appended to in-memory store");
        Ok(true)
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: &BookId,
        patch: BookPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Book>, ApplicationError> {
        let mut books = self.books.write().await;
        let Some(book) = books.iter_mut().find(|book| book.id() == id) else {
            return Ok(None);
        };
        // Validation failures leave the stored book untouched
        book.apply(patch, now)?;
        debug!(book_id = %id, "Book updated in place");
        Ok(Some(book.clone()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &BookId) -> Result<bool, ApplicationError> {
        debug!(book_id = %id, "Deleting book from in-memory store");
        let mut books = self.books.write().await;
        match books.iter().position(|book| book.id() == id) {
            Some(index) => {
                // Vec::remove shifts the tail, keeping relative order
                books.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn contains(&self, id: &BookId) -> Result<bool, ApplicationError> {
        let books = self.books.read().await;
        Ok(books.iter().any(|book| book.id() == id))
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.books.read().await.len())
    }
}
