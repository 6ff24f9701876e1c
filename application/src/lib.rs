use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Book, BookFilter, BookId, BookPatch, BookPayload, DomainError, coerce_flag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Book not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
    #[error("Integrity check failed: {0}")]
    Integrity(String),
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

// --- Infrastructure Interfaces (Traits) ---

/// Interface for the ordered book collection.
///
/// Implementations own every stored book; callers only ever receive copies.
/// Each method is a single step against the collection, so mutations never
/// interleave with each other or with a listing.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Returns the books matching `filter`, in insertion order.
    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, ApplicationError>;
    /// Retrieves a book by its ID.
    async fn get(&self, id: &BookId) -> Result<Option<Book>, ApplicationError>;
    /// Appends a book to the end of the collection.
    /// Returns false, leaving the collection untouched, if the ID is already taken.
    async fn insert(&self, book: Book) -> Result<bool, ApplicationError>;
    /// Merges `patch` over the stored book in place and returns the result.
    /// `Ok(None)` means no book has that ID.
    async fn update(
        &self,
        id: &BookId,
        patch: BookPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Book>, ApplicationError>;
    /// Removes a book, keeping the order of the rest. Returns true if removed.
    async fn delete(&self, id: &BookId) -> Result<bool, ApplicationError>;
    /// Is a book with this ID stored?
    async fn contains(&self, id: &BookId) -> Result<bool, ApplicationError>;
    /// Number of stored books.
    async fn count(&self) -> Result<usize, ApplicationError>;
}

/// Source of opaque, unique book identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> BookId;
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

/// Raw query parameters of a listing request.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ListBooksQuery {
    pub name: Option<String>,
    /// `0`/`1` or `true`/`false`.
    pub reading: Option<String>,
    /// `0`/`1` or `true`/`false`.
    pub finished: Option<String>,
}

impl ListBooksQuery {
    /// Converts the raw parameters into a domain filter.
    /// An empty `name` imposes no constraint; an empty flag reads as `false`;
    /// unrecognized flag values are rejected.
    pub fn into_filter(self) -> Result<BookFilter, ApplicationError> {
        Ok(BookFilter {
            name: self.name.filter(|name| !name.is_empty()),
            reading: parse_flag("reading", self.reading)?,
            finished: parse_flag("finished", self.finished)?,
        })
    }
}

fn parse_flag(param: &str, raw: Option<String>) -> Result<Option<bool>, ApplicationError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        // A present but empty flag counts as falsy
        Some("") => Ok(Some(false)),
        Some(value) => coerce_flag(value).map(Some).ok_or_else(|| {
            ApplicationError::InvalidInput(format!(
                "Query parameter '{}' must be 0, 1, true or false, got '{}'",
                param, value
            ))
        }),
    }
}

/// Listing projection of a book.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BookSummary {
    pub id: String,
    pub name: String,
    pub publisher: Option<String>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id().as_str().to_string(),
            name: book.name().to_string(),
            publisher: book.publisher().map(str::to_string),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ListBooksResponse {
    pub books: Vec<BookSummary>,
}

#[derive(Serialize, Debug)]
pub struct BookResponse {
    pub book: Book,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookResponse {
    pub book_id: String,
}

// --- Application Services (Use Cases) ---

/// Service owning the book use cases: list, get, create, update and delete.
pub struct BookService {
    repo: Arc<dyn BookRepository>,
    id_generator: Arc<dyn IdGenerator>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>, id_generator: Arc<dyn IdGenerator>) -> Self {
        Self { repo, id_generator }
    }

    #[instrument(skip(self, query))]
    pub async fn list_books(
        &self,
        query: ListBooksQuery,
    ) -> Result<ListBooksResponse, ApplicationError> {
        let filter = query.into_filter()?;
        debug!(?filter, "Listing books");
        let books = self.repo.list(&filter).await?;
        info!(count = books.len(), "Books listed");
        Ok(ListBooksResponse {
            books: books.iter().map(BookSummary::from).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_book(&self, id: &str) -> Result<Book, ApplicationError> {
        let book_id = BookId::from(id);
        self.repo.get(&book_id).await?.ok_or_else(|| {
            warn!(book_id = %id, "Book not found");
            ApplicationError::NotFound(id.to_string())
        })
    }

    /// Validates and stores a new book, returning its generated ID.
    #[instrument(skip(self, payload))]
    pub async fn create_book(&self, payload: BookPayload) -> Result<BookId, ApplicationError> {
        info!("Attempting to create book");

        // 1. Validate before any ID is spent
        if let Err(e) = payload.validate() {
            warn!("Book creation rejected: {}", e);
            return Err(e.into());
        }

        // 2. Build the book under a fresh ID
        let id = self.id_generator.next_id();
        let book = Book::new(id.clone(), payload, Utc::now())?;

        // 3. Append to the collection
        if !self.repo.insert(book).await? {
            error!(book_id = %id, "Generated ID is already in use");
            return Err(ApplicationError::Integrity(format!(
                "generated id '{}' is already in use",
                id
            )));
        }

        // 4. Confirm the book landed
        if !self.repo.contains(&id).await? {
            error!(book_id = %id, "Book missing right after insert");
            return Err(ApplicationError::Integrity(format!(
                "book '{}' was not stored",
                id
            )));
        }
        info!(book_id = %id, "Book created successfully");
        Ok(id)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_book(&self, id: &str, patch: BookPatch) -> Result<Book, ApplicationError> {
        info!(book_id = %id, "Attempting to update book");

        // Checks that need no stored book run before the lookup
        if let Err(e) = patch.validate() {
            warn!(book_id = %id, "Book update rejected: {}", e);
            return Err(e.into());
        }

        let book_id = BookId::from(id);
        match self.repo.update(&book_id, patch, Utc::now()).await {
            Ok(Some(book)) => {
                info!(book_id = %id, finished = book.finished(), "Book updated successfully");
                Ok(book)
            }
            Ok(None) => {
                warn!(book_id = %id, "Update failed: book not found");
                Err(ApplicationError::NotFound(id.to_string()))
            }
            Err(e) => {
                warn!(book_id = %id, "Book update rejected: {}", e);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: &str) -> Result<(), ApplicationError> {
        info!(book_id = %id, "Attempting to delete book");
        if self.repo.delete(&BookId::from(id)).await? {
            let remaining = self.count_books().await?;
            info!(book_id = %id, remaining, "Book deleted successfully");
            Ok(())
        } else {
            warn!(book_id = %id, "Deletion failed: book not found");
            Err(ApplicationError::NotFound(id.to_string()))
        }
    }

    /// Number of stored books.
    pub async fn count_books(&self) -> Result<usize, ApplicationError> {
        self.repo.count().await
    }
}
