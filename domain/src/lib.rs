use chrono::{DateTime, Utc}; // For insertedAt / updatedAt
use regex::{Regex, RegexBuilder}; // For the name filter pattern
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error; // For domain-specific errors

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Missing required field 'name'")]
    MissingName,
    #[error("readPage ({read_page}) cannot be greater than pageCount ({page_count})")]
    InvalidPageRange { read_page: u32, page_count: u32 },
}

// --- Book ID ---
/// Opaque identifier assigned to a book once, at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: String) -> Self {
        Self(id)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self::new(id.to_string())
    }
}
impl From<BookId> for String {
    fn from(book_id: BookId) -> Self {
        book_id.0
    }
}
impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Validation ---

/// Checks the rules shared by creation and update, in order:
/// the name must be present and non-blank, then `readPage <= pageCount`.
fn validate_fields(name: Option<&str>, read_page: u32, page_count: u32) -> Result<(), DomainError> {
    if name.is_none_or(|name| name.trim().is_empty()) {
        return Err(DomainError::MissingName);
    }
    if read_page > page_count {
        return Err(DomainError::InvalidPageRange {
            read_page,
            page_count,
        });
    }
    Ok(())
}

// --- Payloads ---

/// Reads an explicit JSON `null` as the type's default, like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Client-supplied fields for a new book.
/// `id`, `finished` and the timestamps are never taken from the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")] // 0 if missing or null
    pub page_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub read_page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reading: bool,
}

impl BookPayload {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_fields(self.name.as_deref(), self.read_page, self.page_count)
    }
}

/// Partial update of a stored book. `None` keeps the stored value.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<u32>,
    pub read_page: Option<u32>,
    pub reading: Option<bool>,
}

impl BookPatch {
    /// Checks what can be checked without the stored book: a name the patch
    /// sets must be non-blank, and when both page fields are set,
    /// `readPage <= pageCount`. Single-field page changes are checked
    /// against the merged values in [`Book::apply`].
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(DomainError::MissingName);
        }
        if let (Some(page_count), Some(read_page)) = (self.page_count, self.read_page) {
            if read_page > page_count {
                return Err(DomainError::InvalidPageRange {
                    read_page,
                    page_count,
                });
            }
        }
        Ok(())
    }
}

// --- Book ---

/// A stored book. `finished` is always `readPage == pageCount`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    id: BookId,
    name: String,
    year: Option<i32>,
    author: Option<String>,
    summary: Option<String>,
    publisher: Option<String>,
    page_count: u32,
    read_page: u32,
    finished: bool,
    reading: bool,
    inserted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Book {
    /// Validates the payload and builds a book with both timestamps set to `now`.
    pub fn new(id: BookId, payload: BookPayload, now: DateTime<Utc>) -> Result<Self, DomainError> {
        payload.validate()?;
        let BookPayload {
            name,
            year,
            author,
            summary,
            publisher,
            page_count,
            read_page,
            reading,
        } = payload;
        let Some(name) = name else {
            return Err(DomainError::MissingName);
        };

        Ok(Self {
            id,
            name,
            year,
            author,
            summary,
            publisher,
            page_count,
            read_page,
            finished: read_page == page_count,
            reading,
            inserted_at: now,
            updated_at: now,
        })
    }

    /// Merges `patch` over the current values and refreshes `updatedAt`.
    ///
    /// The merged values are validated before anything is written, so on
    /// error the book is left exactly as it was. `id` and `insertedAt`
    /// never change.
    pub fn apply(&mut self, patch: BookPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        let page_count = patch.page_count.unwrap_or(self.page_count);
        let read_page = patch.read_page.unwrap_or(self.read_page);
        let name = patch.name.as_deref().unwrap_or(self.name.as_str());
        validate_fields(Some(name), read_page, page_count)?;

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(year) = patch.year {
            self.year = Some(year);
        }
        if let Some(author) = patch.author {
            self.author = Some(author);
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary);
        }
        if let Some(publisher) = patch.publisher {
            self.publisher = Some(publisher);
        }
        if let Some(reading) = patch.reading {
            self.reading = reading;
        }
        self.page_count = page_count;
        self.read_page = read_page;
        self.finished = read_page == page_count;
        self.updated_at = now.max(self.inserted_at);
        Ok(())
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn year(&self) -> Option<i32> {
        self.year
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }
    pub fn page_count(&self) -> u32 {
        self.page_count
    }
    pub fn read_page(&self) -> u32 {
        self.read_page
    }
    pub fn finished(&self) -> bool {
        self.finished
    }
    pub fn reading(&self) -> bool {
        self.reading
    }
    pub fn inserted_at(&self) -> DateTime<Utc> {
        self.inserted_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// --- Filtering ---

/// Normalizes a query-string flag to a boolean.
///
/// Case-insensitive `"true"`/`"false"` map directly; numeric strings map
/// `0` to `false` and `1` to `true` (so `"1.0"` is `true`). Surrounding
/// whitespace is ignored. Anything else, including the empty string, is
/// unrecognized and yields `None`.
pub fn coerce_flag(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    match value.parse::<f64>() {
        Ok(number) if number == 1.0 => Some(true),
        Ok(number) if number == 0.0 => Some(false),
        _ => None,
    }
}

/// Optional constraints for listing books. Absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Case-insensitive pattern searched for anywhere in the name.
    pub name: Option<String>,
    pub reading: Option<bool>,
    pub finished: Option<bool>,
}

impl BookFilter {
    pub fn is_empty(&self) -> bool {
        self.name_pattern().is_none() && self.reading.is_none() && self.finished.is_none()
    }

    /// Compiles the filter once so it can be applied to a whole collection.
    pub fn matcher(&self) -> BookMatcher {
        BookMatcher {
            name: self.name_pattern().map(NamePattern::compile),
            reading: self.reading,
            finished: self.finished,
        }
    }

    /// Convenience for a single book; prefer [`BookFilter::matcher`] in loops.
    pub fn matches(&self, book: &Book) -> bool {
        self.matcher().matches(book)
    }

    fn name_pattern(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Compiled form of a [`BookFilter`].
#[derive(Debug, Clone)]
pub struct BookMatcher {
    name: Option<NamePattern>,
    reading: Option<bool>,
    finished: Option<bool>,
}

impl BookMatcher {
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(pattern) = &self.name {
            if !pattern.is_match(book.name()) {
                return false;
            }
        }
        if self.reading.is_some_and(|reading| reading != book.reading()) {
            return false;
        }
        if self.finished.is_some_and(|finished| finished != book.finished()) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
enum NamePattern {
    Regex(Regex),
    // Lowercased needle for patterns that are not valid regular expressions
    Literal(String),
}

impl NamePattern {
    fn compile(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Self::Regex(regex),
            Err(_) => Self::Literal(pattern.to_lowercase()),
        }
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(name),
            Self::Literal(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn payload(name: &str, page_count: u32, read_page: u32) -> BookPayload {
        BookPayload {
            name: Some(name.to_string()),
            year: Some(2010),
            author: Some("John Doe".to_string()),
            summary: Some("Lorem ipsum dolor sit amet".to_string()),
            publisher: Some("Dicoding Indonesia".to_string()),
            page_count,
            read_page,
            reading: false,
        }
    }

    fn book(name: &str, page_count: u32, read_page: u32) -> Book {
        Book::new(BookId::from("book-1"), payload(name, page_count, read_page), Utc::now())
            .expect("Failed to build test book")
    }

    #[test]
    fn book_creation_derives_finished_and_timestamps() {
        let now = Utc::now();
        let done = Book::new(BookId::from("a"), payload("Tera", 200, 200), now).unwrap();
        assert!(done.finished());
        assert_eq!(done.inserted_at(), now);
        assert_eq!(done.updated_at(), now);

        let in_progress = Book::new(BookId::from("b"), payload("Momo", 200, 150), now).unwrap();
        assert!(!in_progress.finished());
        assert_eq!(in_progress.publisher(), Some("Dicoding Indonesia"));
        assert_eq!(in_progress.year(), Some(2010));
    }

    #[test]
    fn book_creation_fails_missing_name() {
        let mut missing = payload("", 0, 0);
        missing.name = None;
        assert_eq!(
            Book::new(BookId::from("a"), missing, Utc::now()),
            Err(DomainError::MissingName)
        );
        assert_eq!(
            Book::new(BookId::from("a"), payload("", 0, 0), Utc::now()),
            Err(DomainError::MissingName)
        );
        assert_eq!(
            Book::new(BookId::from("a"), payload("   ", 0, 0), Utc::now()),
            Err(DomainError::MissingName)
        );
    }

    #[test]
    fn book_creation_fails_invalid_page_range() {
        let result = Book::new(BookId::from("a"), payload("Tera", 100, 150), Utc::now());
        assert_eq!(
            result,
            Err(DomainError::InvalidPageRange {
                read_page: 150,
                page_count: 100
            })
        );
    }

    #[test]
    fn missing_name_is_reported_before_page_range() {
        let result = Book::new(BookId::from("a"), payload("", 100, 150), Utc::now());
        assert_eq!(result, Err(DomainError::MissingName));
    }

    #[test]
    fn apply_merges_patch_and_keeps_identity() {
        let mut book = book("Momo", 200, 150);
        let inserted_at = book.inserted_at();
        let later = inserted_at + Duration::seconds(5);

        let patch = BookPatch {
            read_page: Some(200),
            reading: Some(true),
            ..Default::default()
        };
        book.apply(patch, later).unwrap();

        assert_eq!(book.id().as_str(), "book-1");
        assert_eq!(book.name(), "Momo");
        assert_eq!(book.author(), Some("John Doe"));
        assert_eq!(book.read_page(), 200);
        assert!(book.finished());
        assert!(book.reading());
        assert_eq!(book.inserted_at(), inserted_at);
        assert_eq!(book.updated_at(), later);
    }

    #[test]
    fn apply_recomputes_finished_when_page_count_grows() {
        let mut book = book("Tera", 200, 200);
        assert!(book.finished());
        let patch = BookPatch {
            page_count: Some(300),
            ..Default::default()
        };
        book.apply(patch, Utc::now()).unwrap();
        assert!(!book.finished());
    }

    #[test]
    fn apply_rejects_merged_page_range_and_leaves_book_untouched() {
        let mut book = book("Momo", 200, 150);
        let before = book.clone();
        let patch = BookPatch {
            name: Some("Momo 2".to_string()),
            page_count: Some(100),
            ..Default::default()
        };
        let result = book.apply(patch, Utc::now());
        assert_eq!(
            result,
            Err(DomainError::InvalidPageRange {
                read_page: 150,
                page_count: 100
            })
        );
        assert_eq!(book, before);
    }

    #[test]
    fn apply_rejects_blank_name() {
        let mut book = book("Momo", 200, 150);
        let patch = BookPatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        assert_eq!(book.apply(patch, Utc::now()), Err(DomainError::MissingName));
        assert_eq!(book.name(), "Momo");
    }

    #[test]
    fn patch_validate_checks_page_range_when_both_fields_are_set() {
        let both = BookPatch {
            name: Some("X".to_string()),
            page_count: Some(100),
            read_page: Some(150),
            ..Default::default()
        };
        assert_eq!(
            both.validate(),
            Err(DomainError::InvalidPageRange {
                read_page: 150,
                page_count: 100
            })
        );

        let blank_and_overread = BookPatch {
            name: Some(" ".to_string()),
            ..both
        };
        assert_eq!(blank_and_overread.validate(), Err(DomainError::MissingName));

        let only_read_page = BookPatch {
            read_page: Some(150),
            ..Default::default()
        };
        assert_eq!(only_read_page.validate(), Ok(()));
    }

    #[test]
    fn apply_never_moves_updated_at_before_inserted_at() {
        let mut book = book("Momo", 200, 150);
        let earlier = book.inserted_at() - Duration::seconds(10);
        book.apply(BookPatch::default(), earlier).unwrap();
        assert_eq!(book.updated_at(), book.inserted_at());
    }

    #[test]
    fn coerce_flag_accepts_numeric_and_boolean_strings() {
        assert_eq!(coerce_flag("1"), Some(true));
        assert_eq!(coerce_flag("0"), Some(false));
        assert_eq!(coerce_flag("1.0"), Some(true));
        assert_eq!(coerce_flag(" 0 "), Some(false));
        assert_eq!(coerce_flag("true"), Some(true));
        assert_eq!(coerce_flag("FALSE"), Some(false));
        assert_eq!(coerce_flag("2"), None);
        assert_eq!(coerce_flag("yes"), None);
        assert_eq!(coerce_flag(""), None);
    }

    #[test]
    fn filter_name_is_case_insensitive_containment() {
        let book = book("Harry Potter and the Dicoding", 10, 1);
        let filter = |name: &str| BookFilter {
            name: Some(name.to_string()),
            ..Default::default()
        };
        assert!(filter("dicoding").matches(&book));
        assert!(filter("POTTER").matches(&book));
        assert!(filter("^harry").matches(&book));
        assert!(!filter("^potter").matches(&book));
        assert!(!filter("momo").matches(&book));
    }

    #[test]
    fn filter_invalid_pattern_falls_back_to_literal() {
        let book = book("C++ (Second Edition)", 10, 1);
        let filter = BookFilter {
            name: Some("(second".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&book));
    }

    #[test]
    fn filter_flags_compare_as_booleans() {
        let finished = book("Tera", 200, 200);
        let unfinished = book("Momo", 200, 150);
        let only_finished = BookFilter {
            finished: Some(true),
            ..Default::default()
        };
        assert!(only_finished.matches(&finished));
        assert!(!only_finished.matches(&unfinished));

        let reading = BookFilter {
            reading: Some(true),
            ..Default::default()
        };
        assert!(!reading.matches(&finished));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = BookFilter {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.is_empty());
        assert!(filter.matches(&book("anything", 1, 0)));
    }

    #[test]
    fn book_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(book("Tera", 200, 200)).unwrap();
        assert_eq!(value["id"], json!("book-1"));
        assert_eq!(value["pageCount"], json!(200));
        assert_eq!(value["readPage"], json!(200));
        assert_eq!(value["finished"], json!(true));
        assert!(value["insertedAt"].is_string());
        assert_eq!(value["insertedAt"], value["updatedAt"]);
    }

    #[test]
    fn payload_deserializes_with_defaults() {
        let payload: BookPayload =
            serde_json::from_value(json!({ "name": "Tera", "readPage": 3 })).unwrap();
        assert_eq!(payload.name.as_deref(), Some("Tera"));
        assert_eq!(payload.page_count, 0);
        assert_eq!(payload.read_page, 3);
        assert!(!payload.reading);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn payload_treats_null_numbers_and_flags_as_defaults() {
        let payload: BookPayload = serde_json::from_value(json!({
            "name": "Tera",
            "pageCount": null,
            "readPage": null,
            "reading": null,
            "year": null
        }))
        .unwrap();
        assert_eq!(payload.page_count, 0);
        assert_eq!(payload.read_page, 0);
        assert!(!payload.reading);
        assert_eq!(payload.year, None);
        assert!(payload.validate().is_ok());
    }
}
