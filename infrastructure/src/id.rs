use application::IdGenerator;
use domain::BookId;
use uuid::Uuid;

/// Default length of generated book IDs.
pub const DEFAULT_ID_LENGTH: usize = 16;

// A simple-format UUID is 32 hex characters
const MAX_ID_LENGTH: usize = 32;

/// Generates fixed-length lowercase hex IDs from random v4 UUIDs.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_ID_LENGTH)
    }

    /// Lengths are clamped to `1..=32`.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.clamp(1, MAX_ID_LENGTH),
        }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> BookId {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(self.length);
        BookId::new(id)
    }
}
