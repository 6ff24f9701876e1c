// Module declarations
pub mod id;
pub mod persistence;

// Re-export all implementations
pub use id::RandomIdGenerator;
pub use persistence::InMemoryBookRepository;
