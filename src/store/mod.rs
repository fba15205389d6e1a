//! In-memory storage backends.
//!
//! Concurrent map implementations of the repository traits. These back
//! the engine directly when no external store is wired in, and double
//! as the storage layer in tests.

mod memory;

pub use memory::{
    InMemoryColumnValueRepository, InMemoryFormulaDefinitionRepository, InMemoryFormulaRepository,
    InMemorySchemaRepository,
};
