//! Versioned JSON document store.
//!
//! Documents live in named collections and are addressed by an opaque id.
//! Every document carries a [`Version`] that increments on each write; all
//! writes go through a [`WriteBatch`] that is applied atomically, with each
//! update or delete checked against the version the caller last read.

pub mod batch;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use batch::{WriteBatch, WriteOp};
pub use document::{Document, DocumentKey, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{DocumentQuery, SortOrder};
pub use store::{DocumentStore, DocumentStoreExt};
