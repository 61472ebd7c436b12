use std::sync::Arc;

use async_trait::async_trait;

use crate::{Document, DocumentQuery, Result, Version, WriteBatch};

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Reads never lock;
/// consistency of read-modify-write cycles is enforced at commit time by the
/// version checks in the [`WriteBatch`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a single document.
    ///
    /// Returns None if the document doesn't exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Fetches several documents of one collection.
    ///
    /// Missing ids are skipped; results follow the order of `ids`.
    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>>;

    /// Retrieves documents matching a query.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Counts the documents in a collection.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Applies a batch of writes atomically.
    ///
    /// Returns the resulting version of each touched document, in batch
    /// order (`None` for deletes).
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Option<Version>>>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get(collection, id).await
    }

    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        (**self).get_many(collection, ids).await
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        (**self).find(query).await
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        (**self).count(collection).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Option<Version>>> {
        (**self).commit(batch).await
    }
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Returns the first document matching a query.
    async fn find_one(&self, query: DocumentQuery) -> Result<Option<Document>> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }

    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
