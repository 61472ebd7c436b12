//! Typed access to records kept in the document store.

use document_store::{DocumentQuery, DocumentStore, Version, WriteBatch};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// A record persisted as one document in a fixed collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection holding every record of this type.
    const COLLECTION: &'static str;

    /// Human-readable name used in not-found errors.
    const ENTITY: &'static str;

    /// Document id of this record.
    fn document_id(&self) -> String;
}

/// A record together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<R> {
    pub record: R,
    pub version: Version,
}

/// Loads and queries typed records.
///
/// Writes go through [`RecordBatch`] so that several records can be changed
/// in one atomic commit.
#[derive(Clone)]
pub struct Repository<S> {
    store: S,
}

impl<S: DocumentStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads a record, or None if it does not exist.
    pub async fn load<R: Record>(&self, id: &str) -> Result<Option<Versioned<R>>, DomainError> {
        match self.store.get(R::COLLECTION, id).await? {
            Some(doc) => Ok(Some(Versioned {
                record: doc.decode()?,
                version: doc.version,
            })),
            None => Ok(None),
        }
    }

    /// Loads a record, failing with `NotFound` if it does not exist.
    pub async fn require<R: Record>(&self, id: &str) -> Result<Versioned<R>, DomainError> {
        self.load(id)
            .await?
            .ok_or_else(|| DomainError::not_found(R::ENTITY, id))
    }

    /// Loads several records; missing ids are skipped.
    pub async fn load_many<R: Record>(
        &self,
        ids: &[String],
    ) -> Result<Vec<Versioned<R>>, DomainError> {
        self.store
            .get_many(R::COLLECTION, ids)
            .await?
            .into_iter()
            .map(|doc| {
                Ok(Versioned {
                    record: doc.decode()?,
                    version: doc.version,
                })
            })
            .collect()
    }

    /// Runs a query against the record's collection.
    ///
    /// The query's collection is overwritten with `R::COLLECTION`.
    pub async fn find<R: Record>(&self, mut query: DocumentQuery) -> Result<Vec<R>, DomainError> {
        query.collection = R::COLLECTION.to_string();
        self.store
            .find(query)
            .await?
            .into_iter()
            .map(|doc| doc.decode().map_err(DomainError::from))
            .collect()
    }

    pub async fn count<R: Record>(&self) -> Result<u64, DomainError> {
        Ok(self.store.count(R::COLLECTION).await?)
    }

    pub async fn commit(&self, batch: WriteBatch) -> Result<(), DomainError> {
        self.store.commit(batch).await?;
        Ok(())
    }
}

/// Record-aware builders on [`WriteBatch`].
pub trait RecordBatch: Sized {
    fn insert_record<R: Record>(self, record: &R) -> Result<Self, DomainError>;

    fn update_record<R: Record>(self, record: &R, expected: Version) -> Result<Self, DomainError>;

    fn delete_record<R: Record>(self, id: &str, expected: Version) -> Self;
}

impl RecordBatch for WriteBatch {
    fn insert_record<R: Record>(self, record: &R) -> Result<Self, DomainError> {
        Ok(self.insert(R::COLLECTION, record.document_id(), record)?)
    }

    fn update_record<R: Record>(self, record: &R, expected: Version) -> Result<Self, DomainError> {
        Ok(self.update(R::COLLECTION, record.document_id(), expected, record)?)
    }

    fn delete_record<R: Record>(self, id: &str, expected: Version) -> Self {
        self.delete(R::COLLECTION, id, expected)
    }
}
