use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Document, DocumentKey, DocumentQuery, DocumentStoreError, Result, Version, WriteBatch,
    WriteOp,
    query::{SortOrder, compare_json},
    store::DocumentStore,
};

/// In-memory document store implementation for testing and single-node runs.
///
/// Commits take the write lock for the whole batch, so version checks and
/// writes are observed atomically by every other reader and writer.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<DocumentKey, Document>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let store = self.documents.read().await;
        Ok(store.get(&DocumentKey::new(collection, id)).cloned())
    }

    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        let store = self.documents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.get(&DocumentKey::new(collection, id.as_str())).cloned())
            .collect())
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let store = self.documents.read().await;
        let mut documents: Vec<_> = store
            .values()
            .filter(|d| d.key.collection == query.collection && query.matches(&d.body))
            .cloned()
            .collect();

        if let Some((field, order)) = &query.sort {
            documents.sort_by(|a, b| {
                let ordering = compare_json(a.field(field), b.field(field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        } else {
            documents.sort_by(|a, b| a.key.id.cmp(&b.key.id));
        }

        let offset = query.offset.unwrap_or(0);
        let documents = documents.into_iter().skip(offset);
        let documents: Vec<_> = match query.limit {
            Some(limit) => documents.take(limit).collect(),
            None => documents.collect(),
        };

        Ok(documents)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let store = self.documents.read().await;
        Ok(store
            .keys()
            .filter(|k| k.collection == collection)
            .count() as u64)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Option<Version>>> {
        batch.validate()?;

        let mut store = self.documents.write().await;

        // Check every expectation before touching anything
        for op in batch.ops() {
            let actual = store.get(op.key()).map(|d| d.version);
            if actual != op.expected() {
                metrics::counter!("document_store_conflicts_total").increment(1);
                tracing::debug!(key = %op.key(), ?actual, "version check failed");
                return Err(DocumentStoreError::ConcurrencyConflict {
                    key: op.key().clone(),
                    expected: op.expected(),
                    actual,
                });
            }
        }

        let now = Utc::now();
        let mut versions = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert { key, body } => {
                    let version = Version::first();
                    store.insert(
                        key.clone(),
                        Document {
                            key,
                            version,
                            updated_at: now,
                            body,
                        },
                    );
                    versions.push(Some(version));
                }
                WriteOp::Update {
                    key,
                    expected,
                    body,
                } => {
                    let version = expected.next();
                    store.insert(
                        key.clone(),
                        Document {
                            key,
                            version,
                            updated_at: now,
                            body,
                        },
                    );
                    versions.push(Some(version));
                }
                WriteOp::Delete { key, .. } => {
                    store.remove(&key);
                    versions.push(None);
                }
            }
        }

        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentStoreExt;
    use serde_json::json;

    async fn seed(store: &InMemoryDocumentStore, collection: &str, id: &str, body: serde_json::Value) {
        store
            .commit(WriteBatch::new().insert(collection, id, &body).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "products", "p1", json!({"price": 1000})).await;

        let doc = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(doc.version, Version::first());
        assert_eq!(doc.body["price"], 1000);
        assert!(store.get("products", "p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_existing_key_conflicts() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "carts", "c1", json!({})).await;

        let result = store
            .commit(WriteBatch::new().insert("carts", "c1", &json!({})).unwrap())
            .await;

        assert!(matches!(
            result,
            Err(DocumentStoreError::ConcurrencyConflict {
                expected: None,
                actual: Some(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn update_with_current_version_bumps_version() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "products", "p1", json!({"stock": 5})).await;

        let versions = store
            .commit(
                WriteBatch::new()
                    .update("products", "p1", Version::first(), &json!({"stock": 4}))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(versions, vec![Some(Version::new(2))]);
        let doc = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(doc.body["stock"], 4);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "products", "p1", json!({"stock": 5})).await;
        store
            .commit(
                WriteBatch::new()
                    .update("products", "p1", Version::first(), &json!({"stock": 4}))
                    .unwrap(),
            )
            .await
            .unwrap();

        let result = store
            .commit(
                WriteBatch::new()
                    .update("products", "p1", Version::first(), &json!({"stock": 3}))
                    .unwrap(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_conflict());
        let doc = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(doc.body["stock"], 4);
    }

    #[tokio::test]
    async fn failing_batch_applies_nothing() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "products", "p1", json!({"stock": 5})).await;

        let batch = WriteBatch::new()
            .insert("orders", "o1", &json!({"total": 10}))
            .unwrap()
            .update("products", "p1", Version::new(9), &json!({"stock": 0}))
            .unwrap();

        assert!(store.commit(batch).await.is_err());
        assert!(store.get("orders", "o1").await.unwrap().is_none());
        let product = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(product.version, Version::first());
        assert_eq!(product.body, json!({"stock": 5}));
    }

    #[tokio::test]
    async fn delete_requires_matching_version() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "orders", "o1", json!({})).await;

        let stale = store
            .commit(WriteBatch::new().delete("orders", "o1", Version::new(4)))
            .await;
        assert!(stale.is_err());

        let versions = store
            .commit(WriteBatch::new().delete("orders", "o1", Version::first()))
            .await
            .unwrap();
        assert_eq!(versions, vec![None]);
        assert!(!store.exists("orders", "o1").await.unwrap());
    }

    #[tokio::test]
    async fn find_filters_sorts_and_limits() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "orders", "a", json!({"user": "u1", "placed": "2024-01-02"})).await;
        seed(&store, "orders", "b", json!({"user": "u2", "placed": "2024-01-03"})).await;
        seed(&store, "orders", "c", json!({"user": "u1", "placed": "2024-01-05"})).await;
        seed(&store, "carts", "d", json!({"user": "u1"})).await;

        let query = DocumentQuery::collection("orders")
            .filter("user", "u1")
            .sort_desc("placed");
        let found = store.find(query).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.key.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let first = store
            .find_one(DocumentQuery::collection("orders").sort_asc("placed"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.key.id, "a");

        assert_eq!(store.count("orders").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn get_many_skips_missing_and_keeps_order() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "lines", "1", json!({"q": 1})).await;
        seed(&store, "lines", "2", json!({"q": 2})).await;

        let ids = vec!["2".to_string(), "missing".to_string(), "1".to_string()];
        let docs = store.get_many("lines", &ids).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.key.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }
}
