//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    DocumentQuery, DocumentStore, DocumentStoreError, DocumentStoreExt, PostgresDocumentStore,
    Version, WriteBatch,
};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an emptied table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

#[tokio::test]
async fn insert_and_get_document() {
    let store = get_test_store().await;

    let versions = store
        .commit(
            WriteBatch::new()
                .insert("products", "p1", &json!({"name": "Kettle", "price": 129900}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(versions, vec![Some(Version::first())]);

    let doc = store.get("products", "p1").await.unwrap().unwrap();
    assert_eq!(doc.version, Version::first());
    assert_eq!(doc.body["price"], 129900);
    assert!(!store.exists("products", "missing").await.unwrap());
}

#[tokio::test]
async fn duplicate_insert_reports_conflict() {
    let store = get_test_store().await;
    let batch = WriteBatch::new().insert("carts", "u1", &json!({})).unwrap();
    store.commit(batch.clone()).await.unwrap();

    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::ConcurrencyConflict {
            expected: None,
            actual: Some(v),
            ..
        } if v == Version::first()
    ));
}

#[tokio::test]
async fn stale_update_rolls_back_whole_batch() {
    let store = get_test_store().await;
    store
        .commit(
            WriteBatch::new()
                .insert("products", "p1", &json!({"stock": 3}))
                .unwrap(),
        )
        .await
        .unwrap();

    let batch = WriteBatch::new()
        .insert("orders", "o1", &json!({"total": 10}))
        .unwrap()
        .update("products", "p1", Version::new(5), &json!({"stock": 2}))
        .unwrap();

    let err = store.commit(batch).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(store.get("orders", "o1").await.unwrap().is_none());

    let product = store.get("products", "p1").await.unwrap().unwrap();
    assert_eq!(product.body["stock"], 3);
    assert_eq!(product.version, Version::first());
}

#[tokio::test]
async fn update_and_delete_advance_versions() {
    let store = get_test_store().await;
    store
        .commit(
            WriteBatch::new()
                .insert("orders", "o1", &json!({"status": "pending"}))
                .unwrap(),
        )
        .await
        .unwrap();

    let versions = store
        .commit(
            WriteBatch::new()
                .update("orders", "o1", Version::first(), &json!({"status": "paid"}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(versions, vec![Some(Version::new(2))]);

    let stale = store
        .commit(WriteBatch::new().delete("orders", "o1", Version::first()))
        .await;
    assert!(stale.is_err());

    store
        .commit(WriteBatch::new().delete("orders", "o1", Version::new(2)))
        .await
        .unwrap();
    assert_eq!(store.count("orders").await.unwrap(), 0);
}

#[tokio::test]
async fn find_filters_sorts_and_pages() {
    let store = get_test_store().await;
    let batch = WriteBatch::new()
        .insert("orders", "a", &json!({"user": "u1", "placed": "2024-01-02T00:00:00Z"}))
        .unwrap()
        .insert("orders", "b", &json!({"user": "u2", "placed": "2024-01-03T00:00:00Z"}))
        .unwrap()
        .insert("orders", "c", &json!({"user": "u1", "placed": "2024-01-05T00:00:00Z"}))
        .unwrap();
    store.commit(batch).await.unwrap();

    let newest_first = store
        .find(
            DocumentQuery::collection("orders")
                .filter("user", "u1")
                .sort_desc("placed"),
        )
        .await
        .unwrap();
    let ids: Vec<_> = newest_first.iter().map(|d| d.key.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);

    let second = store
        .find(DocumentQuery::collection("orders").sort_asc("placed").offset(1).limit(1))
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].key.id, "b");
}

#[tokio::test]
async fn get_many_preserves_requested_order() {
    let store = get_test_store().await;
    let batch = WriteBatch::new()
        .insert("lines", "1", &json!({"q": 1}))
        .unwrap()
        .insert("lines", "2", &json!({"q": 2}))
        .unwrap();
    store.commit(batch).await.unwrap();

    let ids = vec!["2".to_string(), "nope".to_string(), "1".to_string()];
    let docs = store.get_many("lines", &ids).await.unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.key.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
}
