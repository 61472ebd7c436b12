use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};

use crate::{
    Document, DocumentKey, DocumentQuery, DocumentStoreError, Result, Version, WriteBatch,
    WriteOp,
    query::SortOrder,
    store::DocumentStore,
};

/// PostgreSQL-backed document store implementation.
///
/// Each batch runs in one transaction. Updates and deletes carry the expected
/// version in their `WHERE` clause, so a concurrent writer that got there
/// first makes the statement match zero rows and the transaction is rolled
/// back.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            key: DocumentKey::new(
                row.try_get::<String, _>("collection")?,
                row.try_get::<String, _>("id")?,
            ),
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        key: &DocumentKey,
    ) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(&key.collection)
                .bind(&key.id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(version.map(Version::new))
    }

    async fn conflict(
        tx: &mut Transaction<'_, Postgres>,
        key: DocumentKey,
        expected: Option<Version>,
    ) -> DocumentStoreError {
        metrics::counter!("document_store_conflicts_total").increment(1);
        tracing::debug!(%key, ?expected, "version check failed, rolling back batch");
        match Self::current_version(tx, &key).await {
            Ok(actual) => DocumentStoreError::ConcurrencyConflict {
                key,
                expected,
                actual,
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn get_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND id = ANY($2)
            "#,
        )
        .bind(collection)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut documents = rows
            .into_iter()
            .map(Self::row_to_document)
            .collect::<Result<Vec<_>>>()?;

        documents.sort_by_key(|d| ids.iter().position(|id| *id == d.key.id));
        Ok(documents)
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT collection, id, version, body, updated_at FROM documents WHERE collection = ",
        );
        builder.push_bind(&query.collection);
        builder.push(" AND body @> ");
        builder.push_bind(query.filter_object());

        // Missing fields sort first ascending, matching the in-memory store
        match &query.sort {
            Some((field, order)) => {
                builder.push(" ORDER BY body -> ");
                builder.push_bind(field.as_str());
                builder.push(match order {
                    SortOrder::Ascending => " ASC NULLS FIRST, id ASC",
                    SortOrder::Descending => " DESC NULLS LAST, id ASC",
                });
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Option<Version>>> {
        batch.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut versions = Vec::with_capacity(batch.len());

        for op in batch.into_ops() {
            match op {
                WriteOp::Insert { key, body } => {
                    let inserted = sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, version, body, updated_at)
                        VALUES ($1, $2, 1, $3, NOW())
                        ON CONFLICT (collection, id) DO NOTHING
                        "#,
                    )
                    .bind(&key.collection)
                    .bind(&key.id)
                    .bind(&body)
                    .execute(&mut *tx)
                    .await?;

                    if inserted.rows_affected() == 0 {
                        return Err(Self::conflict(&mut tx, key, None).await);
                    }
                    versions.push(Some(Version::first()));
                }
                WriteOp::Update {
                    key,
                    expected,
                    body,
                } => {
                    let version: Option<i64> = sqlx::query_scalar(
                        r#"
                        UPDATE documents
                        SET body = $3, version = version + 1, updated_at = NOW()
                        WHERE collection = $1 AND id = $2 AND version = $4
                        RETURNING version
                        "#,
                    )
                    .bind(&key.collection)
                    .bind(&key.id)
                    .bind(&body)
                    .bind(expected.as_i64())
                    .fetch_optional(&mut *tx)
                    .await?;

                    match version {
                        Some(v) => versions.push(Some(Version::new(v))),
                        None => return Err(Self::conflict(&mut tx, key, Some(expected)).await),
                    }
                }
                WriteOp::Delete { key, expected } => {
                    let deleted = sqlx::query(
                        "DELETE FROM documents WHERE collection = $1 AND id = $2 AND version = $3",
                    )
                    .bind(&key.collection)
                    .bind(&key.id)
                    .bind(expected.as_i64())
                    .execute(&mut *tx)
                    .await?;

                    if deleted.rows_affected() == 0 {
                        return Err(Self::conflict(&mut tx, key, Some(expected)).await);
                    }
                    versions.push(None);
                }
            }
        }

        tx.commit().await?;
        Ok(versions)
    }
}
