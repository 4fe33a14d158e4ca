use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::{Document, DocumentStore, WriteBatch};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn document_from_row(row: &PgRow) -> anyhow::Result<Document> {
    let id: String = row.try_get("id")?;
    let Json(data): Json<Map<String, Value>> = row
        .try_get("data")
        .with_context(|| format!("document {id} does not hold a JSON object"))?;
    Ok(Document::new(id, data))
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, data FROM weekly_aggregates.documents WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to read {collection}"))?;

        rows.iter().map(document_from_row).collect()
    }

    async fn get_ordered(&self, collection: &str, field: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, data
            FROM weekly_aggregates.documents
            WHERE collection = $1 AND data ? $2
            ORDER BY data -> $2, id
            "#,
        )
        .bind(collection)
        .bind(field)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to read {collection} ordered by {field}"))?;

        rows.iter().map(document_from_row).collect()
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, data FROM weekly_aggregates.documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read {collection}/{id}"))?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let size = batch.len();
        let mut tx = self.pool.begin().await.context("failed to open batch")?;
        let commit_time: DateTime<Utc> = sqlx::query_scalar("SELECT now()")
            .fetch_one(&mut *tx)
            .await?;

        for write in batch.writes() {
            let data = write.resolve(commit_time);
            sqlx::query(
                r#"
                INSERT INTO weekly_aggregates.documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO UPDATE
                SET data = documents.data || EXCLUDED.data, updated_at = now()
                "#,
            )
            .bind(&write.collection)
            .bind(&write.id)
            .bind(Json(data))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write {}/{}", write.collection, write.id))?;
        }

        tx.commit().await.context("failed to commit batch")?;
        debug!(writes = size, "batch committed");
        Ok(())
    }
}
