//! Postgres-backed document store.
//!
//! All collections share one table of JSONB documents:
//!
//! ```text
//! catalog_documents(collection, id, seq, body)   PRIMARY KEY (collection, id)
//! ```
//!
//! `seq` records insertion order and is the store order for unsorted finds.
//! Each write is a single statement, so per-document updates are atomic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use super::{document_id, DocumentStore, Filter, FindOptions, JsonMap, SortDirection, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    seq BIGSERIAL NOT NULL,
    body JSONB NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS catalog_documents_seq_idx ON catalog_documents (collection, seq);
CREATE INDEX IF NOT EXISTS catalog_documents_active_idx
    ON catalog_documents (collection) WHERE (body->>'deleteDate') IS NULL;
"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the documents table and indexes if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

/// Append `collection = .. AND <filter>` to a query.
fn push_where(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    qb.push(" WHERE collection = ").push_bind(collection.to_string());

    if let Some(id) = &filter.id {
        qb.push(" AND id = ").push_bind(id.clone());
    }
    if filter.active_only {
        qb.push(" AND (body->>'deleteDate') IS NULL");
    }
    if let Some(text) = &filter.text {
        let pattern = text.effective_pattern();
        qb.push(" AND (FALSE");
        for field in &text.fields {
            qb.push(" OR COALESCE(body->>")
                .push_bind(field.to_string())
                .push(", '') ~* ")
                .push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

fn decode_body(row: &sqlx::postgres::PgRow) -> Result<JsonValue, StoreError> {
    row.try_get::<JsonValue, _>("body")
        .map_err(|e| StoreError::Backend(format!("failed to read document body: {e}")))
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self, filter, options), fields(collection = %collection), err)]
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<(Vec<JsonValue>, u64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM catalog_documents");
        push_where(&mut count, collection, filter);
        let total: i64 = count
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_documents", e))?
            .try_get("total")
            .map_err(|e| StoreError::Backend(format!("failed to read count: {e}")))?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT body FROM catalog_documents");
        push_where(&mut select, collection, filter);
        select.push(" ORDER BY ");
        if let Some(sort) = &options.sort {
            let path: Vec<String> = sort.field.split('.').map(str::to_string).collect();
            select.push("body #> ").push_bind(path).push("::text[]");
            select.push(match sort.direction {
                SortDirection::Asc => " ASC NULLS FIRST, ",
                SortDirection::Desc => " DESC NULLS LAST, ",
            });
        }
        select.push("seq ASC");
        if let Some(limit) = options.limit {
            select.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        select.push(" OFFSET ").push_bind(i64::try_from(options.skip).unwrap_or(i64::MAX));

        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_documents", e))?;
        let docs = rows.iter().map(decode_body).collect::<Result<Vec<_>, _>>()?;

        Ok((docs, total.max(0) as u64))
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<JsonValue, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT body FROM catalog_documents");
        push_where(&mut qb, collection, filter);
        qb.push(" ORDER BY seq ASC LIMIT 1");

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one", e))?
            .ok_or(StoreError::NotFound)?;
        decode_body(&row)
    }

    #[instrument(skip(self, document), fields(collection = %collection), err)]
    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        let result = sqlx::query(
            r#"
            INSERT INTO catalog_documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(id));
        }
        Ok(id)
    }

    #[instrument(skip(self, document), fields(collection = %collection), err)]
    async fn upsert(&self, collection: &str, document: JsonValue) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        sqlx::query(
            r#"
            INSERT INTO catalog_documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE
            SET body = EXCLUDED.body
                || jsonb_build_object('deleteDate', catalog_documents.body->'deleteDate')
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;

        Ok(id)
    }

    #[instrument(skip(self, filter, merge), fields(collection = %collection), err)]
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        merge: JsonMap,
    ) -> Result<JsonValue, StoreError> {
        if filter.id.is_none() {
            return Err(StoreError::InvalidFilter("update_one requires an id".to_string()));
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE catalog_documents SET body = body || ");
        qb.push_bind(JsonValue::Object(merge));
        push_where(&mut qb, collection, filter);
        qb.push(" RETURNING body");

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_one", e))?
            .ok_or(StoreError::NotFound)?;
        decode_body(&row)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StoreError::Conflict(format!("{operation}: {db_err}"))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::TextMatch;

    #[test]
    fn where_clause_binds_every_criterion() {
        let filter = Filter::active_by_id("x1").with_text(TextMatch::new("mug", &["title", "description"]));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT body FROM catalog_documents");
        push_where(&mut qb, "product", &filter);

        assert_eq!(
            qb.sql(),
            "SELECT body FROM catalog_documents WHERE collection = $1 AND id = $2 \
             AND (body->>'deleteDate') IS NULL \
             AND (FALSE OR COALESCE(body->>$3, '') ~* $4 OR COALESCE(body->>$5, '') ~* $6)"
        );
    }

    #[test]
    fn plain_filter_only_scopes_collection() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT body FROM catalog_documents");
        push_where(&mut qb, "category", &Filter::default());
        assert_eq!(qb.sql(), "SELECT body FROM catalog_documents WHERE collection = $1");
    }
}
