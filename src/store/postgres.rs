use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::try_join;
use tracing::info;

use super::{Audited, InquiryStore, StoreError};
use crate::{
    audit::{self, AuditEntry, AuditQuery, PendingAudit},
    auth::AdminIdentity,
    inquiries::{Inquiry, InquiryPage, ListQuery, ValidInquiry},
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS inquiries (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        location TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_inquiries_created_at ON inquiries (created_at DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id BIGSERIAL PRIMARY KEY,
        action TEXT NOT NULL CHECK (action IN ('edit', 'delete')),
        inquiry_id BIGINT NOT NULL,
        admin TEXT NOT NULL,
        details JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_inquiry ON audit_log (inquiry_id, created_at DESC)",
];

const INQUIRY_COLUMNS: &str = "id, name, email, location, message, created_at";

const EXPORT_QUERY: &str = "SELECT id, name, email, location, message, created_at
    FROM inquiries ORDER BY created_at DESC, id DESC";

const SEARCH_PREDICATE: &str = "($1::text IS NULL
    OR name ILIKE $1 OR email ILIKE $1 OR location ILIKE $1 OR message ILIKE $1)";

#[derive(Clone)]
pub struct PgInquiryStore {
    pool: PgPool,
}

impl PgInquiryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;

        Ok(Self::new(pool))
    }

    /// Creates the tables if they are missing. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to ensure inquiry schema")?;
        }
        info!("inquiry schema ready");
        Ok(())
    }
}

/// Turns free text into an ILIKE pattern that matches it literally anywhere.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl InquiryStore for PgInquiryStore {
    async fn create(&self, fields: &ValidInquiry) -> Result<Inquiry, StoreError> {
        let inquiry = sqlx::query_as::<_, Inquiry>(&format!(
            "INSERT INTO inquiries (name, email, location, message) VALUES ($1, $2, $3, $4)
             RETURNING {INQUIRY_COLUMNS}"
        ))
        .bind(fields.name())
        .bind(fields.email())
        .bind(fields.location())
        .bind(fields.message())
        .fetch_one(&self.pool)
        .await?;

        Ok(inquiry)
    }

    async fn list(&self, query: &ListQuery) -> Result<InquiryPage, StoreError> {
        let pattern = query.search().map(like_pattern);
        let limit = i64::from(query.page_size());
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        let count_sql = format!("SELECT COUNT(*) FROM inquiries WHERE {SEARCH_PREDICATE}");
        let page_sql = format!(
            "SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE {SEARCH_PREDICATE}
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );

        let count = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(pattern.as_deref())
            .fetch_one(&self.pool);
        let page = sqlx::query_as::<_, Inquiry>(&page_sql)
            .bind(pattern.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool);

        let (total, inquiries) = try_join!(count, page)?;

        Ok(InquiryPage {
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page(),
            page_size: query.page_size(),
            inquiries,
        })
    }

    async fn get(&self, id: i64) -> Result<Inquiry, StoreError> {
        sqlx::query_as::<_, Inquiry>(&format!(
            "SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn update(
        &self,
        id: i64,
        fields: &ValidInquiry,
        admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The row lock serializes concurrent edits/deletes of the same inquiry
        // so the audit snapshot always matches the committed state.
        let before = sqlx::query_as::<_, Inquiry>(&format!(
            "SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let after = sqlx::query_as::<_, Inquiry>(&format!(
            "UPDATE inquiries SET name = $2, email = $3, location = $4, message = $5
             WHERE id = $1
             RETURNING {INQUIRY_COLUMNS}"
        ))
        .bind(id)
        .bind(fields.name())
        .bind(fields.email())
        .bind(fields.location())
        .bind(fields.message())
        .fetch_one(&mut *tx)
        .await?;

        let audit = audit::record(&mut tx, PendingAudit::edit(&before, &after, admin)).await?;
        tx.commit().await?;

        Ok(Audited {
            value: after,
            audit,
        })
    }

    async fn delete(
        &self,
        id: i64,
        admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, Inquiry>(&format!(
            "DELETE FROM inquiries WHERE id = $1 RETURNING {INQUIRY_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let audit = audit::record(&mut tx, PendingAudit::deletion(&deleted, admin)).await?;
        tx.commit().await?;

        Ok(Audited {
            value: deleted,
            audit,
        })
    }

    fn stream_all(&self) -> BoxStream<'_, Result<Inquiry, StoreError>> {
        sqlx::query_as::<_, Inquiry>(EXPORT_QUERY)
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .boxed()
    }

    async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        audit::fetch_recent(&mut conn, query).await
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("inquiry store connections closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("jane"), "%jane%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
