mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    audit::{AuditEntry, AuditQuery},
    auth::AdminIdentity,
    inquiries::{Inquiry, InquiryPage, ListQuery, ValidInquiry},
};

pub use memory::MemoryInquiryStore;
pub use postgres::PgInquiryStore;

/// The result of a mutation together with the audit entry committed with it.
#[derive(Debug, Clone)]
pub struct Audited<T> {
    pub value: T,
    pub audit: AuditEntry,
}

/// System of record for inquiries and their audit trail.
///
/// `update` and `delete` write their audit entry in the same transaction as
/// the change itself. There is no standalone audit append.
#[async_trait]
pub trait InquiryStore: Send + Sync {
    async fn create(&self, fields: &ValidInquiry) -> Result<Inquiry, StoreError>;

    async fn list(&self, query: &ListQuery) -> Result<InquiryPage, StoreError>;

    async fn get(&self, id: i64) -> Result<Inquiry, StoreError>;

    async fn update(
        &self,
        id: i64,
        fields: &ValidInquiry,
        admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError>;

    /// Removes the inquiry; the returned value is its final snapshot.
    async fn delete(&self, id: i64, admin: &AdminIdentity)
    -> Result<Audited<Inquiry>, StoreError>;

    /// Every inquiry, newest first, yielded as rows arrive from storage.
    fn stream_all(&self) -> BoxStream<'_, Result<Inquiry, StoreError>>;

    async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError>;

    /// Releases backing connections. Called once on shutdown.
    async fn close(&self) {}
}

pub type DynInquiryStore = Arc<dyn InquiryStore>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("inquiry {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
