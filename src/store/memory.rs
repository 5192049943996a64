use std::{
    cmp::Reverse,
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};

use super::{Audited, InquiryStore, StoreError};
use crate::{
    audit::{AuditEntry, AuditQuery, PendingAudit},
    auth::AdminIdentity,
    inquiries::{Inquiry, InquiryPage, ListQuery, ValidInquiry},
};

/// In-process store for local runs and tests.
///
/// Every mutation and its audit entry happen under one lock, which gives the
/// same all-or-nothing behavior as the Postgres transaction.
#[derive(Default)]
pub struct MemoryInquiryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_inquiry_id: i64,
    next_audit_id: i64,
    last_created_at: Option<DateTime<Utc>>,
    inquiries: BTreeMap<i64, Inquiry>,
    audit_log: Vec<AuditEntry>,
    reject_audit_writes: bool,
}

impl MemoryState {
    /// Creation timestamps never run backwards, even if the wall clock does.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = self.last_created_at.map_or(now, |last| last.max(now));
        self.last_created_at = Some(created_at);
        created_at
    }

    /// Runs before the row itself changes, so a rejected append leaves the
    /// inquiry untouched.
    fn append_audit(&mut self, pending: PendingAudit) -> Result<AuditEntry, StoreError> {
        if self.reject_audit_writes {
            return Err(StoreError::Unavailable("audit log rejected write".to_string()));
        }
        self.next_audit_id += 1;
        let entry = pending.into_entry(self.next_audit_id, Utc::now());
        self.audit_log.push(entry.clone());
        Ok(entry)
    }

    fn newest_first(&self) -> Vec<&Inquiry> {
        let mut rows: Vec<&Inquiry> = self.inquiries.values().collect();
        rows.sort_by_key(|inquiry| Reverse((inquiry.created_at, inquiry.id)));
        rows
    }
}

impl MemoryInquiryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit entries written so far.
    pub fn audit_len(&self) -> usize {
        self.lock().map(|state| state.audit_log.len()).unwrap_or(0)
    }

    /// Makes every subsequent audit append fail, as a broken audit table would.
    pub fn reject_audit_writes(&self, reject: bool) {
        if let Ok(mut state) = self.lock() {
            state.reject_audit_writes = reject;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl InquiryStore for MemoryInquiryStore {
    async fn create(&self, fields: &ValidInquiry) -> Result<Inquiry, StoreError> {
        let mut state = self.lock()?;
        state.next_inquiry_id += 1;
        let created_at = state.next_created_at();
        let inquiry = Inquiry {
            id: state.next_inquiry_id,
            name: fields.name().to_string(),
            email: fields.email().to_string(),
            location: fields.location().to_string(),
            message: fields.message().to_string(),
            created_at,
        };
        state.inquiries.insert(inquiry.id, inquiry.clone());
        Ok(inquiry)
    }

    async fn list(&self, query: &ListQuery) -> Result<InquiryPage, StoreError> {
        let state = self.lock()?;
        let needle = query.search().map(str::to_lowercase);

        let matching: Vec<&Inquiry> = state
            .newest_first()
            .into_iter()
            .filter(|inquiry| match &needle {
                Some(needle) => inquiry.matches(needle),
                None => true,
            })
            .collect();

        let total = matching.len() as u64;
        let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let inquiries = matching
            .into_iter()
            .skip(skip)
            .take(query.page_size() as usize)
            .cloned()
            .collect();

        Ok(InquiryPage {
            total,
            page: query.page(),
            page_size: query.page_size(),
            inquiries,
        })
    }

    async fn get(&self, id: i64) -> Result<Inquiry, StoreError> {
        let state = self.lock()?;
        state
            .inquiries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(
        &self,
        id: i64,
        fields: &ValidInquiry,
        admin: &AdminIdentity,
    ) -> Result<Audited<Inquiry>, StoreError> {
        let mut state = self.lock()?;
        let before = state
            .inquiries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;

        let mut after = before.clone();
        after.apply(fields);

        let audit = state.append_audit(PendingAudit::edit(&before, &after, admin))?;
        state.inquiries.insert(id, after.clone());

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
        let mut state = self.lock()?;
        let deleted = state
            .inquiries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;

        let audit = state.append_audit(PendingAudit::deletion(&deleted, admin))?;
        state.inquiries.remove(&id);

        Ok(Audited {
            value: deleted,
            audit,
        })
    }

    fn stream_all(&self) -> BoxStream<'_, Result<Inquiry, StoreError>> {
        let rows: Vec<Result<Inquiry, StoreError>> = match self.lock() {
            Ok(state) => state.newest_first().into_iter().cloned().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        stream::iter(rows).boxed()
    }

    async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock()?;
        let mut entries: Vec<AuditEntry> = state
            .audit_log
            .iter()
            .filter(|entry| query.inquiry_id.is_none_or(|id| entry.inquiry_id == id))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| Reverse((entry.created_at, entry.id)));
        entries.truncate(query.limit as usize);
        Ok(entries)
    }
}
