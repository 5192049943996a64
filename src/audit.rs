use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgConnection;

use crate::{auth::AdminIdentity, inquiries::Inquiry, store::StoreError};

pub const DEFAULT_AUDIT_LIMIT: u32 = 50;
pub const MAX_AUDIT_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Edit,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Edit => "edit",
            AuditAction::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "edit" => Some(AuditAction::Edit),
            "delete" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one admin mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub action: AuditAction,
    pub inquiry_id: i64,
    pub admin: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn before(&self) -> Option<Inquiry> {
        self.snapshot("before")
    }

    pub fn after(&self) -> Option<Inquiry> {
        self.snapshot("after")
    }

    pub fn deleted(&self) -> Option<Inquiry> {
        self.snapshot("deleted")
    }

    fn snapshot(&self, key: &str) -> Option<Inquiry> {
        self.details
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// An audit entry that has not been written yet. Only the repository's
/// update and delete paths build these.
#[derive(Debug, Clone)]
pub struct PendingAudit {
    pub action: AuditAction,
    pub inquiry_id: i64,
    pub admin: String,
    pub details: Value,
}

impl PendingAudit {
    pub fn edit(before: &Inquiry, after: &Inquiry, admin: &AdminIdentity) -> Self {
        Self {
            action: AuditAction::Edit,
            inquiry_id: after.id,
            admin: admin.username.clone(),
            details: json!({ "before": before, "after": after }),
        }
    }

    pub fn deletion(deleted: &Inquiry, admin: &AdminIdentity) -> Self {
        Self {
            action: AuditAction::Delete,
            inquiry_id: deleted.id,
            admin: admin.username.clone(),
            details: json!({ "deleted": deleted }),
        }
    }

    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            action: self.action,
            inquiry_id: self.inquiry_id,
            admin: self.admin,
            details: self.details,
            created_at,
        }
    }
}

/// Filter for reading the audit trail back, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub inquiry_id: Option<i64>,
    pub limit: u32,
}

impl AuditQuery {
    pub fn new(inquiry_id: Option<i64>, limit: Option<u32>) -> Self {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .min(MAX_AUDIT_LIMIT);
        Self { inquiry_id, limit }
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: i64,
    action: String,
    inquiry_id: i64,
    admin: String,
    details: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown audit action {}", row.action)))?;
        Ok(AuditEntry {
            id: row.id,
            action,
            inquiry_id: row.inquiry_id,
            admin: row.admin,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Appends `pending` on the caller's connection. Callers pass the
/// transaction that carries the mutation so both commit or neither does.
pub async fn record(
    conn: &mut PgConnection,
    pending: PendingAudit,
) -> Result<AuditEntry, StoreError> {
    let row = sqlx::query_as::<_, AuditRow>(
        "INSERT INTO audit_log (action, inquiry_id, admin, details) VALUES ($1, $2, $3, $4)
         RETURNING id, action, inquiry_id, admin, details, created_at",
    )
    .bind(pending.action.as_str())
    .bind(pending.inquiry_id)
    .bind(&pending.admin)
    .bind(&pending.details)
    .fetch_one(&mut *conn)
    .await?;

    AuditEntry::try_from(row)
}

pub async fn fetch_recent(
    conn: &mut PgConnection,
    query: &AuditQuery,
) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT id, action, inquiry_id, admin, details, created_at
         FROM audit_log
         WHERE $1::bigint IS NULL OR inquiry_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2",
    )
    .bind(query.inquiry_id)
    .bind(i64::from(query.limit))
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(AuditEntry::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry(id: i64, name: &str) -> Inquiry {
        Inquiry {
            id,
            name: name.to_string(),
            email: "jane@example.com".to_string(),
            location: "Lagos".to_string(),
            message: "Interested in a quote".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn edit_details_capture_both_snapshots() {
        let before = inquiry(4, "Jane");
        let after = inquiry(4, "Janet");
        let entry = PendingAudit::edit(&before, &after, &AdminIdentity::new("admin"))
            .into_entry(1, Utc::now());

        assert_eq!(entry.action, AuditAction::Edit);
        assert_eq!(entry.inquiry_id, 4);
        assert_eq!(entry.before(), Some(before));
        assert_eq!(entry.after(), Some(after));
        assert!(entry.deleted().is_none());
    }

    #[test]
    fn delete_details_capture_final_snapshot() {
        let deleted = inquiry(9, "Kemi");
        let entry = PendingAudit::deletion(&deleted, &AdminIdentity::new("admin"))
            .into_entry(2, Utc::now());

        assert_eq!(entry.action, AuditAction::Delete);
        assert_eq!(entry.admin, "admin");
        assert_eq!(entry.deleted(), Some(deleted));
    }

    #[test]
    fn audit_query_limits_are_bounded() {
        assert_eq!(AuditQuery::new(None, None).limit, DEFAULT_AUDIT_LIMIT);
        assert_eq!(AuditQuery::new(None, Some(0)).limit, DEFAULT_AUDIT_LIMIT);
        assert_eq!(AuditQuery::new(Some(3), Some(10_000)).limit, MAX_AUDIT_LIMIT);
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AuditAction::Delete).expect("serialize"),
            json!("delete")
        );
        assert_eq!(AuditAction::parse("edit"), Some(AuditAction::Edit));
        assert_eq!(AuditAction::parse("purge"), None);
    }
}
