use axum::{
    Json,
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::header,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, TryStreamExt, channel::mpsc, stream};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    audit::{AuditEntry, AuditQuery},
    export::{self, EXPORT_FILENAME},
    inquiries::Inquiry,
    store::StoreError,
    web::{AdminSession, ApiError, AppState, store_failure},
};

/// Rows buffered between the store reader and the response body.
const EXPORT_BUFFER: usize = 64;

pub async fn export_inquiries(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
) -> Result<Response, ApiError> {
    let (mut sender, mut receiver) = mpsc::channel::<Result<Inquiry, StoreError>>(EXPORT_BUFFER);

    let store = state.store().clone();
    tokio::spawn(async move {
        let mut rows = store.stream_all();
        while let Some(row) = rows.next().await {
            let failed = row.is_err();
            if sender.send(row).await.is_err() || failed {
                break;
            }
        }
    });

    // A failure before the first row can still become a proper error response.
    let first = match receiver.next().await {
        Some(Err(err)) => return Err(store_failure("failed to export inquiries")(err)),
        first => first,
    };

    info!(admin = %admin, "exporting inquiries");

    let rows = export::encode(stream::iter(first).chain(receiver))
        .inspect_err(|err| error!(?err, "inquiry export aborted mid-stream"));

    let content_type = mime::TEXT_CSV_UTF_8.to_string();
    let disposition = format!("attachment; filename={EXPORT_FILENAME}");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(rows),
    )
        .into_response())
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditParams {
    #[serde(default)]
    inquiry_id: Option<i64>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct AuditResponse {
    entries: Vec<AuditEntry>,
}

pub async fn audit_log(
    State(state): State<AppState>,
    _session: AdminSession,
    params: Result<Query<AuditParams>, QueryRejection>,
) -> Result<Json<AuditResponse>, ApiError> {
    let Query(params) = params.map_err(|err| ApiError::InvalidParameter(err.body_text()))?;
    let query = AuditQuery::new(params.inquiry_id, params.limit);
    let entries = state
        .store()
        .audit_entries(&query)
        .await
        .map_err(store_failure("failed to read audit log"))?;

    Ok(Json(AuditResponse { entries }))
}
