use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    inquiries::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, Inquiry, InquiryFields, InquiryPage, ListQuery},
    notify,
    web::{AdminSession, ApiError, AppState, store_failure},
};

#[derive(Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    page: Option<String>,
    #[serde(default, rename = "pageSize")]
    page_size: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

impl ListParams {
    fn into_query(self) -> ListQuery {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let page_size = parse_positive(self.page_size.as_deref()).unwrap_or(DEFAULT_PAGE_SIZE);
        ListQuery::new(page, page_size, self.q.as_deref())
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

fn read_fields(
    payload: Result<Json<InquiryFields>, JsonRejection>,
) -> Result<InquiryFields, ApiError> {
    payload
        .map(|Json(fields)| fields)
        .map_err(|err| ApiError::MalformedBody(err.body_text()))
}

fn read_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|err| ApiError::InvalidParameter(err.body_text()))
}

pub async fn create_inquiry(
    State(state): State<AppState>,
    payload: Result<Json<InquiryFields>, JsonRejection>,
) -> Result<(StatusCode, Json<Inquiry>), ApiError> {
    let fields = read_fields(payload)?
        .validated()
        .map_err(ApiError::Validation)?;

    let inquiry = state
        .store()
        .create(&fields)
        .await
        .map_err(store_failure("failed to create inquiry"))?;

    info!(inquiry_id = inquiry.id, "inquiry received");
    notify::dispatch(state.notifier(), inquiry.clone());

    Ok((StatusCode::CREATED, Json(inquiry)))
}

pub async fn list_inquiries(
    State(state): State<AppState>,
    _session: AdminSession,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<InquiryPage>, ApiError> {
    let Query(params) = params.map_err(|err| ApiError::InvalidParameter(err.body_text()))?;
    let query = params.into_query();
    let page = state
        .store()
        .list(&query)
        .await
        .map_err(store_failure("failed to fetch inquiries"))?;

    Ok(Json(page))
}

pub async fn get_inquiry(
    State(state): State<AppState>,
    _session: AdminSession,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Inquiry>, ApiError> {
    let id = read_id(id)?;
    let inquiry = state
        .store()
        .get(id)
        .await
        .map_err(store_failure("failed to fetch inquiry"))?;

    Ok(Json(inquiry))
}

pub async fn update_inquiry(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<InquiryFields>, JsonRejection>,
) -> Result<Json<Inquiry>, ApiError> {
    let id = read_id(id)?;
    let fields = read_fields(payload)?
        .validated()
        .map_err(ApiError::Validation)?;

    let updated = state
        .store()
        .update(id, &fields, &admin)
        .await
        .map_err(store_failure("failed to update inquiry"))?;

    info!(
        inquiry_id = id,
        audit_id = updated.audit.id,
        admin = %admin,
        "inquiry updated"
    );

    Ok(Json(updated.value))
}

pub async fn delete_inquiry(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = read_id(id)?;
    let deleted = state
        .store()
        .delete(id, &admin)
        .await
        .map_err(store_failure("failed to delete inquiry"))?;

    info!(
        inquiry_id = id,
        audit_id = deleted.audit.id,
        admin = %admin,
        "inquiry deleted"
    );

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>, q: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            q: q.map(str::to_string),
        }
    }

    #[test]
    fn unparseable_paging_falls_back_to_defaults() {
        let query = params(Some("abc"), Some("-3"), None).into_query();
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), 10);
    }

    #[test]
    fn explicit_paging_is_kept() {
        let query = params(Some("4"), Some("25"), Some(" lagos ")).into_query();
        assert_eq!(query.page(), 4);
        assert_eq!(query.page_size(), 25);
        assert_eq!(query.search(), Some("lagos"));
    }

    #[test]
    fn missing_params_use_defaults() {
        assert_eq!(ListParams::default().into_query(), ListQuery::default());
    }
}
