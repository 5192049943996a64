use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::web::{ApiError, AppState, admin, auth, cors::cors_layer, inquiries};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origins());

    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/inquiries",
            post(inquiries::create_inquiry).get(inquiries::list_inquiries),
        )
        .route(
            "/inquiries/:id",
            get(inquiries::get_inquiry)
                .patch(inquiries::update_inquiry)
                .delete(inquiries::delete_inquiry),
        )
        .route("/admin/login", post(auth::login))
        .route("/admin/export", get(admin::export_inquiries))
        .route("/admin/audit", get(admin::audit_log))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
