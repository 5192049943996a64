use axum::{
    Json, async_trait,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejectionReason,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    auth::{AdminIdentity, TokenError, Verification},
    web::{ApiError, AppState},
};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::MalformedBody(err.body_text()))?;

    let identity = match state.admin().verify(&request.username, &request.password) {
        Verification::Authorized(identity) => identity,
        Verification::Unauthorized => {
            warn!(username = %request.username, "rejected admin login");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let issued = state.tokens().issue(&identity, Utc::now()).map_err(|err| {
        error!(?err, "failed to issue session token");
        ApiError::Dependency("failed to issue session token")
    })?;

    info!(admin = %identity, token_id = %issued.token_id, "admin logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Admin identity resolved from the request's bearer token.
///
/// Taking this extractor is what puts a handler behind the authorization
/// gate; the rejection short-circuits with a 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AdminSession(pub AdminIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| match rejection.reason() {
                    TypedHeaderRejectionReason::Missing => ApiError::Unauthorized,
                    _ => {
                        warn!("malformed authorization header");
                        ApiError::InvalidToken
                    }
                })?;

        match state.tokens().validate(bearer.token(), Utc::now()) {
            Ok(identity) => Ok(AdminSession(identity)),
            Err(TokenError::Expired(expired_at)) => {
                info!(%expired_at, "rejected expired session token");
                Err(ApiError::TokenExpired)
            }
            Err(err) => {
                warn!(?err, "rejected invalid session token");
                Err(ApiError::InvalidToken)
            }
        }
    }
}
