//! Request authentication and the JSON body extractor.

use axum::{
    extract::{FromRequest, FromRequestParts, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::Json,
};

use super::server::{ApiServer, Success, success};
use crate::auth::parse_bearer;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::types::{Credentials, NewUser, Session, User};

/// The user a request acts as.
///
/// Resolved from `Authorization: Bearer <token>`. Without a header the
/// server's fallback user is used when one is configured; otherwise the
/// request is rejected as unauthenticated.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
}

impl FromRequestParts<ApiServer> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiServer,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => state
                .store()
                .user_for_token(token)
                .await?
                .map(CurrentUser)
                .ok_or_else(ApiError::unauthenticated),
            None => state
                .fallback_user()
                .cloned()
                .map(CurrentUser)
                .ok_or_else(ApiError::unauthenticated),
        }
    }
}

/// JSON body extractor whose rejection is an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::InvalidFieldValue, rejection.body_text())
    }
}

pub(super) async fn register(
    State(state): State<ApiServer>,
    ApiJson(input): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.store().register_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn login(
    State(state): State<ApiServer>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.store().login(credentials).await?))
}

pub(super) async fn logout(
    State(state): State<ApiServer>,
    headers: HeaderMap,
) -> ApiResult<Json<Success>> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthenticated)?;
    state.store().logout(token).await?;
    Ok(success())
}

pub(super) async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
