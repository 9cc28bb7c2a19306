use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::auth::{ApiJson, CurrentUser};
use super::server::{ApiServer, Success, success};
use crate::error::ApiResult;
use crate::types::{Comment, NewComment};

#[derive(Debug, Deserialize)]
pub(super) struct EditComment {
    #[serde(default)]
    content: String,
}

pub(super) async fn create_comment(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<NewComment>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state.store().create_comment(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(super) async fn update_comment(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<EditComment>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(
        state
            .store()
            .update_comment(&user.id, &id, body.content)
            .await?,
    ))
}

pub(super) async fn delete_comment(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_comment(&user.id, &id).await?;
    Ok(success())
}
