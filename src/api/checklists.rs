//! Checklist and checklist item handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::auth::{ApiJson, CurrentUser};
use super::server::{ApiServer, Success, success};
use crate::error::ApiResult;
use crate::types::{Checklist, ChecklistItem, ChecklistItemUpdate, NewChecklist, NewChecklistItem};

#[derive(Debug, Deserialize)]
pub(super) struct RenameChecklist {
    #[serde(default)]
    title: String,
}

pub(super) async fn create_checklist(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    ApiJson(input): ApiJson<NewChecklist>,
) -> ApiResult<(StatusCode, Json<Checklist>)> {
    let checklist = state.store().create_checklist(input).await?;
    Ok((StatusCode::CREATED, Json(checklist)))
}

pub(super) async fn rename_checklist(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RenameChecklist>,
) -> ApiResult<Json<Checklist>> {
    Ok(Json(state.store().rename_checklist(&id, body.title).await?))
}

pub(super) async fn delete_checklist(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_checklist(&id).await?;
    Ok(success())
}

pub(super) async fn create_checklist_item(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    ApiJson(input): ApiJson<NewChecklistItem>,
) -> ApiResult<(StatusCode, Json<ChecklistItem>)> {
    let item = state.store().create_checklist_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub(super) async fn update_checklist_item(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ChecklistItemUpdate>,
) -> ApiResult<Json<ChecklistItem>> {
    Ok(Json(state.store().update_checklist_item(&id, update).await?))
}

pub(super) async fn delete_checklist_item(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_checklist_item(&id).await?;
    Ok(success())
}
