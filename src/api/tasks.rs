//! Task handlers, including the drag-and-drop reorder endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::auth::{ApiJson, CurrentUser};
use super::server::{ApiServer, Success, success};
use crate::error::ApiResult;
use crate::position::Placement;
use crate::types::{NewTask, TaskCard, TaskDetail, TaskUpdate};

/// Body of `PUT /api/tasks`: the full renumbering of every affected column.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct ReorderRequest {
    #[serde(default)]
    tasks: Option<Vec<Placement>>,
}

pub(super) async fn create_task(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    ApiJson(input): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<TaskCard>)> {
    let card = state.store().create_task(input).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub(super) async fn reorder_tasks(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> ApiResult<Json<Success>> {
    // A missing array is reported the same way as an empty one.
    let placements = request.tasks.unwrap_or_default();
    state.store().reorder_tasks(placements).await?;
    Ok(success())
}

pub(super) async fn get_task(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskDetail>> {
    Ok(Json(state.store().get_task(&id).await?))
}

pub(super) async fn update_task(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<TaskUpdate>,
) -> ApiResult<Json<TaskCard>> {
    Ok(Json(state.store().update_task(&id, update).await?))
}

pub(super) async fn delete_task(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_task(&id).await?;
    Ok(success())
}
