//! Project handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::debug;

use super::auth::{ApiJson, CurrentUser};
use super::server::{ApiServer, Success, success};
use crate::error::ApiResult;
use crate::types::{NewProject, Project, ProjectBoard, ProjectSummary, ProjectUpdate};

pub(super) async fn list_projects(
    State(state): State<ApiServer>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    Ok(Json(state.store().list_projects().await?))
}

/// Create a project owned by the caller.
pub(super) async fn create_project(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<ProjectBoard>)> {
    let board = state.store().create_project(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

pub(super) async fn get_project(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectBoard>> {
    debug!(project_id = %id, "Loading board");
    Ok(Json(state.store().get_project(&id).await?))
}

pub(super) async fn update_project(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.store().update_project(&id, update).await?))
}

pub(super) async fn delete_project(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_project(&id).await?;
    Ok(success())
}
