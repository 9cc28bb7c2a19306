//! Time tracking handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::auth::{ApiJson, CurrentUser};
use super::server::{ApiServer, Success, success};
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTimeEntry, TimeEntry, TimeEntryUpdate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TimeEntryQuery {
    task_id: Option<String>,
}

pub(super) async fn list_time_entries(
    State(state): State<ApiServer>,
    _user: CurrentUser,
    Query(query): Query<TimeEntryQuery>,
) -> ApiResult<Json<Vec<TimeEntry>>> {
    let task_id = query
        .task_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing_field("taskId"))?;
    Ok(Json(state.store().list_time_entries(&task_id).await?))
}

/// Log hours for the caller.
pub(super) async fn create_time_entry(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<NewTimeEntry>,
) -> ApiResult<(StatusCode, Json<TimeEntry>)> {
    let entry = state.store().create_time_entry(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub(super) async fn update_time_entry(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<TimeEntryUpdate>,
) -> ApiResult<Json<TimeEntry>> {
    Ok(Json(
        state
            .store()
            .update_time_entry(&user.id, &id, update)
            .await?,
    ))
}

pub(super) async fn delete_time_entry(
    State(state): State<ApiServer>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Success>> {
    state.store().delete_time_entry(&user.id, &id).await?;
    Ok(success())
}
