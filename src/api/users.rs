use axum::{extract::State, response::Json};

use super::auth::CurrentUser;
use super::server::ApiServer;
use crate::error::ApiResult;
use crate::types::User;

pub(super) async fn list_users(
    State(state): State<ApiServer>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.store().list_users().await?))
}
