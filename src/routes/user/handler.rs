use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
};

use super::model::{UpdateUsernameRequest, User};
use crate::{
    AppState,
    error::AppError,
    middleware::CurrentUser,
    utils::{success_to_api_response, validate_username},
};

#[axum::debug_handler]
pub async fn update_username(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = req.username.trim();
    validate_username(username).map_err(AppError::Validation)?;

    let user = User::update_username(&state.pool, current.user_id, username).await?;
    Ok(success_to_api_response(user))
}
