//! Caller Identity Handler

use axum::{extract::State, Json};

use crate::application::dto::response::MeResponse;
use crate::presentation::http::extractors::CallerIdentity;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Who is calling: a session user, or an application acting for a user.
pub async fn me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<MeResponse>, AppError> {
    let username = match caller.user_id() {
        Some(user_id) => state.users.find_username(user_id).await?,
        None => None,
    };

    Ok(Json(match &caller {
        CallerIdentity::Session(user) => MeResponse::session(user.user_id, username),
        CallerIdentity::OAuth(context) => MeResponse::oauth(context, username),
    }))
}
