/*
 * Responsibility
 * - GET /users/{id}
 * - routes.rs で login + ownership(PathParam) guard 済みの前提
 */
use axum::{Json, extract::Path, http::StatusCode};

use crate::api::v1::dto::users::UserResponse;
use crate::middleware::auth::id_location::parse_path_id;

pub async fn get_user(Path(raw_id): Path<String>) -> Result<Json<UserResponse>, StatusCode> {
    // Same parser as the guard, so `0x2a` and `42` address the same user.
    let id = parse_path_id(&raw_id).ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(UserResponse { id }))
}
