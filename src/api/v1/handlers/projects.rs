/*
 * Responsibility
 * - POST /projects
 * - ownership(BodyField) guard が body を読んだ後でも Json extractor でそのまま読める
 */
use axum::{Json, http::StatusCode};

use crate::api::v1::dto::projects::{CreateProjectRequest, ProjectResponse};

pub async fn create_project(
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), StatusCode> {
    req.validate().map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            user_id: req.user_id,
            name: req.name,
        }),
    ))
}
