/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - どの route にどの guard を掛けるかもここで決める
 *   - /health: none
 *   - /users/{id}: login + owner id from path
 *   - /projects: login + owner id from body
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{health::health, projects::create_project, users::get_user};
use crate::middleware::auth::IdLocation;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let gate = &state.gate;

    // route_layer: the last guard applied runs first (login before ownership).
    let users = Router::new().route("/users/{id}", get(get_user));
    let users = gate.ownership_guard(IdLocation::PathParam).apply(users);
    let users = gate.login_guard().apply(users);

    let projects = Router::new().route("/projects", post(create_project));
    let projects = gate.ownership_guard(IdLocation::BodyField).apply(projects);
    let projects = gate.login_guard().apply(projects);

    Router::new()
        .route("/health", get(health))
        .merge(users)
        .merge(projects)
}
