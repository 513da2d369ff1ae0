/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / body)
 * - Forbidden is plain text with the bare status phrase; nothing says which check failed
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("forbidden")]
    Forbidden,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
        };
        (status, status.canonical_reason().unwrap_or("Forbidden")).into_response()
    }
}
