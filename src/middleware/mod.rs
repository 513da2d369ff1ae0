/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: session gate (login / ownership guards)
 * - http: request id, tracing, limits
 */
pub mod auth;
pub mod http;
