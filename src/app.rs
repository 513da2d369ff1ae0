/*
 * Responsibility
 * - Config読み込み → 依存生成 (session store / gate) → Router 組み立て
 * - Middleware の適用 (HTTP layers, guards は routes 側)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::middleware::{self, auth::AuthGate};
use crate::services::{
    cache::MemoryClient,
    session::{CacheSessionStore, SessionStore},
};
use crate::{api, state::AppState};

fn init_tracing() {
    // Prefer RUST_LOG if set. Ex:
    // RUST_LOG=info,session_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: fail fast so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    let state = build_state(&config).await?;
    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        cookie = state.gate.cookie_name(),
        "starting session gate"
    );

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let store: Arc<dyn SessionStore> = match &config.valkey_url {
        Some(url) => {
            let store = CacheSessionStore::connect(url, config.session_key_prefix.clone()).await?;
            tracing::info!(backend = store.backend_name(), "session store connected");
            Arc::new(store)
        }
        None => {
            // Nothing writes to this store, so every guarded request is denied.
            tracing::warn!("VALKEY_URL not set; using empty in-process session store");
            Arc::new(CacheSessionStore::new_with_cache(
                Arc::new(MemoryClient::new()),
                config.session_key_prefix.clone(),
            ))
        }
    };

    let gate = AuthGate::new(store, config.session_cookie_name.clone())
        .with_lookup_timeout(config.session_lookup_timeout)
        .with_body_limit(config.request_body_limit_bytes);

    Ok(AppState::new(gate))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .with_state(state);

    middleware::http::apply(router, config)
}
