//! Session-based authorization gate.
//!
//! `AuthGate` owns nothing but a handle to the session store and the cookie
//! name. It hands out two guards:
//! - `LoginGuard`: the session must be marked `authenticated`
//! - `OwnershipGuard`: the request's owner id must equal the session `user_id`
//!
//! Every failure (store error, type mismatch, bad id) ends as the same 403 so
//! clients cannot tell which stage refused them. The reason is only logged.
//!
//! ```ignore
//! let users = Router::new().route("/users/{id}", get(get_user));
//! let users = gate.ownership_guard(IdLocation::PathParam).apply(users);
//! let users = gate.login_guard().apply(users);
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::middleware::auth::id_location::{ExtractError, IdLocation, extract_candidate};
use crate::services::session::{
    Session, SessionError, SessionStore, is_authenticated, session_owner_matches,
};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Why a request was refused. Never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum Denial {
    #[error("session lookup failed: {0}")]
    Lookup(#[from] SessionError),

    #[error("session is not authenticated")]
    NotAuthenticated,

    #[error("session user_id does not match candidate {candidate}")]
    OwnerMismatch { candidate: u64 },

    #[error("owner id extraction failed: {0}")]
    Extraction(#[from] ExtractError),
}

impl Denial {
    /// Backend trouble or a corrupt stored record; the rest is client input.
    pub fn is_operator_fault(&self) -> bool {
        matches!(
            self,
            Denial::Lookup(
                SessionError::Cache(_) | SessionError::Decode(_) | SessionError::Timeout
            )
        )
    }

    fn into_forbidden(self) -> AppError {
        if self.is_operator_fault() {
            tracing::warn!(reason = %self, "request denied");
        } else {
            tracing::debug!(reason = %self, "request denied");
        }
        AppError::Forbidden
    }
}

#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn SessionStore>,
    cookie_name: Arc<str>,
    lookup_timeout: Duration,
    body_limit: usize,
}

impl AuthGate {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Upper bound for buffering a body in `IdLocation::BodyField` mode.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn login_guard(&self) -> LoginGuard {
        LoginGuard { gate: self.clone() }
    }

    pub fn ownership_guard(&self, location: IdLocation) -> OwnershipGuard {
        OwnershipGuard {
            gate: self.clone(),
            location,
        }
    }

    // Fresh lookup per request. Dropping the request future drops this too.
    async fn load_session(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        match tokio::time::timeout(
            self.lookup_timeout,
            self.store.load(headers, &self.cookie_name),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(SessionError::Timeout),
        }
    }

    async fn check_login(&self, headers: &HeaderMap) -> Result<(), Denial> {
        let session = self.load_session(headers).await?;
        if is_authenticated(&session) {
            Ok(())
        } else {
            Err(Denial::NotAuthenticated)
        }
    }

    async fn check_owner(&self, headers: &HeaderMap, candidate: u64) -> Result<(), Denial> {
        let session = self.load_session(headers).await?;
        if session_owner_matches(&session, candidate) {
            Ok(())
        } else {
            Err(Denial::OwnerMismatch { candidate })
        }
    }
}

/// Forwards only requests whose session is `authenticated == true`.
#[derive(Clone)]
pub struct LoginGuard {
    gate: AuthGate,
}

impl LoginGuard {
    /// Guard every route currently registered on `router`.
    ///
    /// Must be called after the routes are added.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self, login_middleware))
    }
}

async fn login_middleware(
    State(guard): State<LoginGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard
        .gate
        .check_login(req.headers())
        .await
        .map_err(Denial::into_forbidden)?;

    Ok(next.run(req).await)
}

/// Forwards only requests whose owner id equals the session `user_id`.
#[derive(Clone)]
pub struct OwnershipGuard {
    gate: AuthGate,
    location: IdLocation,
}

impl OwnershipGuard {
    /// Guard every route currently registered on `router`.
    ///
    /// `route_layer` is required so path parameters are already matched.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self, ownership_middleware))
    }
}

async fn ownership_middleware(
    State(guard): State<OwnershipGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // The body (if read) is already reinstalled on `req` at this point.
    let (req, candidate) = extract_candidate(guard.location, req, guard.gate.body_limit).await;

    let decision = match candidate {
        Ok(id) => guard.gate.check_owner(req.headers(), id).await,
        Err(err) => Err(Denial::from(err)),
    };
    decision.map_err(Denial::into_forbidden)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::{future::Future, pin::Pin};

    use axum::{
        Extension,
        body::{Body, to_bytes},
        http::{StatusCode, header},
        routing::{get, post},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::auth::id_location::BufferedBody;
    use crate::services::cache::MemoryClient;
    use crate::services::session::{
        CacheSessionStore, SessionValue,
        record::{AUTHENTICATED_KEY, USER_ID_KEY},
    };

    const COOKIE: &str = "porter";

    async fn gate_with(sessions: &[(&str, Session)]) -> AuthGate {
        let cache = MemoryClient::new();
        for (id, session) in sessions {
            cache
                .insert(format!("session:{id}"), session.to_json().unwrap())
                .await;
        }
        let store = CacheSessionStore::new_with_cache(Arc::new(cache), "session");
        AuthGate::new(Arc::new(store), COOKIE)
    }

    fn logged_in(user_id: SessionValue) -> Session {
        Session::new()
            .with(AUTHENTICATED_KEY, SessionValue::Bool(true))
            .with(USER_ID_KEY, user_id)
    }

    async fn echo(body: String) -> String {
        body
    }

    async fn echo_buffered(Extension(buffered): Extension<BufferedBody>) -> Vec<u8> {
        buffered.0.to_vec()
    }

    fn login_router(gate: &AuthGate) -> Router {
        let router = Router::new().route("/users/{id}", get(|| async { "ok" }));
        gate.login_guard().apply(router)
    }

    fn path_router(gate: &AuthGate) -> Router {
        let router = Router::new().route("/users/{id}", get(|| async { "ok" }));
        let router = gate.ownership_guard(IdLocation::PathParam).apply(router);
        gate.login_guard().apply(router)
    }

    fn body_router(gate: &AuthGate) -> Router {
        let router = Router::new()
            .route("/projects", post(echo))
            .route("/projects/raw", post(echo_buffered));
        let router = gate.ownership_guard(IdLocation::BodyField).apply(router);
        gate.login_guard().apply(router)
    }

    fn get_req(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, format!("{COOKIE}={c}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, cookie: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, format!("{COOKIE}={c}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(router: Router, req: Request) -> (StatusCode, String) {
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn assert_forbidden((status, body): (StatusCode, String)) {
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Forbidden");
    }

    // Scenario A
    #[tokio::test]
    async fn path_id_matching_session_is_forwarded() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        let (status, body) = send(path_router(&gate), get_req("/users/42", Some("s1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    // Scenario B
    #[tokio::test]
    async fn path_id_not_matching_session_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        assert_forbidden(send(path_router(&gate), get_req("/users/43", Some("s1"))).await);
    }

    // Scenario C
    #[tokio::test]
    async fn unauthenticated_session_is_forbidden_by_login_guard() {
        let sessions = [
            (
                "false",
                Session::new().with(AUTHENTICATED_KEY, SessionValue::Bool(false)),
            ),
            (
                "string",
                Session::new().with(AUTHENTICATED_KEY, SessionValue::Str("true".into())),
            ),
            ("empty", Session::new()),
        ];
        let gate = gate_with(&sessions).await;

        for (id, _) in &sessions {
            assert_forbidden(send(login_router(&gate), get_req("/users/1", Some(*id))).await);
        }
    }

    #[tokio::test]
    async fn authenticated_session_passes_login_guard() {
        let gate = gate_with(&[(
            "s1",
            Session::new().with(AUTHENTICATED_KEY, SessionValue::Bool(true)),
        )])
        .await;

        let (status, _) = send(login_router(&gate), get_req("/users/1", Some("s1"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Scenario D
    #[tokio::test]
    async fn body_id_matching_session_is_forwarded_with_body_intact() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(7)))]).await;

        let (status, body) = send(
            body_router(&gate),
            post_req("/projects", Some("s1"), r#"{"user_id": 7}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"user_id": 7}"#);
    }

    #[tokio::test]
    async fn buffered_body_is_visible_downstream() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(7)))]).await;

        let (status, body) = send(
            body_router(&gate),
            post_req("/projects/raw", Some("s1"), r#"{"user_id":7,"name":"x"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"user_id":7,"name":"x"}"#);
    }

    #[tokio::test]
    async fn login_guard_leaves_body_untouched() {
        let gate = gate_with(&[(
            "s1",
            Session::new().with(AUTHENTICATED_KEY, SessionValue::Bool(true)),
        )])
        .await;
        let router = gate
            .login_guard()
            .apply(Router::new().route("/notes", post(echo)));

        let (status, body) = send(
            router,
            post_req("/notes", Some("s1"), r#"{"text": "keep me", "user_id": 99}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"text": "keep me", "user_id": 99}"#);
    }

    #[tokio::test]
    async fn corrupt_record_is_forbidden_and_flagged_for_operators() {
        let cache = MemoryClient::new();
        cache.insert("session:s1", "not json").await;
        let store = CacheSessionStore::new_with_cache(Arc::new(cache), "session");
        let gate = AuthGate::new(Arc::new(store), COOKIE);

        let denial = gate
            .check_login(get_req("/users/1", Some("s1")).headers())
            .await
            .unwrap_err();
        assert!(matches!(denial, Denial::Lookup(SessionError::Decode(_))));
        assert!(denial.is_operator_fault());

        assert_forbidden(send(login_router(&gate), get_req("/users/1", Some("s1"))).await);
    }

    #[test]
    fn client_caused_denials_are_not_operator_faults() {
        assert!(Denial::Lookup(SessionError::Timeout).is_operator_fault());
        assert!(!Denial::Lookup(SessionError::MissingCookie).is_operator_fault());
        assert!(!Denial::Lookup(SessionError::NotFound).is_operator_fault());
        assert!(!Denial::NotAuthenticated.is_operator_fault());
        assert!(!Denial::OwnerMismatch { candidate: 1 }.is_operator_fault());
    }

    // Scenario E
    #[tokio::test]
    async fn body_without_user_id_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(7)))]).await;

        assert_forbidden(
            send(
                body_router(&gate),
                post_req("/projects", Some("s1"), r#"{"not_user_id": 7}"#),
            )
            .await,
        );
    }

    #[tokio::test]
    async fn malformed_body_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(7)))]).await;

        for body in ["", "{", "user_id=7", r#"{"user_id": "7"}"#] {
            assert_forbidden(
                send(body_router(&gate), post_req("/projects", Some("s1"), body)).await,
            );
        }
    }

    #[tokio::test]
    async fn body_id_not_matching_session_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(7)))]).await;

        assert_forbidden(
            send(
                body_router(&gate),
                post_req("/projects", Some("s1"), r#"{"user_id": 8}"#),
            )
            .await,
        );
    }

    // Scenario F
    #[tokio::test]
    async fn missing_cookie_is_forbidden_by_both_guards() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        assert_forbidden(send(login_router(&gate), get_req("/users/42", None)).await);

        let owner_only = gate
            .ownership_guard(IdLocation::PathParam)
            .apply(Router::new().route("/users/{id}", get(|| async { "ok" })));
        assert_forbidden(send(owner_only, get_req("/users/42", None)).await);

        assert_forbidden(
            send(
                body_router(&gate),
                post_req("/projects", None, r#"{"user_id": 42}"#),
            )
            .await,
        );
    }

    #[tokio::test]
    async fn unknown_session_id_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        assert_forbidden(send(path_router(&gate), get_req("/users/42", Some("s2"))).await);
    }

    #[tokio::test]
    async fn zero_id_is_compared_like_any_other() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(0)))]).await;

        let (status, _) = send(path_router(&gate), get_req("/users/0", Some("s1"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            body_router(&gate),
            post_req("/projects", Some("s1"), r#"{"user_id": 0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_forbidden(send(path_router(&gate), get_req("/users/1", Some("s1"))).await);
    }

    #[tokio::test]
    async fn prefixed_path_id_is_accepted() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        let (status, _) = send(path_router(&gate), get_req("/users/0x2a", Some("s1"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn non_numeric_or_overflowing_path_id_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Uint(42)))]).await;

        for uri in [
            "/users/abc",
            "/users/-42",
            "/users/18446744073709551616",
            "/users/18446744073709551658",
        ] {
            assert_forbidden(send(path_router(&gate), get_req(uri, Some("s1"))).await);
        }
    }

    // Deliberate quirk: a signed user_id in the session denies instead of erroring.
    #[tokio::test]
    async fn signed_session_user_id_is_forbidden() {
        let gate = gate_with(&[("s1", logged_in(SessionValue::Int(42)))]).await;

        assert_forbidden(send(path_router(&gate), get_req("/users/42", Some("s1"))).await);
    }

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn load<'a>(
            &'a self,
            _headers: &'a HeaderMap,
            _cookie_name: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Session, SessionError>> + Send + 'a>> {
            Box::pin(async {
                Err(SessionError::Cache(
                    crate::services::cache::CacheError::BackendCommand("down".into()),
                ))
            })
        }
    }

    struct SlowStore;

    impl SessionStore for SlowStore {
        fn load<'a>(
            &'a self,
            _headers: &'a HeaderMap,
            _cookie_name: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Session, SessionError>> + Send + 'a>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(logged_in(SessionValue::Uint(42)))
            })
        }
    }

    #[tokio::test]
    async fn store_failure_is_forbidden() {
        let gate = AuthGate::new(Arc::new(FailingStore), COOKIE);

        assert_forbidden(send(path_router(&gate), get_req("/users/42", Some("s1"))).await);
    }

    #[tokio::test]
    async fn slow_store_times_out_and_is_forbidden() {
        let gate = AuthGate::new(Arc::new(SlowStore), COOKIE)
            .with_lookup_timeout(Duration::from_millis(20));

        assert_forbidden(send(login_router(&gate), get_req("/users/42", Some("s1"))).await);
    }
}
