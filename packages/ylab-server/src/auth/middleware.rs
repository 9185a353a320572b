use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;
use ylab_core::api::Role;

use crate::auth::session::{AuthRateLimiter, SessionManager};

/// Authentication state shared with middleware
#[derive(Clone)]
pub struct AuthState {
    pub session_manager: SessionManager,
    pub rate_limiter: AuthRateLimiter,
}

impl AuthState {
    pub fn new(session_manager: SessionManager) -> Self {
        Self {
            session_manager,
            rate_limiter: AuthRateLimiter::default(),
        }
    }
}

/// Why a request carried no usable bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    Missing,
    Malformed,
}

impl BearerError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Missing => "Authorization header required",
            Self::Malformed => "Invalid authorization format",
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::Malformed)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(BearerError::Malformed),
    }
}

/// Require a valid team session
pub async fn require_team(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&state, addr, Some(Role::Team), request, next).await
}

/// Require a valid admin session
pub async fn require_admin(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&state, addr, Some(Role::Admin), request, next).await
}

/// Require any valid session
pub async fn require_session(
    State(state): State<Arc<AuthState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&state, addr, None, request, next).await
}

async fn authorize(
    state: &AuthState,
    addr: SocketAddr,
    required: Option<Role>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_ip = addr.ip();

    // Check if rate limited BEFORE any auth attempt
    if state.rate_limiter.is_rate_limited(client_ip) {
        warn!("Rate limited request from {}", client_ip);
        return rate_limited_response();
    }

    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => {
            state.rate_limiter.record_failure(client_ip);
            return error_response(StatusCode::UNAUTHORIZED, e.message(), "UNAUTHORIZED");
        }
    };

    let Some(principal) = state.session_manager.validate_token(token) else {
        if state.rate_limiter.record_failure(client_ip) {
            warn!("IP {} is now rate limited after failed auth", client_ip);
        }
        return error_response(StatusCode::UNAUTHORIZED, "Invalid or expired token", "UNAUTHORIZED");
    };

    state.rate_limiter.clear(client_ip);

    if let Some(role) = required {
        if principal.role != role {
            warn!(
                "{} denied access to {} (requires {})",
                principal.label(),
                request.uri().path(),
                role.as_str()
            );
            return error_response(StatusCode::FORBIDDEN, "Insufficient permissions", "FORBIDDEN");
        }
    }

    request.extensions_mut().insert(principal);
    next.run(request).await
}

fn rate_limited_response() -> Response {
    error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "Too many failed authentication attempts. Please try again later.",
        "RATE_LIMITED",
    )
}

fn error_response(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{HeaderValue, Request as HttpRequest},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn whoami(Extension(principal): Extension<Principal>) -> String {
        principal.label()
    }

    fn app(state: Arc<AuthState>) -> Router {
        let team = Router::new()
            .route("/team", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_team));
        let admin = Router::new()
            .route("/admin", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_admin));
        let any = Router::new()
            .route("/any", get(whoami))
            .layer(middleware::from_fn_with_state(state, require_session));

        team.merge(admin)
            .merge(any)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    fn request(path: &str, auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state() -> Arc<AuthState> {
        Arc::new(AuthState::new(SessionManager::new(3600)))
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(BearerError::Missing));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), Err(BearerError::Malformed));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let response = app(state()).oneshot(request("/team", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Authorization header required");
    }

    #[tokio::test]
    async fn test_bad_format_and_unknown_token() {
        let response = app(state())
            .oneshot(request("/team", Some("Basic abc")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid authorization format");

        let response = app(state())
            .oneshot(request("/team", Some("Bearer nope")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_role_enforcement() {
        let state = state();
        let (team_token, _) = state.session_manager.create_session(Principal::team(3));
        let (admin_token, _) = state.session_manager.create_session(Principal::admin(1));
        let team_auth = format!("Bearer {}", team_token);
        let admin_auth = format!("Bearer {}", admin_token);

        let response = app(state.clone())
            .oneshot(request("/team", Some(&team_auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"team:3");

        let response = app(state.clone())
            .oneshot(request("/admin", Some(&team_auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "Insufficient permissions");

        let response = app(state.clone())
            .oneshot(request("/any", Some(&admin_auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_repeated_failures_are_rate_limited() {
        let state = state();
        for _ in 0..10 {
            app(state.clone())
                .oneshot(request("/team", Some("Bearer wrong")))
                .await
                .unwrap();
        }

        let (token, _) = state.session_manager.create_session(Principal::team(1));
        let response = app(state)
            .oneshot(request("/team", Some(&format!("Bearer {}", token))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
