use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use ylab_core::api::{
    AdminLoginRequest, AdminLoginResponse, MessageResponse, Role, TeamLoginRequest,
    TeamLoginResponse, VerifiedUser, VerifyResponse,
};

use super::error::{api_error, internal_error, storage_error, ApiError, ApiResult};
use crate::auth::{verify_password, Principal};
use crate::state::ServerState;

fn invalid_credentials(state: &ServerState, addr: SocketAddr) -> ApiError {
    state.auth_state.rate_limiter.record_failure(addr.ip());
    api_error(StatusCode::UNAUTHORIZED, "Invalid credentials", "INVALID_CREDENTIALS")
}

fn check_rate_limit(state: &ServerState, addr: SocketAddr) -> ApiResult<()> {
    if state.auth_state.rate_limiter.is_rate_limited(addr.ip()) {
        warn!("Login rate limit hit for {}", addr.ip());
        return Err(api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many failed attempts, try again later",
            "RATE_LIMITED",
        ));
    }
    Ok(())
}

fn password_matches(password: &str, hash: &str) -> ApiResult<bool> {
    verify_password(password, hash).map_err(|e| {
        warn!("Stored password hash could not be checked: {}", e);
        internal_error()
    })
}

/// Team login by name or email
pub async fn team_login(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<TeamLoginRequest>,
) -> ApiResult<Json<TeamLoginResponse>> {
    check_rate_limit(&state, addr)?;

    let (team, hash) = match state
        .accounts
        .find_team_credentials(request.name.trim())
        .await
        .map_err(storage_error)?
    {
        Some(found) => found,
        None => {
            warn!("Login attempt for unknown team: {}", request.name);
            return Err(invalid_credentials(&state, addr));
        }
    };

    if !password_matches(&request.password, &hash)? {
        warn!("Invalid password for team: {}", team.name);
        return Err(invalid_credentials(&state, addr));
    }

    state.accounts.touch_team(team.id).await.map_err(storage_error)?;
    state.auth_state.rate_limiter.clear(addr.ip());

    let (token, _) = state
        .auth_state
        .session_manager
        .create_session(Principal::team(team.id));

    info!("Team '{}' logged in", team.name);

    Ok(Json(TeamLoginResponse {
        token,
        expires_in: state.auth_state.session_manager.timeout_seconds(),
        team,
    }))
}

/// Admin login by username
pub async fn admin_login(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<AdminLoginRequest>,
) -> ApiResult<Json<AdminLoginResponse>> {
    check_rate_limit(&state, addr)?;

    let (admin, hash) = match state
        .accounts
        .find_admin_credentials(request.username.trim())
        .await
        .map_err(storage_error)?
    {
        Some(found) => found,
        None => {
            warn!("Login attempt for unknown admin: {}", request.username);
            return Err(invalid_credentials(&state, addr));
        }
    };

    if !password_matches(&request.password, &hash)? {
        warn!("Invalid password for admin: {}", admin.username);
        return Err(invalid_credentials(&state, addr));
    }

    state.auth_state.rate_limiter.clear(addr.ip());

    let (token, _) = state
        .auth_state
        .session_manager
        .create_session(Principal::admin(admin.id));

    info!("Admin '{}' logged in", admin.username);

    Ok(Json(AdminLoginResponse {
        token,
        expires_in: state.auth_state.session_manager.timeout_seconds(),
        admin,
    }))
}

/// Resolve the session's owner
pub async fn verify(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<VerifyResponse>> {
    let user = match principal.role {
        Role::Team => VerifiedUser::Team(
            state.accounts.get_team(principal.id).await.map_err(storage_error)?,
        ),
        Role::Admin => VerifiedUser::Admin(
            state.accounts.get_admin(principal.id).await.map_err(storage_error)?,
        ),
    };

    Ok(Json(VerifyResponse {
        valid: true,
        role: principal.role,
        user,
    }))
}

/// Revoke the presented token
pub async fn logout(
    State(state): State<Arc<ServerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> ApiResult<Json<MessageResponse>> {
    if state.auth_state.session_manager.revoke_session(auth.token()) {
        info!("Session revoked");
    }

    Ok(Json(MessageResponse::new("Logged out successfully")))
}
