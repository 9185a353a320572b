use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use crate::auth::{bearer_token, SessionManager};
use crate::storage::{AuditAction, AuditEntryBuilder, AuditStore};

/// State for the audit middleware
#[derive(Clone)]
pub struct AuditMiddlewareState {
    pub audit_store: Arc<dyn AuditStore>,
    pub session_manager: SessionManager,
}

/// Mapping of HTTP routes to audit actions. Reads are never audited.
fn route_to_action(method: &Method, path: &str) -> Option<AuditAction> {
    if *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS {
        return None;
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let action = match parts.as_slice() {
        ["api", "auth", "team" | "admin", "login"] => AuditAction::LoginSuccess,
        ["api", "auth", "logout"] => AuditAction::Logout,

        ["api", "team", "profile"] => AuditAction::ProfileUpdated,
        ["api", "team", "purchases"] => AuditAction::PurchaseCreated,
        ["api", "team", "purchases", "batch"] => AuditAction::BatchPurchaseCreated,
        ["api", "team", "purchases", _, "return"] => AuditAction::PurchaseReturned,
        ["api", "team", "votes"] => AuditAction::VoteCast,

        ["api", "admin", "purchases", "batch", "action"] => AuditAction::BatchDecided,
        ["api", "admin", "purchases", _, "action"] => AuditAction::PurchaseDecided,
        ["api", "admin", "purchases", _, "mark-returned"] => AuditAction::ReturnMarked,
        ["api", "admin", "purchases", _, "unmark-returned"] => AuditAction::ReturnUnmarked,
        ["api", "admin", "team-compositions", _, "toggle"] => AuditAction::SlotToggled,

        ["api", ..] => AuditAction::ApiRequest,
        _ => return None,
    };

    Some(action)
}

/// Extract resource info from path
fn extract_resource(path: &str) -> Option<(&'static str, String)> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match parts.as_slice() {
        ["api", "team" | "admin", "purchases", id, _] if *id != "batch" => {
            Some(("purchase", id.to_string()))
        }
        ["api", "admin", "team-compositions", id, _] => Some(("composition", id.to_string())),
        _ => None,
    }
}

/// Audit middleware that records marketplace mutations
pub async fn audit_middleware(
    State(state): State<AuditMiddlewareState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    // Check if this route should be audited
    let action = match route_to_action(&method, &path) {
        Some(a) => a,
        None => return next.run(request).await,
    };

    // Resolved before the handler runs so logout still knows who left
    let principal = bearer_token(request.headers())
        .ok()
        .and_then(|token| state.session_manager.validate_token(token))
        .map(|p| p.label());

    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    // Run the actual request
    let response = next.run(request).await;

    let status = response.status().as_u16() as i32;
    let success = response.status().is_success();

    let final_action = if action == AuditAction::LoginSuccess && !success {
        AuditAction::LoginFailed
    } else {
        action
    };

    let mut builder = AuditEntryBuilder::new(final_action)
        .ip_address(&addr.ip().to_string())
        .http_request(method.as_str(), &path)
        .http_status(status)
        .success(success);

    if let Some(principal) = principal {
        builder = builder.principal(principal);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(&ua);
    }
    if let Some((resource_type, resource_id)) = extract_resource(&path) {
        builder = builder.resource(resource_type, &resource_id);
    }
    if let Some(query) = query {
        builder = builder.details(serde_json::json!({ "query": query }));
    }

    let entry = builder.build();

    // Log asynchronously (don't block the response)
    let audit_store = state.audit_store.clone();
    tokio::spawn(async move {
        if let Err(e) = audit_store.log(entry).await {
            error!("Failed to log audit entry: {}", e);
        }
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_not_audited() {
        assert_eq!(route_to_action(&Method::GET, "/api/resources"), None);
        assert_eq!(route_to_action(&Method::GET, "/api/team/purchases"), None);
        assert_eq!(route_to_action(&Method::POST, "/health"), None);
    }

    #[test]
    fn test_route_mapping() {
        let cases = [
            ("/api/auth/team/login", AuditAction::LoginSuccess),
            ("/api/auth/admin/login", AuditAction::LoginSuccess),
            ("/api/auth/logout", AuditAction::Logout),
            ("/api/team/purchases", AuditAction::PurchaseCreated),
            ("/api/team/purchases/batch", AuditAction::BatchPurchaseCreated),
            ("/api/team/purchases/12/return", AuditAction::PurchaseReturned),
            ("/api/team/votes", AuditAction::VoteCast),
            ("/api/admin/purchases/batch/action", AuditAction::BatchDecided),
            ("/api/admin/purchases/4/action", AuditAction::PurchaseDecided),
            ("/api/admin/purchases/4/mark-returned", AuditAction::ReturnMarked),
            ("/api/admin/purchases/4/unmark-returned", AuditAction::ReturnUnmarked),
            ("/api/admin/team-compositions/2/toggle", AuditAction::SlotToggled),
        ];

        for (path, expected) in cases {
            assert_eq!(route_to_action(&Method::POST, path), Some(expected), "{}", path);
        }
        assert_eq!(
            route_to_action(&Method::PUT, "/api/team/profile"),
            Some(AuditAction::ProfileUpdated)
        );
        assert_eq!(
            route_to_action(&Method::DELETE, "/api/unknown"),
            Some(AuditAction::ApiRequest)
        );
    }

    #[test]
    fn test_extract_resource() {
        assert_eq!(
            extract_resource("/api/team/purchases/12/return"),
            Some(("purchase", "12".to_string()))
        );
        assert_eq!(
            extract_resource("/api/admin/team-compositions/3/toggle"),
            Some(("composition", "3".to_string()))
        );
        assert_eq!(extract_resource("/api/admin/purchases/batch/action"), None);
        assert_eq!(extract_resource("/api/team/purchases"), None);
    }
}
