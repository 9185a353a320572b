use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use ylab_core::api::{
    AdminLoginRequest, AdminLoginResponse, BatchActionRequest, BatchActionResponse,
    BatchPurchaseRequest, DecisionAction, MessageResponse, PollResults, PurchaseActionRequest,
    PurchaseRequest, TeamLoginRequest, TeamLoginResponse, ToggleSlotRequest, UpdateProfileRequest,
    VerifyResponse, VoteRequest,
};
use ylab_core::{
    CompositionId, Poll, PollId, Purchase, PurchaseId, Resource, ResourceId, TeamComposition,
    TeamId, TeamProfile, Vote,
};

use crate::session::{SessionStore, StoredSession};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Not logged in, run `ylab login` first")]
    NotLoggedIn,

    #[error("This command requires the {0} role, log in with `ylab login {0}`")]
    WrongRole(&'static str),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether logging in (again) would resolve the error
    pub fn needs_login(&self) -> bool {
        match self {
            Self::SessionExpired | Self::NotLoggedIn | Self::WrongRole(_) => true,
            Self::Status { status, .. } => *status == StatusCode::UNAUTHORIZED.as_u16(),
            Self::Http(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Admin purchase listing filters
#[derive(Debug, Default, Serialize)]
pub struct PurchaseQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub needs_return: bool,
}

/// HTTP client for the marketplace API. Sends the stored bearer token when
/// one is present and still fresh.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<StoredSession>,
    store: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &str, store: SessionStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        let session = match store.load() {
            Some(session) if session.is_expired(Utc::now()) => {
                log::info!("Stored session for {} has expired", session.name);
                store.clear();
                None
            }
            other => other,
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            store,
        })
    }

    pub fn session(&self) -> Option<&StoredSession> {
        self.session.as_ref()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<&str, ApiError> {
        self.session
            .as_ref()
            .map(|s| s.token.as_str())
            .ok_or(ApiError::NotLoggedIn)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, authed: bool) -> Result<T, ApiError> {
        let request = if authed {
            request.bearer_auth(self.token()?)
        } else {
            request
        };

        let response = request.send().await?;
        let status = response.status();
        log::debug!("{} {}", status, response.url());

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::UNAUTHORIZED && authed {
            self.store.clear();
            return Err(ApiError::SessionExpired);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, authed: bool) -> Result<T, ApiError> {
        self.send(self.client.get(self.url(path)), authed).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(self.client.post(self.url(path)).json(body), true).await
    }

    // Auth

    pub async fn team_login(&self, name: &str, password: &str) -> Result<TeamLoginResponse, ApiError> {
        let body = TeamLoginRequest {
            name: name.to_string(),
            password: password.to_string(),
        };
        self.send(self.client.post(self.url("/auth/team/login")).json(&body), false)
            .await
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Result<AdminLoginResponse, ApiError> {
        let body = AdminLoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send(self.client.post(self.url("/auth/admin/login")).json(&body), false)
            .await
    }

    pub async fn verify(&self) -> Result<VerifyResponse, ApiError> {
        self.get("/auth/verify", true).await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ApiError> {
        self.post("/auth/logout", &serde_json::json!({})).await
    }

    // Catalog and polls

    pub async fn resources(&self, kind: Option<&str>) -> Result<Vec<Resource>, ApiError> {
        let mut request = self.client.get(self.url("/resources"));
        if let Some(kind) = kind {
            request = request.query(&[("type", kind)]);
        }
        self.send(request, false).await
    }

    pub async fn resource(&self, id: ResourceId) -> Result<Resource, ApiError> {
        self.get(&format!("/resources/{}", id), false).await
    }

    pub async fn polls(&self, status: Option<&str>) -> Result<Vec<Poll>, ApiError> {
        let mut request = self.client.get(self.url("/polls"));
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        self.send(request, false).await
    }

    pub async fn poll(&self, id: PollId) -> Result<Poll, ApiError> {
        self.get(&format!("/polls/{}", id), false).await
    }

    pub async fn poll_results(&self, id: PollId) -> Result<PollResults, ApiError> {
        self.get(&format!("/polls/{}/results", id), false).await
    }

    // Team

    pub async fn profile(&self) -> Result<TeamProfile, ApiError> {
        self.get("/team/profile", true).await
    }

    pub async fn update_email(&self, email: &str) -> Result<TeamProfile, ApiError> {
        let body = UpdateProfileRequest {
            email: email.to_string(),
        };
        self.send(self.client.put(self.url("/team/profile")).json(&body), true)
            .await
    }

    pub async fn team_purchases(&self, needs_return: bool) -> Result<Vec<Purchase>, ApiError> {
        let mut request = self.client.get(self.url("/team/purchases"));
        if needs_return {
            request = request.query(&[("needs_return", "true")]);
        }
        self.send(request, true).await
    }

    pub async fn purchase(&self, resource_id: ResourceId, quantity: i64) -> Result<Purchase, ApiError> {
        self.post("/team/purchases", &PurchaseRequest { resource_id, quantity })
            .await
    }

    pub async fn batch_purchase(&self, request: &BatchPurchaseRequest) -> Result<Vec<Purchase>, ApiError> {
        self.post("/team/purchases/batch", request).await
    }

    pub async fn return_purchase(&self, id: PurchaseId) -> Result<Purchase, ApiError> {
        self.post(&format!("/team/purchases/{}/return", id), &serde_json::json!({}))
            .await
    }

    pub async fn votes(&self) -> Result<Vec<Vote>, ApiError> {
        self.get("/team/votes", true).await
    }

    pub async fn vote(&self, request: &VoteRequest) -> Result<Vote, ApiError> {
        self.post("/team/votes", request).await
    }

    pub async fn vote_for_poll(&self, poll_id: PollId) -> Result<Vote, ApiError> {
        self.get(&format!("/team/votes/poll/{}", poll_id), true).await
    }

    // Admin

    pub async fn admin_purchases(&self, query: &PurchaseQuery) -> Result<Vec<Purchase>, ApiError> {
        let request = self.client.get(self.url("/admin/purchases")).query(query);
        self.send(request, true).await
    }

    pub async fn admin_purchase(&self, id: PurchaseId) -> Result<Purchase, ApiError> {
        self.get(&format!("/admin/purchases/{}", id), true).await
    }

    pub async fn decide(&self, id: PurchaseId, action: DecisionAction) -> Result<Purchase, ApiError> {
        self.post(
            &format!("/admin/purchases/{}/action", id),
            &PurchaseActionRequest { action },
        )
        .await
    }

    pub async fn decide_batch(&self, request: &BatchActionRequest) -> Result<BatchActionResponse, ApiError> {
        self.post("/admin/purchases/batch/action", request).await
    }

    pub async fn mark_returned(&self, id: PurchaseId) -> Result<Purchase, ApiError> {
        self.post(&format!("/admin/purchases/{}/mark-returned", id), &serde_json::json!({}))
            .await
    }

    pub async fn unmark_returned(&self, id: PurchaseId) -> Result<Purchase, ApiError> {
        self.post(&format!("/admin/purchases/{}/unmark-returned", id), &serde_json::json!({}))
            .await
    }

    pub async fn teams(&self) -> Result<Vec<TeamProfile>, ApiError> {
        self.get("/admin/teams", true).await
    }

    pub async fn compositions(&self) -> Result<Vec<TeamComposition>, ApiError> {
        self.get("/admin/team-compositions", true).await
    }

    pub async fn toggle_slot(
        &self,
        id: CompositionId,
        request: &ToggleSlotRequest,
    ) -> Result<TeamComposition, ApiError> {
        self.post(&format!("/admin/team-compositions/{}/toggle", id), request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_login() {
        assert!(ApiError::SessionExpired.needs_login());
        assert!(ApiError::NotLoggedIn.needs_login());
        assert!(ApiError::Status { status: 401, message: "Invalid credentials".into() }.needs_login());
        assert!(!ApiError::Status { status: 400, message: "Insufficient credit".into() }.needs_login());
    }

    #[test]
    fn test_status_error_shows_server_message() {
        let err = ApiError::Status {
            status: 400,
            message: "Insufficient credit".into(),
        };
        assert_eq!(err.to_string(), "Insufficient credit (HTTP 400)");
    }

    #[test]
    fn test_purchase_query_skips_empty_filters() {
        let query = PurchaseQuery {
            status: Some("en attente".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, serde_json::json!({"status": "en attente"}));
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let stale = StoredSession::new(
            "old".into(),
            ylab_core::api::Role::Team,
            60,
            "Alpha".into(),
            Utc::now(),
        );
        store.save(&stale).unwrap();

        let client = ApiClient::new("http://localhost:8080/api/", store).unwrap();
        assert!(client.session().is_none());
        assert!(client.store().load().is_none());
        assert_eq!(client.url("/health"), "http://localhost:8080/api/health");
    }
}
