use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use ylab_core::api::Role;

/// Generate a secure random session token (64 hex characters)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Authenticated account behind a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Team id or admin id, depending on `role`
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn team(id: i64) -> Self {
        Self { id, role: Role::Team }
    }

    pub fn admin(id: i64) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.role.as_str(), self.id)
    }
}

/// In-memory session manager for active sessions
pub struct SessionManager {
    /// Active sessions indexed by session token
    sessions: Arc<RwLock<HashMap<String, ActiveSession>>>,
    /// Session timeout in seconds
    timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionManager {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout_seconds,
        }
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Create a new session and return its token
    pub fn create_session(&self, principal: Principal) -> (String, ActiveSession) {
        let token = generate_session_token();
        let now = Utc::now();

        let session = ActiveSession {
            principal,
            created_at: now,
            expires_at: i64::try_from(self.timeout_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.sessions.write().insert(token.clone(), session.clone());

        (token, session)
    }

    /// Validate a session token and return its principal if still valid
    pub fn validate_token(&self, token: &str) -> Option<Principal> {
        let sessions = self.sessions.read();
        sessions.get(token).and_then(|session| {
            if Utc::now() < session.expires_at {
                Some(session.principal)
            } else {
                None
            }
        })
    }

    /// Revoke a session. Returns whether it existed.
    pub fn revoke_session(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

/// Rate limiter for authentication attempts
/// Uses a sliding window algorithm to track failed attempts per IP
pub struct AuthRateLimiter {
    /// Failed attempts: IP -> list of attempt timestamps
    attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
    /// Maximum failed attempts in the window
    max_attempts: u32,
    /// Window duration in seconds
    window_seconds: i64,
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window_seconds,
        }
    }

    /// Record a failed authentication attempt
    /// Returns true if the IP is now rate limited
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let ip_attempts = attempts.entry(ip).or_default();

        ip_attempts.retain(|ts| *ts > window_start);
        ip_attempts.push(now);

        ip_attempts.len() as u32 >= self.max_attempts
    }

    /// Check if an IP is currently rate limited
    pub fn is_rate_limited(&self, ip: IpAddr) -> bool {
        let window_start = Utc::now() - Duration::seconds(self.window_seconds);

        let attempts = self.attempts.read();
        attempts
            .get(&ip)
            .map(|ts| ts.iter().filter(|t| **t > window_start).count() as u32 >= self.max_attempts)
            .unwrap_or(false)
    }

    /// Clear rate limit for an IP (call on successful auth)
    pub fn clear(&self, ip: IpAddr) {
        self.attempts.write().remove(&ip);
    }

    /// Drop IPs with no attempts left in the window
    pub fn cleanup(&self) -> usize {
        let window_start = Utc::now() - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let before = attempts.len();
        attempts.retain(|_, ip_attempts| {
            ip_attempts.retain(|ts| *ts > window_start);
            !ip_attempts.is_empty()
        });

        before - attempts.len()
    }
}

impl Clone for AuthRateLimiter {
    fn clone(&self) -> Self {
        Self {
            attempts: Arc::clone(&self.attempts),
            max_attempts: self.max_attempts,
            window_seconds: self.window_seconds,
        }
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        // 10 failed attempts per minute
        Self::new(10, 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_token_format() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn test_create_and_validate_session() {
        let manager = SessionManager::new(3600);
        let (token, session) = manager.create_session(Principal::team(4));

        assert_eq!(session.principal, Principal::team(4));
        assert!(session.expires_at > session.created_at);
        assert_eq!(manager.validate_token(&token), Some(Principal::team(4)));
        assert!(manager.validate_token("invalid_token").is_none());
    }

    #[test]
    fn test_roles_are_distinct() {
        let manager = SessionManager::new(3600);
        let (team_token, _) = manager.create_session(Principal::team(1));
        let (admin_token, _) = manager.create_session(Principal::admin(1));

        assert_eq!(manager.validate_token(&team_token).map(|p| p.role), Some(Role::Team));
        assert_eq!(manager.validate_token(&admin_token).map(|p| p.role), Some(Role::Admin));
    }

    #[test]
    fn test_revoke_session() {
        let manager = SessionManager::new(3600);
        let (token, _) = manager.create_session(Principal::admin(2));

        assert!(manager.revoke_session(&token));
        assert!(manager.validate_token(&token).is_none());
        assert!(!manager.revoke_session(&token));
    }

    #[test]
    fn test_expired_sessions_are_rejected_and_cleaned() {
        let manager = SessionManager::new(0);
        let (token, _) = manager.create_session(Principal::team(1));

        assert!(manager.validate_token(&token).is_none());
        assert_eq!(manager.cleanup_expired(), 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let manager = SessionManager::new(u64::MAX);
        let (token, session) = manager.create_session(Principal::admin(1));

        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(manager.validate_token(&token).is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let manager = SessionManager::new(3600);
        let clone = manager.clone();
        let (token, _) = manager.create_session(Principal::team(9));
        assert!(clone.validate_token(&token).is_some());
    }

    #[test]
    fn test_rate_limiter() {
        let limiter = AuthRateLimiter::new(3, 60);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(!limiter.record_failure(ip));
        assert!(!limiter.record_failure(ip));
        assert!(limiter.record_failure(ip));
        assert!(limiter.is_rate_limited(ip));
        assert!(!limiter.is_rate_limited(other));

        limiter.clear(ip);
        assert!(!limiter.is_rate_limited(ip));
    }

    #[test]
    fn test_rate_limiter_cleanup() {
        let limiter = AuthRateLimiter::new(3, 0);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        limiter.record_failure(ip);

        assert!(!limiter.is_rate_limited(ip));
        assert_eq!(limiter.cleanup(), 1);
    }
}
