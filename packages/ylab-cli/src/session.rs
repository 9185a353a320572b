use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ylab_core::api::Role;

const SESSION_FILE: &str = "session.json";

/// Tokens are treated as expired this long before the server would reject them
const EXPIRY_MARGIN_SECONDS: i64 = 5 * 60;

/// Login persisted between invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    /// Team name or admin username
    pub name: String,
}

impl StoredSession {
    pub fn new(token: String, role: Role, expires_in: u64, name: String, now: DateTime<Utc>) -> Self {
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token,
            role,
            expires_at,
            name,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECONDS) >= self.expires_at
    }
}

/// JSON file holding the current session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    /// The stored session, or `None` when absent or unreadable
    pub fn load(&self) -> Option<StoredSession> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {:?}: {}", parent, e))?;
        }
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| format!("Failed to encode session: {}", e))?;
        std::fs::write(&self.path, json)
            .map_err(|e| format!("Failed to write session file {:?}: {}", self.path, e))
    }

    pub fn clear(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("Failed to remove session file {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_margin() {
        let session = StoredSession::new("t".into(), Role::Team, 3600, "Alpha".into(), now());
        assert!(!session.is_expired(now()));
        assert!(!session.is_expired(now() + Duration::minutes(54)));
        assert!(session.is_expired(now() + Duration::minutes(55)));
        assert!(session.is_expired(now() + Duration::hours(2)));
    }

    #[test]
    fn test_huge_expires_in_saturates() {
        let session = StoredSession::new("t".into(), Role::Team, u64::MAX, "Alpha".into(), now());
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired(now()));
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(&dir.path().join("nested"));
        assert!(store.load().is_none());

        let session = StoredSession::new("abc".into(), Role::Admin, 86400, "root".into(), now());
        store.save(&session).unwrap();
        assert_eq!(store.load(), Some(session));

        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        assert!(SessionStore::new(dir.path()).load().is_none());
    }
}
