mod middleware;
mod password;
mod session;

pub use middleware::{bearer_token, require_admin, require_session, require_team, AuthState, BearerError};
pub use password::{generate_password, hash_password, verify_password, PasswordError};
pub use session::{generate_session_token, ActiveSession, AuthRateLimiter, Principal, SessionManager};
