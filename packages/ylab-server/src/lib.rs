pub mod auth;
pub mod cli;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod state;
pub mod storage;

pub use config::ServerConfig;
pub use middleware::{audit_middleware, AuditMiddlewareState};
pub use state::ServerState;
