pub mod admin;
mod auth;
mod catalog;
pub mod error;
mod health;
mod polls;
pub mod team;

pub use auth::*;
pub use catalog::*;
pub use error::{ApiResult, ErrorResponse};
pub use health::*;
pub use polls::*;
