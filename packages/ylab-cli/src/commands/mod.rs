pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod polls;
pub mod profile;

use serde::Serialize;
use ylab_core::api::Role;

use crate::cart_store::CartStore;
use crate::client::{ApiClient, ApiError};
use crate::exit_codes;
use crate::output;

/// Everything a command needs
pub struct Context {
    pub client: ApiClient,
    pub carts: CartStore,
    pub json: bool,
}

impl Context {
    /// Fail early, without a request, when the session does not have `role`
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        match self.client.session() {
            None => Err(ApiError::NotLoggedIn),
            Some(session) if session.role != role => Err(ApiError::WrongRole(role.as_str())),
            Some(_) => Ok(()),
        }
    }

    /// JSON when asked for, the human rendering otherwise
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> i32 {
        if self.json {
            if !output::print_json(value) {
                return exit_codes::INPUT_ERROR;
            }
        } else {
            human(value);
        }
        exit_codes::SUCCESS
    }
}

/// Print the error and pick the exit code
pub fn report(err: ApiError) -> i32 {
    eprintln!("Error: {}", err);
    if err.needs_login() {
        exit_codes::AUTH_REQUIRED
    } else {
        exit_codes::API_ERROR
    }
}
