pub mod api;
pub mod cart;
pub mod error;
pub mod orders;
pub mod quota;
pub mod rules;
pub mod types;

pub use cart::{Cart, CartItem};
pub use error::{MarketError, Result};
pub use types::*;
