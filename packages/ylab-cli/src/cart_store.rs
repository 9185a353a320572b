use std::path::{Path, PathBuf};
use thiserror::Error;
use ylab_core::Cart;

const CART_DIR: &str = "carts";

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("Failed to access cart file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cart file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File name for a server's cart: `https://market.ylab.fr/api` becomes
/// `market.ylab.fr_api.json`
fn cart_file_name(api_url: &str) -> String {
    let trimmed = api_url
        .split_once("://")
        .map_or(api_url, |(_, rest)| rest)
        .trim_end_matches('/');

    let key: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();

    if key.is_empty() {
        "default.json".to_string()
    } else {
        format!("{}.json", key)
    }
}

/// Carts persisted as JSON next to the session, one file per API server
#[derive(Debug, Clone)]
pub struct CartStore {
    path: PathBuf,
}

impl CartStore {
    pub fn new(data_dir: &Path, api_url: &str) -> Self {
        Self {
            path: data_dir.join(CART_DIR).join(cart_file_name(api_url)),
        }
    }

    /// The saved cart, empty when no file exists yet
    pub fn load(&self) -> Result<Cart, CartStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Cart::new()),
            Err(source) => {
                return Err(CartStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| CartStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        let io = |source| CartStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(cart).map_err(|source| CartStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ylab_core::{Resource, ResourceKind};

    fn resource(id: i64) -> Resource {
        let now = Utc::now();
        Resource {
            id,
            name: format!("resource-{}", id),
            description: String::new(),
            cost: 25,
            quantity: 10,
            max_per_team: 3,
            kind: ResourceKind::Service,
            image_url: String::new(),
            is_active: true,
            is_non_returnable: false,
            created_at: now,
            updated_at: now,
        }
    }

    const API: &str = "http://localhost:8080/api";

    #[test]
    fn test_cart_file_name() {
        assert_eq!(cart_file_name("http://localhost:8080/api"), "localhost_8080_api.json");
        assert_eq!(cart_file_name("https://market.ylab.fr/api/"), "market.ylab.fr_api.json");
        assert_eq!(cart_file_name(""), "default.json");
        assert_ne!(cart_file_name("http://a/api"), cart_file_name("http://b/api"));
    }

    #[test]
    fn test_missing_file_is_empty_cart() {
        let dir = tempfile::tempdir().unwrap();
        let cart = CartStore::new(dir.path(), API).load().unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = CartStore::new(dir.path(), API);

        let mut cart = Cart::new();
        cart.add_item(resource(1), 2);
        cart.add_item(resource(4), 1);
        store.save(&cart).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.quantity_of(1), 2);
        assert_eq!(loaded.total_cost(), 75);
    }

    #[test]
    fn test_carts_are_kept_per_server() {
        let dir = tempfile::tempdir().unwrap();
        let staging = CartStore::new(dir.path(), "http://staging.ylab.fr/api");
        let prod = CartStore::new(dir.path(), "https://market.ylab.fr/api");

        let mut cart = Cart::new();
        cart.add_item(resource(1), 2);
        staging.save(&cart).unwrap();

        assert!(prod.load().unwrap().is_empty());
        assert_eq!(staging.load().unwrap().quantity_of(1), 2);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CartStore::new(dir.path(), API);
        std::fs::create_dir_all(dir.path().join(CART_DIR)).unwrap();
        std::fs::write(dir.path().join(CART_DIR).join(cart_file_name(API)), "[{").unwrap();
        assert!(matches!(
            store.load(),
            Err(CartStoreError::Corrupt { .. })
        ));
    }
}
