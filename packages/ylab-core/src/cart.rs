use serde::{Deserialize, Serialize};

use crate::api::PurchaseItem;
use crate::types::{Resource, ResourceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub resource: Resource,
    pub quantity: i64,
}

/// Local staging area for a batch purchase, keyed by resource id.
///
/// Serializes as a plain array of items in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, resource_id: ResourceId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.resource.id == resource_id)
    }

    pub fn quantity_of(&self, resource_id: ResourceId) -> i64 {
        self.get(resource_id).map(|i| i.quantity).unwrap_or(0)
    }

    /// Add to the cart, accumulating onto an existing line. The resource
    /// snapshot is refreshed so totals use the latest known cost.
    pub fn add_item(&mut self, resource: Resource, quantity: i64) {
        match self.items.iter_mut().find(|i| i.resource.id == resource.id) {
            Some(existing) => {
                existing.quantity += quantity;
                existing.resource = resource;
            }
            None => self.items.push(CartItem { resource, quantity }),
        }
    }

    /// Set a line's quantity; zero or less removes it. Unknown ids are ignored.
    /// Returns whether a line was touched.
    pub fn update_quantity(&mut self, resource_id: ResourceId, quantity: i64) -> bool {
        let Some(index) = self.items.iter().position(|i| i.resource.id == resource_id) else {
            return false;
        };
        if quantity <= 0 {
            self.items.remove(index);
        } else {
            self.items[index].quantity = quantity;
        }
        true
    }

    pub fn remove_item(&mut self, resource_id: ResourceId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.resource.id != resource_id);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_cost(&self) -> i64 {
        self.items.iter().map(|i| i.resource.cost * i.quantity).sum()
    }

    pub fn items_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn to_batch_items(&self) -> Vec<PurchaseItem> {
        self.items
            .iter()
            .map(|i| PurchaseItem {
                resource_id: i.resource.id,
                quantity: i.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use chrono::Utc;

    fn resource(id: ResourceId, cost: i64) -> Resource {
        let now = Utc::now();
        Resource {
            id,
            name: format!("Resource {}", id),
            description: String::new(),
            cost,
            quantity: 10,
            max_per_team: 5,
            kind: ResourceKind::Service,
            image_url: String::new(),
            is_active: true,
            is_non_returnable: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_add_accumulates() {
        let mut cart = Cart::new();
        cart.add_item(resource(1, 10), 2);
        cart.add_item(resource(2, 5), 1);
        cart.add_item(resource(1, 10), 3);

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.quantity_of(1), 5);
        assert_eq!(cart.items_count(), 6);
        assert_eq!(cart.total_cost(), 55);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(resource(1, 10), 2);

        assert!(cart.update_quantity(1, 4));
        assert_eq!(cart.quantity_of(1), 4);

        assert!(cart.update_quantity(1, 0));
        assert!(cart.is_empty());

        assert!(!cart.update_quantity(99, 3));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add_item(resource(1, 10), 1);
        cart.add_item(resource(2, 10), 1);

        assert!(cart.remove_item(1));
        assert!(!cart.remove_item(1));
        assert_eq!(cart.items().len(), 1);

        cart.clear();
        assert_eq!(cart.total_cost(), 0);
    }

    #[test]
    fn test_batch_items_keep_order() {
        let mut cart = Cart::new();
        cart.add_item(resource(3, 1), 1);
        cart.add_item(resource(1, 1), 2);

        let items = cart.to_batch_items();
        assert_eq!(items[0], PurchaseItem { resource_id: 3, quantity: 1 });
        assert_eq!(items[1], PurchaseItem { resource_id: 1, quantity: 2 });
    }

    #[test]
    fn test_serializes_as_array() {
        let mut cart = Cart::new();
        cart.add_item(resource(1, 10), 2);

        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["quantity"], 2);

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
