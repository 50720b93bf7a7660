//! Cart Store
//!
//! The authoritative cart for one storefront session. All mutations go through
//! [`CartStore::apply`], which persists exactly once after the command runs.

use super::{
    helpers::{find_line_item_mut, merge_line_item},
    models::{saturating_sum, CartLineItem, CartView, LineItemKey},
    storage::CartPersistence,
};
use rust_decimal::Decimal;

/// A cart mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CartCommand {
    Add(CartLineItem),
    Remove(LineItemKey),
    UpdateQuantity { key: LineItemKey, quantity: i64 },
    Clear,
}

#[derive(Debug)]
pub struct CartStore {
    items: Vec<CartLineItem>,
    is_open: bool,
    persistence: CartPersistence,
}

impl CartStore {
    /// Hydrates the cart from storage. The cart starts closed.
    pub fn open(persistence: CartPersistence) -> Self {
        let items = persistence.load();
        tracing::debug!(key = persistence.key(), items = items.len(), "cart hydrated");
        Self {
            items,
            is_open: false,
            persistence,
        }
    }

    /// Runs `command` against the items, then persists.
    pub fn apply(&mut self, command: CartCommand) {
        match command {
            CartCommand::Add(item) => {
                if item.quantity == 0 {
                    tracing::debug!(product_id = item.product_id, "ignoring add with zero quantity");
                } else {
                    merge_line_item(&mut self.items, item);
                    self.is_open = true;
                }
            }
            CartCommand::Remove(key) => {
                self.items.retain(|i| i.key() != key);
            }
            CartCommand::UpdateQuantity { key, quantity } => {
                match u32::try_from(quantity) {
                    Ok(quantity) if quantity >= 1 => {
                        if let Some(item) = find_line_item_mut(&mut self.items, &key) {
                            item.quantity = quantity;
                        }
                    }
                    _ => tracing::debug!(quantity, "ignoring quantity update below one"),
                }
            }
            CartCommand::Clear => self.items.clear(),
        }

        self.persistence.save(&self.items);
    }

    pub fn add_item(&mut self, item: CartLineItem) {
        self.apply(CartCommand::Add(item));
    }

    pub fn remove_item(&mut self, key: LineItemKey) {
        self.apply(CartCommand::Remove(key));
    }

    pub fn update_quantity(&mut self, key: LineItemKey, quantity: i64) {
        self.apply(CartCommand::UpdateQuantity { key, quantity });
    }

    pub fn clear(&mut self) {
        self.apply(CartCommand::Clear);
    }

    pub fn open_cart(&mut self) {
        self.is_open = true;
    }

    pub fn close_cart(&mut self) {
        self.is_open = false;
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all line items.
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of `unit_price * quantity` across all line items, clamped to the
    /// `Decimal` range.
    pub fn total_price(&self) -> Decimal {
        saturating_sum(self.items.iter().map(CartLineItem::line_total))
    }

    /// Owned copy of the current items.
    pub fn snapshot(&self) -> Vec<CartLineItem> {
        self.items.clone()
    }

    pub fn view(&self) -> CartView {
        CartView {
            items: self.snapshot(),
            total_items: self.total_items(),
            total_price: self.total_price(),
            is_cart_open: self.is_open,
        }
    }
}
