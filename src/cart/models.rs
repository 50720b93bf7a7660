//! Shopping Cart Domain Models
//!
//! This module contains all data structures related to the shopping cart
//! business domain. Field names on the wire match the JSON the storefront
//! persists under the `cart` storage key.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest unit price accepted from clients, in whole currency units.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

/// Sums money amounts, clamping at the `Decimal` range instead of panicking.
pub fn saturating_sum(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(amount))
}

// =============================================================================
// Cart Domain Models
// =============================================================================

/// Identity of a line item: product plus the selected color and variant.
///
/// An absent color or variant only ever equals another absent one, so
/// `color_id: None` and `color_id: Some(0)` are distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemKey {
    pub product_id: i64,

    #[serde(default)]
    pub color_id: Option<i64>,

    #[serde(default)]
    pub variant_id: Option<i64>,
}

impl LineItemKey {
    pub fn new(product_id: i64, color_id: Option<i64>, variant_id: Option<i64>) -> Self {
        Self {
            product_id,
            color_id,
            variant_id,
        }
    }
}

/// Represents a product configuration in the shopping cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Catalog product identifier
    #[serde(rename = "id")]
    pub product_id: i64,

    /// Display name captured when the item was added
    pub name: String,

    /// Unit price captured when the item was added
    #[serde(rename = "price")]
    pub unit_price: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub quantity: u32,

    #[serde(rename = "color", default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<i64>,

    #[serde(rename = "variant", default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
}

impl CartLineItem {
    /// Creates a plain line item with no color or variant selected.
    pub fn new(product_id: i64, name: impl Into<String>, unit_price: Decimal, quantity: u32) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            image: None,
            quantity,
            color_id: None,
            variant_id: None,
            color_name: None,
            variant_name: None,
        }
    }

    pub fn with_color(mut self, color_id: i64, color_name: impl Into<String>) -> Self {
        self.color_id = Some(color_id);
        self.color_name = Some(color_name.into());
        self
    }

    pub fn with_variant(mut self, variant_id: i64, variant_name: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id);
        self.variant_name = Some(variant_name.into());
        self
    }

    pub fn key(&self) -> LineItemKey {
        LineItemKey::new(self.product_id, self.color_id, self.variant_id)
    }

    /// `unit_price * quantity`, clamped to the `Decimal` range.
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Non-negative and no greater than [`MAX_UNIT_PRICE`].
    pub fn has_valid_price(&self) -> bool {
        self.unit_price >= Decimal::ZERO && self.unit_price <= Decimal::from(MAX_UNIT_PRICE)
    }
}

/// Read model returned to storefront clients after every cart operation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub total_items: u64,
    pub total_price: Decimal,
    pub is_cart_open: bool,
}

// =============================================================================
// Request Payloads
// =============================================================================

/// Input for `PATCH /cart/items`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityInput {
    #[serde(flatten)]
    pub key: LineItemKey,

    /// Signed so that zero and negative requests reach the store guard
    pub quantity: i64,
}
