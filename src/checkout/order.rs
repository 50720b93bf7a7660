//! Order assembly
//!
//! Captures a consistent cart snapshot with its totals and turns it into the
//! payload the payment endpoint expects.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pricing::{compute_totals, CheckoutTotals, DeliveryMethod, ShippingConfig};
use crate::cart::{
    models::{saturating_sum, CartLineItem},
    store::CartStore,
};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});
static CEDULA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6,12}$").expect("cedula pattern is valid"));

// =============================================================================
// Customer
// =============================================================================

/// Contact and delivery details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default, alias = "fullName")]
    pub full_name: String,

    /// National id number
    #[serde(default)]
    pub cedula: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub address: String,

    #[serde(default, alias = "deliveryNotes")]
    pub delivery_notes: String,
}

impl CustomerInfo {
    /// Returns field name → message for every invalid field. Empty means valid.
    pub fn validate(&self) -> BTreeMap<&'static str, &'static str> {
        let mut errors = BTreeMap::new();

        if self.full_name.trim().is_empty() {
            errors.insert("fullName", "required");
        }
        if !CEDULA_RE.is_match(self.cedula.trim()) {
            errors.insert("cedula", "must be 6 to 12 digits");
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            errors.insert("email", "invalid email address");
        }
        if self.address.trim().is_empty() {
            errors.insert("address", "required");
        }

        errors
    }
}

// =============================================================================
// Snapshot & Payload
// =============================================================================

/// Items and totals taken from the same cart state.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSnapshot {
    pub items: Vec<CartLineItem>,
    pub delivery_method: DeliveryMethod,
    pub totals: CheckoutTotals,
}

impl CheckoutSnapshot {
    /// Resolves the delivery method against `config` and prices the cart.
    pub fn capture(store: &CartStore, requested: DeliveryMethod, config: &ShippingConfig) -> Self {
        Self::from_items(store.snapshot(), requested, config)
    }

    /// Prices an owned list of items; an empty list prices to the delivery
    /// cost alone.
    pub fn from_items(
        items: Vec<CartLineItem>,
        requested: DeliveryMethod,
        config: &ShippingConfig,
    ) -> Self {
        let subtotal = saturating_sum(items.iter().map(CartLineItem::line_total));
        let delivery_method = DeliveryMethod::resolve(requested, config);

        Self {
            totals: compute_totals(subtotal, delivery_method, config),
            delivery_method,
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// Body posted to the payment endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPayload {
    pub items: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub delivery_method: DeliveryMethod,
    pub customer: CustomerInfo,
    pub payment_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl OrderPayload {
    pub fn new(
        snapshot: &CheckoutSnapshot,
        customer: CustomerInfo,
        payment_data: Value,
        site: Option<String>,
    ) -> Self {
        let items = snapshot
            .items
            .iter()
            .map(|i| OrderLine {
                name: i.name.clone(),
                quantity: i.quantity,
                price: i.unit_price,
            })
            .collect();

        Self {
            items,
            total_amount: snapshot.totals.total,
            delivery_method: snapshot.delivery_method,
            customer,
            payment_data,
            site,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::storage::{CartPersistence, MemoryStorage, CART_STORAGE_KEY};
    use serde_json::json;
    use std::sync::Arc;

    fn valid_customer() -> CustomerInfo {
        CustomerInfo {
            full_name: "Ana Gómez".into(),
            cedula: "10203040".into(),
            email: "ana@example.com".into(),
            address: "Calle 1 # 2-3".into(),
            delivery_notes: String::new(),
        }
    }

    fn store_with_items() -> CartStore {
        let mut store = CartStore::open(CartPersistence::new(
            Arc::new(MemoryStorage::new()),
            CART_STORAGE_KEY,
        ));
        store.add_item(CartLineItem::new(1, "Mug", Decimal::from(20_000), 2));
        store.add_item(CartLineItem::new(2, "Tee", Decimal::from(35_000), 1).with_color(1, "Red"));
        store
    }

    #[test]
    fn valid_customer_has_no_errors() {
        assert!(valid_customer().validate().is_empty());
    }

    #[test]
    fn invalid_customer_reports_each_field() {
        let customer = CustomerInfo {
            full_name: "  ".into(),
            cedula: "12ab".into(),
            email: "nope".into(),
            ..CustomerInfo::default()
        };

        let errors = customer.validate();

        assert_eq!(
            errors.keys().copied().collect::<Vec<_>>(),
            vec!["address", "cedula", "email", "fullName"]
        );
    }

    #[test]
    fn snapshot_totals_match_its_items() {
        let store = store_with_items();

        let snapshot = CheckoutSnapshot::capture(&store, DeliveryMethod::Home, &ShippingConfig::default());

        assert_eq!(snapshot.items, store.items());
        assert_eq!(snapshot.totals.subtotal, store.total_price());
        assert_eq!(snapshot.totals.delivery_cost, Decimal::from(15_000));
        assert_eq!(snapshot.totals.total, Decimal::from(90_000));
    }

    #[test]
    fn snapshot_resolves_disabled_pickup_to_home() {
        let store = store_with_items();
        let config = ShippingConfig {
            pickup_enabled: false,
            ..ShippingConfig::default()
        };

        let snapshot = CheckoutSnapshot::capture(&store, DeliveryMethod::Pickup, &config);

        assert_eq!(snapshot.delivery_method, DeliveryMethod::Home);
        assert_eq!(snapshot.totals.delivery_cost, config.flat_shipping_cost);
    }

    #[test]
    fn snapshot_of_out_of_range_prices_does_not_panic() {
        let items = vec![
            CartLineItem::new(1, "Huge", Decimal::MAX, 2),
            CartLineItem::new(2, "Mug", Decimal::from(20_000), 1),
        ];

        let snapshot = CheckoutSnapshot::from_items(items, DeliveryMethod::Home, &ShippingConfig::default());

        assert_eq!(snapshot.totals.subtotal, Decimal::MAX);
        assert_eq!(snapshot.totals.total, Decimal::MAX);
    }

    #[test]
    fn payload_carries_snapshot_lines_and_total() {
        let store = store_with_items();
        let snapshot = CheckoutSnapshot::capture(&store, DeliveryMethod::Pickup, &ShippingConfig::default());

        let payload = OrderPayload::new(
            &snapshot,
            valid_customer(),
            json!({ "token": "tok_1" }),
            Some("shop-1".into()),
        );
        let encoded = serde_json::to_value(&payload).unwrap();

        assert_eq!(encoded["total_amount"], "75000");
        assert_eq!(encoded["delivery_method"], "pickup");
        assert_eq!(encoded["items"][0]["name"], "Mug");
        assert_eq!(encoded["items"][0]["quantity"], 2);
        assert_eq!(encoded["items"][1]["price"], "35000");
        assert_eq!(encoded["customer"]["full_name"], "Ana Gómez");
        assert_eq!(encoded["payment_data"]["token"], "tok_1");
        assert_eq!(encoded["site"], "shop-1");
    }
}
