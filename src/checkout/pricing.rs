//! Checkout Pricing
//!
//! Pure derivation of delivery cost and order total from the cart subtotal,
//! the chosen delivery method and the site's shipping configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat delivery charge used until the remote settings say otherwise
pub const DEFAULT_SHIPPING_COST: Decimal = Decimal::from_parts(15_000, 0, 0, false, 0);
/// Free-shipping threshold used until the remote settings say otherwise
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(300_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    #[default]
    Home,
    Pickup,
}

impl DeliveryMethod {
    /// Falls back to home delivery when pickup is requested but not offered.
    pub fn resolve(requested: DeliveryMethod, config: &ShippingConfig) -> DeliveryMethod {
        match requested {
            DeliveryMethod::Pickup if !config.pickup_enabled => DeliveryMethod::Home,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingConfig {
    pub flat_shipping_cost: Decimal,
    /// Zero disables free shipping entirely.
    pub free_shipping_threshold: Decimal,
    pub pickup_enabled: bool,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            flat_shipping_cost: DEFAULT_SHIPPING_COST,
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
            pickup_enabled: true,
        }
    }
}

impl ShippingConfig {
    pub fn qualifies_for_free_shipping(&self, subtotal: Decimal) -> bool {
        self.free_shipping_threshold > Decimal::ZERO && subtotal >= self.free_shipping_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutTotals {
    pub subtotal: Decimal,
    pub delivery_cost: Decimal,
    pub total: Decimal,
}

/// Derives delivery cost and total.
///
/// Pickup is always free; this function does not check `pickup_enabled`,
/// see [`DeliveryMethod::resolve`]. Inputs are not validated, so a negative
/// subtotal propagates arithmetically. The total clamps at the `Decimal`
/// range.
pub fn compute_totals(
    subtotal: Decimal,
    method: DeliveryMethod,
    config: &ShippingConfig,
) -> CheckoutTotals {
    let delivery_cost = match method {
        DeliveryMethod::Pickup => Decimal::ZERO,
        DeliveryMethod::Home if config.qualifies_for_free_shipping(subtotal) => Decimal::ZERO,
        DeliveryMethod::Home => config.flat_shipping_cost,
    };

    CheckoutTotals {
        subtotal,
        delivery_cost,
        total: subtotal.saturating_add(delivery_cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(flat: i64, threshold: i64) -> ShippingConfig {
        ShippingConfig {
            flat_shipping_cost: Decimal::from(flat),
            free_shipping_threshold: Decimal::from(threshold),
            pickup_enabled: true,
        }
    }

    #[test]
    fn zero_threshold_never_grants_free_shipping() {
        let totals = compute_totals(Decimal::ZERO, DeliveryMethod::Home, &config(15_000, 0));

        assert_eq!(totals.delivery_cost, Decimal::from(15_000));
        assert_eq!(totals.total, Decimal::from(15_000));
    }

    #[test]
    fn subtotal_meeting_threshold_ships_free() {
        let totals = compute_totals(
            Decimal::from(300_000),
            DeliveryMethod::Home,
            &config(15_000, 300_000),
        );

        assert_eq!(totals.delivery_cost, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(300_000));
    }

    #[test]
    fn subtotal_below_threshold_pays_flat_cost() {
        let totals = compute_totals(
            Decimal::new(29_999_999, 2),
            DeliveryMethod::Home,
            &config(15_000, 300_000),
        );

        assert_eq!(totals.delivery_cost, Decimal::from(15_000));
        assert_eq!(totals.total, Decimal::new(31_499_999, 2));
    }

    #[test]
    fn pickup_is_always_free() {
        for subtotal in [0, 1, 299_999, 300_000, 10_000_000] {
            for cfg in [config(15_000, 0), config(15_000, 300_000), config(0, 1)] {
                let totals = compute_totals(Decimal::from(subtotal), DeliveryMethod::Pickup, &cfg);
                assert_eq!(totals.delivery_cost, Decimal::ZERO);
                assert_eq!(totals.total, Decimal::from(subtotal));
            }
        }
    }

    #[test]
    fn negative_subtotal_propagates() {
        let totals = compute_totals(Decimal::from(-10), DeliveryMethod::Home, &config(15, 100));

        assert_eq!(totals.total, Decimal::from(5));
    }

    #[test]
    fn total_clamps_at_decimal_max() {
        let totals = compute_totals(Decimal::MAX, DeliveryMethod::Home, &config(15_000, 0));

        assert_eq!(totals.delivery_cost, Decimal::from(15_000));
        assert_eq!(totals.total, Decimal::MAX);
    }

    #[test]
    fn pickup_falls_back_to_home_when_disabled() {
        let mut cfg = ShippingConfig::default();
        assert_eq!(
            DeliveryMethod::resolve(DeliveryMethod::Pickup, &cfg),
            DeliveryMethod::Pickup
        );

        cfg.pickup_enabled = false;
        assert_eq!(
            DeliveryMethod::resolve(DeliveryMethod::Pickup, &cfg),
            DeliveryMethod::Home
        );
        assert_eq!(
            DeliveryMethod::resolve(DeliveryMethod::Home, &cfg),
            DeliveryMethod::Home
        );
    }

    #[test]
    fn defaults_match_storefront_fallbacks() {
        let cfg = ShippingConfig::default();

        assert_eq!(cfg.flat_shipping_cost, Decimal::from(15_000));
        assert_eq!(cfg.free_shipping_threshold, Decimal::from(300_000));
        assert!(cfg.pickup_enabled);
    }
}
