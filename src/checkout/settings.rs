//! Checkout Settings
//!
//! Holds the latest shipping configuration and payment widget key for the
//! site. Values start at the built-in defaults and are replaced whenever the
//! matching remote fetch succeeds; a failed fetch keeps whatever was there
//! before.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::{sync::watch, task::JoinHandle};

use super::{
    gateway::{active_public_key, StorefrontClient, PAYMENT_PROVIDER},
    pricing::ShippingConfig,
};

/// Public site settings as served by the storefront backend. Every field is
/// optional; absent fields leave the corresponding default untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,

    #[serde(default)]
    pub free_shipping_threshold: Option<Decimal>,

    #[serde(default)]
    pub pickup_enabled: Option<bool>,
}

impl SettingsPayload {
    pub fn apply_to(&self, base: &ShippingConfig) -> ShippingConfig {
        ShippingConfig {
            flat_shipping_cost: self.shipping_cost.unwrap_or(base.flat_shipping_cost),
            free_shipping_threshold: self
                .free_shipping_threshold
                .unwrap_or(base.free_shipping_threshold),
            pickup_enabled: self.pickup_enabled.unwrap_or(base.pickup_enabled),
        }
    }
}

/// Everything checkout reads from the site configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutConfig {
    pub shipping: ShippingConfig,

    /// Key the client initialises the payment widget with.
    pub payment_public_key: Option<String>,
}

/// Shared handle to the current [`CheckoutConfig`].
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    tx: watch::Sender<CheckoutConfig>,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::new(CheckoutConfig::default())
    }
}

impl CheckoutSettings {
    pub fn new(initial: CheckoutConfig) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> CheckoutConfig {
        self.tx.borrow().clone()
    }

    pub fn shipping(&self) -> ShippingConfig {
        self.tx.borrow().shipping.clone()
    }

    pub fn replace_shipping(&self, shipping: ShippingConfig) {
        self.tx.send_modify(|config| config.shipping = shipping);
    }

    pub fn set_payment_public_key(&self, key: String) {
        self.tx.send_modify(|config| config.payment_public_key = Some(key));
    }
}

/// Which parts of the settings a refresh updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub shipping: bool,
    pub payment_key: bool,
}

/// Fetches the remote settings and payment methods once and applies
/// whichever arrived.
pub async fn refresh_once(client: &StorefrontClient, settings: &CheckoutSettings) -> RefreshOutcome {
    let (shipping, methods) = tokio::join!(client.fetch_settings(), client.fetch_payment_methods());
    let mut outcome = RefreshOutcome::default();

    match shipping {
        Ok(payload) => {
            let updated = payload.apply_to(&settings.shipping());
            tracing::info!(
                flat_shipping_cost = %updated.flat_shipping_cost,
                free_shipping_threshold = %updated.free_shipping_threshold,
                pickup_enabled = updated.pickup_enabled,
                "shipping settings refreshed"
            );
            settings.replace_shipping(updated);
            outcome.shipping = true;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch shipping settings, keeping current values");
        }
    }

    match methods {
        Ok(methods) => match active_public_key(&methods, PAYMENT_PROVIDER) {
            Some(key) => {
                tracing::info!(provider = PAYMENT_PROVIDER, "payment public key refreshed");
                settings.set_payment_public_key(key.to_owned());
                outcome.payment_key = true;
            }
            None => tracing::warn!(
                provider = PAYMENT_PROVIDER,
                "no active payment provider with a public key, keeping current key"
            ),
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch payment methods, keeping current key");
        }
    }

    outcome
}

/// Refreshes the settings immediately and then on every `every` tick.
pub fn spawn_refresh(
    client: StorefrontClient,
    settings: CheckoutSettings,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            refresh_once(&client, &settings).await;
        }
    })
}
