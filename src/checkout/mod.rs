//! Checkout Domain Module
//!
//! - Pricing calculator (delivery cost, free-shipping rule, totals)
//! - Shipping settings with remote refresh and built-in fallbacks
//! - Order snapshot and payment payload
//! - Client for the remote storefront backend
//! - REST API handlers

pub mod gateway;
pub mod handlers;
pub mod order;
pub mod pricing;
pub mod settings;

pub use handlers::routes;
pub use pricing::{compute_totals, CheckoutTotals, DeliveryMethod, ShippingConfig};
