//! Storefront Cart Library
//!
//! This library provides the shopping cart and checkout pricing core of a
//! storefront: a persisted per-session cart, the delivery/total calculator
//! and the HTTP surface storefront clients talk to.

// Domain modules
pub mod cart;
pub mod checkout;

// Infrastructure
pub mod config;
pub mod error;
pub mod router;
