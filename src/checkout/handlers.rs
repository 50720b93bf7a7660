//! REST API handlers for checkout
//!
//! Quotes are priced against the shipping settings current at request time.
//! Submission prices the cart once more from a single snapshot and posts
//! that snapshot, so the charged total always matches the items sent. Only
//! one submission per session runs at a time.

use super::{
    order::{CheckoutSnapshot, CustomerInfo, OrderPayload},
    pricing::{CheckoutTotals, DeliveryMethod},
    settings::CheckoutConfig,
};
use crate::{
    cart::{helpers::*, state::SharedState},
    error::ApiError,
};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Creates routes for checkout operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/checkout/quote", get(quote))
        .route("/checkout", post(checkout))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub delivery_method: DeliveryMethod,
    #[serde(flatten)]
    pub totals: CheckoutTotals,
    pub pickup_enabled: bool,
    pub flat_shipping_cost: Decimal,
    pub free_shipping_threshold: Decimal,
    /// Key for the payment widget that produces `paymentData`
    pub payment_public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,

    pub customer: CustomerInfo,

    /// Opaque data produced by the payment widget
    #[serde(default)]
    pub payment_data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub id: Option<Value>,
    pub status: String,
    pub delivery_method: DeliveryMethod,
    pub total: Decimal,
}

/// Endpoint: GET /checkout/quote?deliveryMethod=home|pickup
async fn quote(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<QuoteQuery>,
) -> Json<QuoteResponse> {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let CheckoutConfig {
        shipping,
        payment_public_key,
    } = state.settings.current();
    let items = state.snapshot(&session_id, is_new_session);
    let snapshot = CheckoutSnapshot::from_items(items, query.delivery_method, &shipping);

    Json(QuoteResponse {
        delivery_method: snapshot.delivery_method,
        totals: snapshot.totals,
        pickup_enabled: shipping.pickup_enabled,
        flat_shipping_cost: shipping.flat_shipping_cost,
        free_shipping_threshold: shipping.free_shipping_threshold,
        payment_public_key,
    })
}

/// Endpoint: POST /checkout
/// Validates the customer, posts the order and clears the cart once the
/// payment is approved or in process.
async fn checkout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CheckoutInput>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let (session_id, is_new_session) = resolve_session_id(&headers);

    let errors = input.customer.validate();
    if !errors.is_empty() {
        return Err(ApiError::InvalidCustomer(errors));
    }
    if is_new_session {
        return Err(ApiError::EmptyCart);
    }

    let _in_flight = state
        .begin_checkout(&session_id)
        .ok_or(ApiError::CheckoutInProgress)?;

    let config = state.settings.shipping();
    let snapshot = {
        let cart = state.cart(&session_id);
        if cart.is_empty() {
            return Err(ApiError::EmptyCart);
        }
        CheckoutSnapshot::capture(&cart, input.delivery_method, &config)
    };

    let payload = OrderPayload::new(
        &snapshot,
        input.customer,
        input.payment_data,
        state.storefront.site().map(ToOwned::to_owned),
    );

    tracing::info!(
        session_id = %session_id,
        total = %snapshot.totals.total,
        items = %format_item_summary(&snapshot.items),
        "submitting order"
    );
    let result = state.storefront.submit_payment(&payload).await?;

    {
        let mut cart = state.cart(&session_id);
        if cart.items() == snapshot.items.as_slice() {
            cart.clear();
        } else {
            tracing::warn!(session_id = %session_id, "cart changed during payment, leaving it intact");
        }
    }
    tracing::info!(session_id = %session_id, status = %result.status, "order accepted");

    Ok(Json(CheckoutResponse {
        id: result.id,
        status: result.status,
        delivery_method: snapshot.delivery_method,
        total: snapshot.totals.total,
    }))
}
