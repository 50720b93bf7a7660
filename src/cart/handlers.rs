//! REST API handlers for shopping cart operations
//!
//! Every endpoint resolves the caller's session from the `cart_session`
//! cookie and answers with the resulting [`CartView`].

use super::{helpers::*, models::*, state::SharedState};
use crate::error::ApiError;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Creates routes for cart-related operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route(
            "/cart/items",
            post(add_item).patch(update_quantity).delete(remove_item),
        )
        .route("/cart/open", post(open_cart))
        .route("/cart/close", post(close_cart))
}

/// Serializes the view and establishes the session cookie when it is new.
fn cart_response(view: CartView, session_id: &str, is_new_session: bool) -> Response {
    let mut response = Json(view).into_response();

    if is_new_session {
        if let Some(cookie) = session_cookie(session_id) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }

    response
}

/// Endpoint: GET /cart
async fn get_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = state.view(&session_id, is_new_session);
    cart_response(view, &session_id, is_new_session)
}

/// Endpoint: POST /cart/items
/// Adds a line item, merging with an existing entry of the same key.
async fn add_item(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(item): Json<CartLineItem>,
) -> Result<Response, ApiError> {
    if item.quantity < 1 {
        return Err(ApiError::InvalidInput("quantity must be at least 1".into()));
    }
    if !item.has_valid_price() {
        return Err(ApiError::InvalidInput(format!(
            "price must be between 0 and {MAX_UNIT_PRICE}"
        )));
    }

    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        tracing::info!(
            session_id = %session_id,
            product_id = item.product_id,
            quantity = item.quantity,
            "adding to cart"
        );
        cart.add_item(item);
        cart.view()
    };

    Ok(cart_response(view, &session_id, is_new_session))
}

/// Endpoint: PATCH /cart/items
/// Quantities below one are ignored and the cart is returned unchanged.
async fn update_quantity(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<UpdateQuantityInput>,
) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        cart.update_quantity(input.key, input.quantity);
        cart.view()
    };
    cart_response(view, &session_id, is_new_session)
}

/// Endpoint: DELETE /cart/items?productId=..&colorId=..&variantId=..
async fn remove_item(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(key): Query<LineItemKey>,
) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        cart.remove_item(key);
        cart.view()
    };
    cart_response(view, &session_id, is_new_session)
}

/// Endpoint: DELETE /cart
async fn clear_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        cart.clear();
        cart.view()
    };
    tracing::info!(session_id = %session_id, "cart cleared");
    cart_response(view, &session_id, is_new_session)
}

/// Endpoint: POST /cart/open
async fn open_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        cart.open_cart();
        cart.view()
    };
    cart_response(view, &session_id, is_new_session)
}

/// Endpoint: POST /cart/close
async fn close_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session_id, is_new_session) = resolve_session_id(&headers);
    let view = {
        let mut cart = state.cart(&session_id);
        cart.close_cart();
        cart.view()
    };
    cart_response(view, &session_id, is_new_session)
}
