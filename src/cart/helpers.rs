//! Shopping Cart Business Logic Helpers
//!
//! This module contains helper functions for cart operations, session
//! resolution and formatting.

use super::models::{CartLineItem, LineItemKey};
use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

/// Name of the cookie carrying the storefront session id
pub const SESSION_COOKIE: &str = "cart_session";

/// Merges `incoming` into `cart_items`.
///
/// # Behaviour
///
/// * If an entry with the same [`LineItemKey`] exists, its `quantity` is
///   increased by the incoming quantity. Name, price and image of the
///   existing entry are kept as they were first added.
/// * Otherwise the item is appended, preserving insertion order.
pub fn merge_line_item(cart_items: &mut Vec<CartLineItem>, incoming: CartLineItem) {
    let key = incoming.key();
    if let Some(existing) = cart_items.iter_mut().find(|i| i.key() == key) {
        existing.quantity = existing.quantity.saturating_add(incoming.quantity);
    } else {
        cart_items.push(incoming);
    }
}

pub fn find_line_item_mut<'a>(
    cart_items: &'a mut [CartLineItem],
    key: &LineItemKey,
) -> Option<&'a mut CartLineItem> {
    cart_items.iter_mut().find(|i| i.key() == *key)
}

/// Produces a human-readable one-line summary for a list of cart items.
///
/// Example output: `"2x Apple, 1x Banana (Red)"`.
pub fn format_item_summary(items: &[CartLineItem]) -> String {
    items
        .iter()
        .map(|i| {
            let options: Vec<&str> = [i.color_name.as_deref(), i.variant_name.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if options.is_empty() {
                format!("{}x {}", i.quantity, i.name)
            } else {
                format!("{}x {} ({})", i.quantity, i.name, options.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Sessions
// =============================================================================

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Returns the session id from the `cart_session` cookie, or a freshly minted
/// one. The boolean is `true` when the id is new and must be sent back.
pub fn resolve_session_id(headers: &HeaderMap) -> (String, bool) {
    let existing = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| is_valid_session_id(value));

    match existing {
        Some(id) => (id.to_owned(), false),
        None => (Uuid::new_v4().simple().to_string(), true),
    }
}

/// `Set-Cookie` value establishing the session.
pub fn session_cookie(session_id: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn merge_keeps_first_snapshot() {
        let mut items = vec![CartLineItem::new(1, "A", Decimal::from(1000), 2)];

        merge_line_item(&mut items, CartLineItem::new(1, "A-stale", Decimal::from(999), 3));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[0].name, "A");
        assert_eq!(items[0].unit_price, Decimal::from(1000));
    }

    #[test]
    fn summary_lists_options() {
        let items = vec![
            CartLineItem::new(1, "Apple", Decimal::ONE, 2),
            CartLineItem::new(2, "Shirt", Decimal::ONE, 1).with_color(4, "Red"),
        ];

        assert_eq!(format_item_summary(&items), "2x Apple, 1x Shirt (Red)");
    }

    #[test]
    fn reads_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; cart_session=abc-123"),
        );

        assert_eq!(resolve_session_id(&headers), ("abc-123".to_owned(), false));
    }

    #[test]
    fn rejects_unsafe_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("cart_session=../../etc"),
        );

        let (id, is_new) = resolve_session_id(&headers);
        assert!(is_new);
        assert_ne!(id, "../../etc");
    }
}
