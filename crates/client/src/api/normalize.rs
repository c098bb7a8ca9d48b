//! Adapters from backend bodies to canonical types.
//!
//! Guest carts nest the menu under each line while user carts flatten it into
//! `menu_name`/`menu_price`. Orders come with `total_price` and
//! `delivery_time`. Each shape has exactly one adapter here.

use bento_core::types::order::UNKNOWN_CUSTOMER;
use bento_core::{Cart, CartItem, CartKind, Order, Yen};
use chrono::{DateTime, NaiveDateTime, NaiveTime};
use tracing::warn;

use super::error::ApiError;
use super::wire::{CartItemResponse, CartResponse, GuestCartItemResponse, GuestCartResponse, OrderResponse};

fn quantity(raw: i64) -> Option<u32> {
    u32::try_from(raw).ok().filter(|q| *q > 0)
}

/// One guest cart line. Lines with a non-positive quantity are dropped.
#[must_use]
pub fn guest_cart_item(raw: GuestCartItemResponse) -> Option<CartItem> {
    let quantity = quantity(raw.quantity)?;
    let item = match raw.menu {
        Some(menu) => CartItem {
            id: raw.id,
            menu_id: raw.menu_id,
            name: menu.name,
            unit_price: Yen::new(menu.price),
            quantity,
            image_url: menu.image_url,
            available: menu.is_available,
        },
        // The menu was deleted; keep the line visible but out of the total.
        None => CartItem {
            id: raw.id,
            menu_id: raw.menu_id,
            name: format!("Menu #{}", raw.menu_id),
            unit_price: Yen::ZERO,
            quantity,
            image_url: None,
            available: false,
        },
    };
    Some(item)
}

/// The whole guest cart.
#[must_use]
pub fn guest_cart(raw: GuestCartResponse) -> Cart {
    let item_store = raw
        .items
        .iter()
        .find_map(|i| i.menu.as_ref().map(|m| m.store_id));
    let store_id = item_store.or(raw.selected_store_id);
    let items = raw.items.into_iter().filter_map(guest_cart_item).collect();
    Cart::from_items(CartKind::Guest, store_id, items)
}

/// One user cart line. Lines with a non-positive quantity are dropped.
#[must_use]
pub fn user_cart_item(raw: CartItemResponse) -> Option<CartItem> {
    Some(CartItem {
        id: raw.id,
        menu_id: raw.menu_id,
        name: raw.menu_name,
        unit_price: Yen::new(raw.menu_price),
        quantity: quantity(raw.quantity)?,
        image_url: raw.menu_image_url,
        available: true,
    })
}

/// The whole user cart. User cart bodies do not name the store, so the
/// result has none; the gateway looks it up separately.
#[must_use]
pub fn user_cart(raw: CartResponse) -> Cart {
    let items = raw.items.into_iter().filter_map(user_cart_item).collect();
    Cart::from_items(CartKind::User, None, items)
}

/// Map a backend order onto [`Order`].
///
/// # Errors
///
/// Returns [`ApiError::Network`] when `ordered_at` is not a timestamp.
pub fn order(raw: OrderResponse) -> Result<Order, ApiError> {
    if raw.status.is_legacy() {
        warn!(
            order_id = %raw.id,
            status = %raw.status,
            "Order has a legacy status; it is shown read-only"
        );
    }

    let ordered_at = parse_timestamp(&raw.ordered_at).ok_or_else(|| {
        ApiError::Network(format!("order {} has malformed ordered_at '{}'", raw.id, raw.ordered_at))
    })?;
    let pickup_time = raw.delivery_time.as_deref().and_then(|t| {
        let parsed = parse_time(t);
        if parsed.is_none() {
            warn!(order_id = %raw.id, delivery_time = t, "Ignoring malformed pickup time");
        }
        parsed
    });

    let quantity = u32::try_from(raw.quantity).unwrap_or(0);
    let unit_price = raw
        .menu
        .as_ref()
        .map(|m| m.price)
        .or(raw.menu_price)
        .or_else(|| (raw.quantity > 0).then(|| raw.total_price / raw.quantity))
        .unwrap_or_default();
    let menu_name = raw
        .menu
        .map(|m| m.name)
        .or(raw.menu_name)
        .unwrap_or_default();
    let customer_name = raw
        .user
        .map(|u| match u.full_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => u.username,
        })
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string());

    Ok(Order {
        id: raw.id,
        status: raw.status,
        quantity,
        unit_price: Yen::new(unit_price),
        total_amount: Yen::new(raw.total_price),
        ordered_at,
        pickup_time,
        notes: raw.notes.filter(|n| !n.trim().is_empty()),
        customer_name,
        menu_name,
        store_id: raw.store_id,
    })
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_local()))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
