//! Turning the user cart into orders.

use bento_core::{CartKind, Order, Yen};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::ApiError;
use crate::cart::{CartError, CartModel};
use crate::confirm::{Confirm, Confirmed};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to place an order")]
    LoginRequired,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("'{0}' is no longer available; remove it to continue")]
    Unavailable(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    /// Some lines became orders before a request failed. The cart is left
    /// as it was so nothing is lost.
    #[error("placed {} order(s) before failing: {source}", placed.len())]
    Partial {
        placed: Vec<Order>,
        #[source]
        source: ApiError,
    },
}

/// Orders placed by a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub orders: Vec<Order>,
    pub total: Yen,
}

/// Place one order per cart line, then empty the cart.
///
/// # Errors
///
/// Returns `CheckoutError` if the user is signed out, the cart is empty or
/// holds unavailable lines, or a request fails.
#[instrument(skip(cart, confirm))]
pub async fn checkout(cart: &mut CartModel, confirm: &mut impl Confirm) -> Result<Confirmed<Receipt>, CheckoutError> {
    if !cart.api().session().is_authenticated() {
        return Err(CheckoutError::LoginRequired);
    }
    let snapshot = cart.load().await?.clone();
    if snapshot.kind() != CartKind::User {
        return Err(CheckoutError::LoginRequired);
    }
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if let Some(item) = snapshot.items().iter().find(|i| !i.available) {
        return Err(CheckoutError::Unavailable(item.name.clone()));
    }

    let total = snapshot.total();
    let prompt = format!("Place {} item(s) for {total}?", snapshot.item_count());
    if !confirm.confirm(&prompt) {
        return Ok(Confirmed::Declined);
    }

    let mut placed = Vec::with_capacity(snapshot.items().len());
    for item in snapshot.items() {
        match cart.api().create_order(item.menu_id, item.quantity).await {
            Ok(order) => placed.push(order),
            Err(source) => {
                warn!(menu_id = %item.menu_id, placed = placed.len(), error = %source, "Checkout stopped");
                if placed.is_empty() {
                    return Err(CheckoutError::Cart(source.into()));
                }
                return Err(CheckoutError::Partial { placed, source });
            }
        }
    }

    cart.clear_confirmed().await?;
    info!(orders = placed.len(), %total, "Checkout complete");
    Ok(Confirmed::Done(Receipt { orders: placed, total }))
}
