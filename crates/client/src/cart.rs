//! Cart model.
//!
//! [`CartModel`] owns the local copy of whichever cart is active: the guest
//! cart while signed out, the user cart while signed in. Every mutation goes to
//! the backend first and is applied locally only after the backend confirms it,
//! so a failed call leaves the local cart exactly as it was.
//!
//! Mutations take `&mut self`, so one model never has two mutations in flight.

use bento_core::{Cart, CartItemId, CartKind, MenuRef, StoreId, StoreMismatch, Yen};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, ApiGateway};
use crate::confirm::{Confirm, Confirmed};

/// Largest quantity the backend accepts for one line.
pub const MAX_QUANTITY: u32 = 99;

/// Errors from a cart operation.
#[derive(Debug, Error)]
pub enum CartError {
    /// The backend could not be reached or answered unexpectedly.
    #[error("network failure: {0}")]
    NetworkFailure(#[source] ApiError),

    /// The request was rejected as invalid.
    #[error("validation failure: {0}")]
    ValidationFailure(#[source] ApiError),

    /// The request conflicts with the cart's server-side state.
    #[error("conflict: {0}")]
    ConflictFailure(#[source] ApiError),

    /// The session expired; the user has to sign in again.
    #[error("session expired")]
    AuthExpired,

    /// The menu item belongs to a different store than the cart.
    #[error(transparent)]
    StoreMismatch(#[from] StoreMismatch),

    /// The cart has items but their store could not be determined.
    #[error("cannot tell which store the cart's items belong to")]
    UnknownStore,

    /// Quantity outside `1..=MAX_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_QUANTITY}, got {0}")]
    InvalidQuantity(i64),

    /// The line is not in the local cart.
    #[error("cart item {0} is not in the cart")]
    UnknownItem(CartItemId),
}

impl From<ApiError> for CartError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::AuthExpired => Self::AuthExpired,
            ApiError::Validation(_) | ApiError::Forbidden(_) => Self::ValidationFailure(e),
            ApiError::Conflict(_) | ApiError::NotFound(_) => Self::ConflictFailure(e),
            ApiError::Server { .. } | ApiError::Network(_) => Self::NetworkFailure(e),
        }
    }
}

impl CartError {
    /// A single display line for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkFailure(e) | Self::ValidationFailure(e) | Self::ConflictFailure(e) => {
                e.user_message()
            }
            Self::AuthExpired => ApiError::AuthExpired.user_message(),
            Self::StoreMismatch(_) | Self::UnknownStore => {
                "Your cart has items from another store. Check out or clear it first.".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn checked_quantity(quantity: i64) -> Result<u32, CartError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| (1..=MAX_QUANTITY).contains(q))
        .ok_or(CartError::InvalidQuantity(quantity))
}

/// The active cart and the operations on it.
#[derive(Debug)]
pub struct CartModel {
    api: ApiGateway,
    cart: Cart,
    loaded: bool,
}

impl CartModel {
    /// Create a model seeded from the last persisted snapshot.
    ///
    /// The snapshot is only a starting point for display; the first mutation
    /// reloads from the backend.
    #[must_use]
    pub fn new(api: ApiGateway) -> Self {
        let kind = active_kind(&api);
        let cart = api
            .session()
            .cart_snapshot()
            .filter(|c| c.kind() == kind)
            .unwrap_or_else(|| Cart::empty(kind));
        Self {
            api,
            cart,
            loaded: false,
        }
    }

    pub(crate) const fn api(&self) -> &ApiGateway {
        &self.api
    }

    /// Current local snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn total(&self) -> Yen {
        self.cart.total()
    }

    /// Number of units, shown on the cart badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.item_count()
    }

    /// Fetch the active cart from the backend.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the backend call fails.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<&Cart, CartError> {
        let cart = match active_kind(&self.api) {
            CartKind::User => self.api.user_cart().await?,
            CartKind::Guest => {
                if self.api.session().guest_session_id().is_none() {
                    // Nothing to fetch until the backend has issued a session.
                    Cart::empty(CartKind::Guest)
                } else {
                    self.api.guest_cart().await?
                }
            }
        };
        self.apply(cart);
        self.loaded = true;
        Ok(&self.cart)
    }

    async fn ensure_current(&mut self) -> Result<(), CartError> {
        if !self.loaded || self.cart.kind() != active_kind(&self.api) {
            self.load().await?;
        }
        Ok(())
    }

    fn apply(&mut self, cart: Cart) {
        self.cart = cart;
        if let Err(e) = self.api.session().set_cart_snapshot(&self.cart) {
            warn!(error = %e, "Failed to persist cart snapshot");
        }
    }

    /// Add `quantity` units of a menu item.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreMismatch` before any request when the cart
    /// already holds another store's items, `CartError::UnknownStore` when it
    /// holds items whose store is unknown, or a backend error.
    #[instrument(skip(self), fields(menu_id = %menu.id, store_id = %menu.store_id))]
    pub async fn add_item(&mut self, menu: MenuRef, quantity: u32) -> Result<&Cart, CartError> {
        let quantity = checked_quantity(i64::from(quantity))?;
        self.ensure_current().await?;
        if !self.cart.is_empty() && self.cart.store_id().is_none() {
            return Err(CartError::UnknownStore);
        }
        self.cart.check_store(menu.store_id)?;

        let cart = match self.cart.kind() {
            CartKind::User => {
                let item = self.api.user_cart_add(menu.id, quantity).await?;
                let mut cart = self.cart.clone();
                cart.upsert_item(item, Some(menu.store_id));
                cart
            }
            CartKind::Guest => {
                self.prepare_guest_session(menu.store_id).await?;
                self.api.guest_cart_add(menu.id, quantity).await?
            }
        };

        self.apply(cart);
        info!(count = self.cart.item_count(), "Added to cart");
        Ok(&self.cart)
    }

    /// Make sure the backend has a guest session pointed at `store_id`.
    async fn prepare_guest_session(&self, store_id: StoreId) -> Result<(), CartError> {
        let session = self.api.session();
        if session.guest_session_id().is_none() {
            self.api.create_guest_session().await?;
        }
        if session.selected_store() != Some(store_id) || self.cart.store_id().is_none() {
            self.api.select_store(store_id).await?;
        }
        Ok(())
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the cart, or a
    /// backend error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_quantity(&mut self, item_id: CartItemId, quantity: i64) -> Result<&Cart, CartError> {
        if quantity <= 0 {
            return self.remove_confirmed(item_id).await;
        }
        let quantity = checked_quantity(quantity)?;
        self.ensure_current().await?;
        if self.cart.item(item_id).is_none() {
            return Err(CartError::UnknownItem(item_id));
        }

        let cart = match self.cart.kind() {
            CartKind::User => {
                let item = self.api.user_cart_update(item_id, quantity).await?;
                let mut cart = self.cart.clone();
                cart.upsert_item(item, None);
                cart
            }
            CartKind::Guest => self.api.guest_cart_update(item_id, quantity).await?,
        };

        self.apply(cart);
        Ok(&self.cart)
    }

    /// Remove a line after confirmation.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownItem` if the line is not in the cart, or a
    /// backend error.
    #[instrument(skip(self, confirm), fields(item_id = %item_id))]
    pub async fn remove_item(
        &mut self,
        item_id: CartItemId,
        confirm: &mut impl Confirm,
    ) -> Result<Confirmed<&Cart>, CartError> {
        self.ensure_current().await?;
        let Some(item) = self.cart.item(item_id) else {
            return Err(CartError::UnknownItem(item_id));
        };
        if !confirm.confirm(&format!("Remove {} from your cart?", item.name)) {
            return Ok(Confirmed::Declined);
        }
        self.remove_confirmed(item_id).await.map(Confirmed::Done)
    }

    async fn remove_confirmed(&mut self, item_id: CartItemId) -> Result<&Cart, CartError> {
        self.ensure_current().await?;
        if self.cart.item(item_id).is_none() {
            return Err(CartError::UnknownItem(item_id));
        }

        let cart = match self.cart.kind() {
            CartKind::User => {
                self.api.user_cart_remove(item_id).await?;
                let mut cart = self.cart.clone();
                cart.remove_item(item_id);
                cart
            }
            CartKind::Guest => self.api.guest_cart_remove(item_id).await?,
        };

        self.apply(cart);
        debug!(count = self.cart.item_count(), "Removed from cart");
        Ok(&self.cart)
    }

    /// Empty the cart after confirmation.
    ///
    /// The guest cart has no bulk delete, so its lines are removed one by one;
    /// if one fails the model reloads so it matches what the backend kept.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    #[instrument(skip(self, confirm))]
    pub async fn clear(&mut self, confirm: &mut impl Confirm) -> Result<Confirmed<()>, CartError> {
        self.ensure_current().await?;
        if self.cart.is_empty() {
            return Ok(Confirmed::Done(()));
        }
        if !confirm.confirm("Remove every item from your cart?") {
            return Ok(Confirmed::Declined);
        }
        self.clear_confirmed().await.map(Confirmed::Done)
    }

    pub(crate) async fn clear_confirmed(&mut self) -> Result<(), CartError> {
        match self.cart.kind() {
            CartKind::User => {
                self.api.user_cart_clear().await?;
                self.apply(Cart::empty(CartKind::User));
            }
            CartKind::Guest => {
                let ids: Vec<CartItemId> = self.cart.items().iter().map(|i| i.id).collect();
                for id in ids {
                    if let Err(e) = self.api.guest_cart_remove(id).await {
                        warn!(item_id = %id, error = %e, "Guest cart clear stopped early, reloading");
                        if let Err(reload) = self.load().await {
                            warn!(error = %reload, "Reload after failed clear also failed");
                        }
                        return Err(e.into());
                    }
                }
                self.apply(Cart::empty(CartKind::Guest));
            }
        }
        info!("Cart cleared");
        Ok(())
    }
}

fn active_kind(api: &ApiGateway) -> CartKind {
    if api.session().is_authenticated() {
        CartKind::User
    } else {
        CartKind::Guest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_map_to_cart_errors() {
        assert!(matches!(
            CartError::from(ApiError::Network("refused".to_string())),
            CartError::NetworkFailure(_)
        ));
        assert!(matches!(
            CartError::from(ApiError::Validation(Vec::new())),
            CartError::ValidationFailure(_)
        ));
        assert!(matches!(
            CartError::from(ApiError::Conflict("Menu is not available".to_string())),
            CartError::ConflictFailure(_)
        ));
        assert!(matches!(CartError::from(ApiError::AuthExpired), CartError::AuthExpired));
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(checked_quantity(1).ok(), Some(1));
        assert_eq!(checked_quantity(99).ok(), Some(99));
        assert!(matches!(checked_quantity(100), Err(CartError::InvalidQuantity(100))));
        assert!(matches!(checked_quantity(-1), Err(CartError::InvalidQuantity(-1))));
    }

    #[test]
    fn test_conflict_message_is_verbatim() {
        let err = CartError::from(ApiError::Conflict("Menu is not available".to_string()));
        assert_eq!(err.user_message(), "Menu is not available");
    }
}
