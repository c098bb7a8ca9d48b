//! Typed endpoint methods on [`ApiGateway`].

use bento_core::{
    Cart, CartItem, CartItemId, CartKind, MenuId, MenuRef, Order, OrderFilters, OrderId, OrderStatus, StoreId,
    User,
};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::IgnoredAny;
use tracing::{debug, instrument, warn};

use super::wire::{
    AddToCart, CartItemResponse, CartResponse, GuestCartResponse, GuestSessionResponse, LoginRequest,
    MenuResponse, MigrationResponse, OrderCreate, OrderListResponse, OrderResponse, QuantityUpdate, StatusUpdate,
    StoreSelection, TokenResponse,
};
use super::{ApiError, ApiGateway, Unauthorized, normalize};

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginResponse {
    pub token: SecretString,
    pub user: User,
}

impl ApiGateway {
    // =========================================================================
    // Auth
    // =========================================================================

    /// `POST /auth/login`. A 401 here means bad credentials and leaves the
    /// stored session alone.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthExpired` for rejected credentials, or any other
    /// gateway error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let mut prepared = self.prepare(Method::POST, "auth/login", &[])?;
        prepared.builder = prepared.builder.json(&LoginRequest {
            username,
            password: password.expose_secret(),
        });
        let response: TokenResponse = self.execute(prepared, Unauthorized::Reject).await?;
        Ok(LoginResponse {
            token: SecretString::from(response.access_token),
            user: response.user,
        })
    }

    /// `GET /auth/me`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error; 401 clears the stored session.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get("auth/me", &[]).await
    }

    // =========================================================================
    // Guest session
    // =========================================================================

    /// `POST /guest/session`. Creates a session or refreshes the current one,
    /// and remembers its id.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn create_guest_session(&self) -> Result<String, ApiError> {
        let response: GuestSessionResponse = self
            .send_json(Method::POST, "guest/session", &serde_json::json!({}))
            .await?;
        self.remember(|s| s.set_guest_session_id(&response.session_id));
        if let Some(store_id) = response.selected_store_id {
            self.remember(|s| s.set_selected_store(store_id));
        }
        debug!(selected_store = ?response.selected_store_id, "Guest session ready");
        Ok(response.session_id)
    }

    /// `POST /guest/session/store`. Records the store the guest is ordering from.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn select_store(&self, store_id: StoreId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .send_json(Method::POST, "guest/session/store", &StoreSelection { store_id })
            .await?;
        self.remember(|s| s.set_selected_store(store_id));
        Ok(())
    }

    fn remember<F>(&self, write: F)
    where
        F: FnOnce(&crate::session::SessionStore) -> Result<(), crate::session::SessionError>,
    {
        if let Err(e) = write(self.session()) {
            tracing::warn!(error = %e, "Failed to persist session value");
        }
    }

    // =========================================================================
    // Guest cart
    // =========================================================================

    /// `GET /guest/cart`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn guest_cart(&self) -> Result<Cart, ApiError> {
        let raw: GuestCartResponse = self.get("guest/cart", &[]).await?;
        Ok(normalize::guest_cart(raw))
    }

    /// `POST /guest/cart/add`. Returns the whole cart.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(menu_id = %menu_id))]
    pub async fn guest_cart_add(&self, menu_id: MenuId, quantity: u32) -> Result<Cart, ApiError> {
        let raw: GuestCartResponse = self
            .send_json(Method::POST, "guest/cart/add", &AddToCart { menu_id, quantity })
            .await?;
        Ok(normalize::guest_cart(raw))
    }

    /// `PUT /guest/cart/item/{id}`. Returns the whole cart.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn guest_cart_update(&self, item_id: CartItemId, quantity: u32) -> Result<Cart, ApiError> {
        let raw: GuestCartResponse = self
            .send_json(
                Method::PUT,
                &format!("guest/cart/item/{item_id}"),
                &QuantityUpdate { quantity },
            )
            .await?;
        Ok(normalize::guest_cart(raw))
    }

    /// `DELETE /guest/cart/item/{id}`. Returns the whole cart.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn guest_cart_remove(&self, item_id: CartItemId) -> Result<Cart, ApiError> {
        let raw: GuestCartResponse = self
            .send_empty(Method::DELETE, &format!("guest/cart/item/{item_id}"), &[])
            .await?;
        Ok(normalize::guest_cart(raw))
    }

    // =========================================================================
    // User cart
    // =========================================================================

    /// `GET /customer/menus/{id}`. Unavailable menus come back as
    /// `ApiError::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(menu_id = %menu_id))]
    pub async fn menu(&self, menu_id: MenuId) -> Result<MenuRef, ApiError> {
        let raw: MenuResponse = self.get(&format!("customer/menus/{menu_id}"), &[]).await?;
        Ok(MenuRef {
            id: raw.id,
            store_id: raw.store_id,
        })
    }

    /// `GET /customer/cart`.
    ///
    /// The body does not name the store, so a non-empty cart is labelled with
    /// the store of the first line whose menu can still be looked up. When no
    /// line resolves the store stays unknown.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn user_cart(&self) -> Result<Cart, ApiError> {
        let raw: CartResponse = self.get("customer/cart", &[]).await?;
        let cart = normalize::user_cart(raw);
        let store_id = self.store_of(&cart).await?;
        Ok(Cart::from_items(CartKind::User, store_id, cart.items().to_vec()))
    }

    async fn store_of(&self, cart: &Cart) -> Result<Option<StoreId>, ApiError> {
        for item in cart.items() {
            match self.menu(item.menu_id).await {
                Ok(menu) => return Ok(Some(menu.store_id)),
                Err(ApiError::NotFound(_)) => {
                    debug!(menu_id = %item.menu_id, "Cart line's menu is gone, trying the next line");
                }
                Err(e) => return Err(e),
            }
        }
        if !cart.is_empty() {
            warn!(lines = cart.items().len(), "Could not determine the user cart's store");
        }
        Ok(None)
    }

    /// `POST /customer/cart/add`. Returns the affected line; the backend adds
    /// to an existing line for the same menu.
    ///
    /// # Errors
    ///
    /// Returns a gateway error, or `ApiError::Network` if the returned line is
    /// malformed.
    #[instrument(skip(self), fields(menu_id = %menu_id))]
    pub async fn user_cart_add(&self, menu_id: MenuId, quantity: u32) -> Result<CartItem, ApiError> {
        let raw: CartItemResponse = self
            .send_json(Method::POST, "customer/cart/add", &AddToCart { menu_id, quantity })
            .await?;
        normalize::user_cart_item(raw)
            .ok_or_else(|| ApiError::Network("cart line returned with no quantity".to_string()))
    }

    /// `PUT /customer/cart/{id}?quantity=`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error, or `ApiError::Network` if the returned line is
    /// malformed.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn user_cart_update(&self, item_id: CartItemId, quantity: u32) -> Result<CartItem, ApiError> {
        let raw: CartItemResponse = self
            .send_empty(
                Method::PUT,
                &format!("customer/cart/{item_id}"),
                &[("quantity", quantity.to_string())],
            )
            .await?;
        normalize::user_cart_item(raw)
            .ok_or_else(|| ApiError::Network("cart line returned with no quantity".to_string()))
    }

    /// `DELETE /customer/cart/{id}`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn user_cart_remove(&self, item_id: CartItemId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .send_empty(Method::DELETE, &format!("customer/cart/{item_id}"), &[])
            .await?;
        Ok(())
    }

    /// `DELETE /customer/cart`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn user_cart_clear(&self) -> Result<(), ApiError> {
        let _: IgnoredAny = self.send_empty(Method::DELETE, "customer/cart", &[]).await?;
        Ok(())
    }

    /// `POST /customer/cart/migrate`. Returns the number of migrated lines.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn migrate_cart(&self) -> Result<u32, ApiError> {
        let response: MigrationResponse = self
            .send_json(Method::POST, "customer/cart/migrate", &serde_json::json!({}))
            .await?;
        debug!(
            migrated = response.migrated_count,
            message = response.message.as_deref().unwrap_or_default(),
            "Server-side cart migration finished"
        );
        Ok(response.migrated_count)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// `GET /store/orders` with the given filters. Returns the orders and the
    /// backend's match count.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self, filters))]
    pub async fn store_orders(&self, filters: &OrderFilters) -> Result<(Vec<Order>, usize), ApiError> {
        let raw: OrderListResponse = self.get("store/orders", &filters.to_query_pairs()).await?;
        let total = raw.total.unwrap_or(raw.orders.len());
        let orders = raw
            .orders
            .into_iter()
            .map(normalize::order)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total))
    }

    /// `PUT /store/orders/{id}/status`. Returns the updated order.
    ///
    /// # Errors
    ///
    /// Returns a gateway error; an illegal transition comes back as
    /// `ApiError::Conflict` with the server's message.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order, ApiError> {
        let raw: OrderResponse = self
            .send_json(
                Method::PUT,
                &format!("store/orders/{order_id}/status"),
                &StatusUpdate {
                    status: status.as_str(),
                },
            )
            .await?;
        normalize::order(raw)
    }

    /// `POST /customer/orders`. Creates one order line.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(menu_id = %menu_id))]
    pub async fn create_order(&self, menu_id: MenuId, quantity: u32) -> Result<Order, ApiError> {
        let raw: OrderResponse = self
            .send_json(Method::POST, "customer/orders", &OrderCreate { menu_id, quantity })
            .await?;
        normalize::order(raw)
    }

    /// `GET /customer/orders`. Newest first.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self))]
    pub async fn customer_orders(&self) -> Result<Vec<Order>, ApiError> {
        let raw: OrderListResponse = self.get("customer/orders", &[]).await?;
        raw.orders.into_iter().map(normalize::order).collect()
    }

    /// `PUT /customer/orders/{id}/cancel`.
    ///
    /// # Errors
    ///
    /// Returns a gateway error.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_customer_order(&self, order_id: OrderId) -> Result<Order, ApiError> {
        let raw: OrderResponse = self
            .send_empty(Method::PUT, &format!("customer/orders/{order_id}/cancel"), &[])
            .await?;
        normalize::order(raw)
    }
}
