//! Request and response bodies exactly as the backend sends them.
//!
//! Nothing outside the `api` module sees these types; [`super::normalize`]
//! turns them into the canonical `bento_core` shapes at the boundary.

use bento_core::{CartItemId, MenuId, OrderId, OrderState, StoreId, User};
use serde::{Deserialize, Serialize};

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: User,
}

// =============================================================================
// Guest session
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GuestSessionResponse {
    pub session_id: String,
    #[serde(default)]
    pub selected_store_id: Option<StoreId>,
}

#[derive(Debug, Serialize)]
pub struct StoreSelection {
    pub store_id: StoreId,
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AddToCart {
    pub menu_id: MenuId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

/// Menu nested inside a guest cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuResponse {
    pub id: MenuId,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub store_id: StoreId,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct GuestCartItemResponse {
    pub id: CartItemId,
    pub menu_id: MenuId,
    pub quantity: i64,
    #[serde(default)]
    pub menu: Option<MenuResponse>,
}

#[derive(Debug, Deserialize)]
pub struct GuestCartResponse {
    #[serde(default)]
    pub items: Vec<GuestCartItemResponse>,
    #[serde(default)]
    pub selected_store_id: Option<StoreId>,
}

/// User cart line with the menu fields flattened in.
#[derive(Debug, Deserialize)]
pub struct CartItemResponse {
    pub id: CartItemId,
    pub menu_id: MenuId,
    pub menu_name: String,
    pub menu_price: i64,
    #[serde(default)]
    pub menu_image_url: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<CartItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct MigrationResponse {
    #[serde(default)]
    pub migrated_count: u32,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrderCreate {
    pub menu_id: MenuId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdate {
    pub status: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderMenu {
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderUser {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: OrderId,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    pub quantity: i64,
    pub total_price: i64,
    pub status: OrderState,
    #[serde(default)]
    pub delivery_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub ordered_at: String,
    #[serde(default)]
    pub menu: Option<OrderMenu>,
    #[serde(default)]
    pub user: Option<OrderUser>,
    /// History entries flatten the menu instead of nesting it.
    #[serde(default)]
    pub menu_name: Option<String>,
    #[serde(default)]
    pub menu_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListResponse {
    #[serde(default)]
    pub orders: Vec<OrderResponse>,
    #[serde(default)]
    pub total: Option<usize>,
}
