//! Cart types.
//!
//! A cart is either a guest cart (keyed by an anonymous server session) or a
//! user cart (keyed by the signed-in customer). Both hold the same canonical
//! [`CartItem`] shape; the two wire formats are normalized before they get here.
//!
//! ## Invariants
//!
//! - Every stored item has `quantity >= 1`. Setting a quantity of zero removes
//!   the item instead.
//! - All items belong to one store. Adding another store's menu item to a
//!   non-empty cart is rejected with [`StoreMismatch`].
//! - The total only counts available items.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CartItemId, MenuId, StoreId};
use super::price::Yen;

/// Which server-side collection a cart lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartKind {
    /// Anonymous cart identified by the guest session cookie.
    Guest,
    /// Cart owned by the authenticated customer.
    User,
}

/// A menu item from another store was added to a non-empty cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cart holds items from store {cart_store}; menu belongs to store {menu_store}")]
pub struct StoreMismatch {
    pub cart_store: StoreId,
    pub menu_store: StoreId,
}

/// The menu entry a customer wants to add to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuRef {
    pub id: MenuId,
    pub store_id: StoreId,
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart line identity (not the menu ID).
    pub id: CartItemId,
    pub menu_id: MenuId,
    pub name: String,
    pub unit_price: Yen,
    pub quantity: u32,
    pub image_url: Option<String>,
    /// Whether the menu item can currently be ordered.
    #[serde(default = "available_default")]
    pub available: bool,
}

const fn available_default() -> bool {
    true
}

impl CartItem {
    /// Price of this line.
    #[must_use]
    pub fn subtotal(&self) -> Yen {
        self.unit_price * self.quantity
    }
}

#[derive(Deserialize)]
struct RawCart {
    kind: CartKind,
    #[serde(default)]
    items: Vec<CartItem>,
    store_id: Option<StoreId>,
}

impl From<RawCart> for Cart {
    fn from(raw: RawCart) -> Self {
        Self::from_items(raw.kind, raw.store_id, raw.items)
    }
}

/// A cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCart")]
pub struct Cart {
    kind: CartKind,
    items: Vec<CartItem>,
    store_id: Option<StoreId>,
}

impl Cart {
    /// An empty cart of the given kind.
    #[must_use]
    pub const fn empty(kind: CartKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            store_id: None,
        }
    }

    /// Build a cart from items, dropping any line with a zero quantity.
    ///
    /// When `store_id` is unknown it stays unset until the first add.
    #[must_use]
    pub fn from_items(kind: CartKind, store_id: Option<StoreId>, items: Vec<CartItem>) -> Self {
        let items: Vec<CartItem> = items.into_iter().filter(|i| i.quantity > 0).collect();
        let store_id = if items.is_empty() { None } else { store_id };
        Self {
            kind,
            items,
            store_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CartKind {
        self.kind
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Store every item belongs to, if known.
    #[must_use]
    pub const fn store_id(&self) -> Option<StoreId> {
        self.store_id
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Find the line holding a given menu item.
    #[must_use]
    pub fn item_for_menu(&self, menu_id: MenuId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.menu_id == menu_id)
    }

    /// Sum of `unit_price * quantity` over available items.
    #[must_use]
    pub fn total(&self) -> Yen {
        self.items
            .iter()
            .filter(|i| i.available)
            .map(CartItem::subtotal)
            .sum()
    }

    /// Total number of units, used for the cart badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Check that a menu item from `store_id` may join this cart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreMismatch`] when the cart already holds another store's items.
    pub fn check_store(&self, store_id: StoreId) -> Result<(), StoreMismatch> {
        match self.store_id {
            Some(cart_store) if !self.items.is_empty() && cart_store != store_id => {
                Err(StoreMismatch {
                    cart_store,
                    menu_store: store_id,
                })
            }
            _ => Ok(()),
        }
    }

    /// Insert or replace a line by ID. A zero quantity removes the line.
    pub fn upsert_item(&mut self, item: CartItem, store_id: Option<StoreId>) {
        if item.quantity == 0 {
            self.remove_item(item.id);
            return;
        }
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item;
        } else {
            self.items.push(item);
        }
        if self.store_id.is_none() {
            self.store_id = store_id;
        }
    }

    /// Remove a line by ID, returning it if it was present.
    pub fn remove_item(&mut self, id: CartItemId) -> Option<CartItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        let removed = self.items.remove(index);
        if self.items.is_empty() {
            self.store_id = None;
        }
        Some(removed)
    }
}
