//! Orders as shown on the store board and in customer history.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::id::{OrderId, StoreId};
use super::price::Yen;
use super::status::{OrderState, OrderStatus};

/// Fallback customer name when the backend has neither a full name nor a username.
pub const UNKNOWN_CUSTOMER: &str = "Unknown";

/// A single placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderState,
    pub quantity: u32,
    pub unit_price: Yen,
    pub total_amount: Yen,
    pub ordered_at: NaiveDateTime,
    /// Requested pickup time, if the customer chose one.
    pub pickup_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub customer_name: String,
    pub menu_name: String,
    /// Owning store. Customer history entries do not carry it.
    pub store_id: Option<StoreId>,
}

impl Order {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}

/// Summary counts for the order board header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderCounts {
    pub total: usize,
    pub pending: usize,
    pub ready: usize,
}

impl OrderCounts {
    /// Count the given orders. `total` is the backend's match count.
    #[must_use]
    pub fn from_orders(orders: &[Order], total: usize) -> Self {
        let count = |status: OrderStatus| {
            orders
                .iter()
                .filter(|o| o.status.live() == Some(status))
                .count()
        };
        Self {
            total,
            pending: count(OrderStatus::Pending),
            ready: count(OrderStatus::Ready),
        }
    }
}
