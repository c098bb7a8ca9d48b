//! Store order board.
//!
//! Holds the filtered order list staff work from, replaces it wholesale on
//! each refresh, spots orders that arrived since the previous refresh, and
//! applies status changes through the transition table.
//!
//! Only the latest refresh may update the board. Starting a refresh cancels
//! the one before it; a cancelled refresh still completes its request but its
//! result is dropped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bento_core::{
    Order, OrderCounts, OrderFilters, OrderId, OrderState, OrderStatus, StatusControl, TransitionError,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, ApiGateway};
use crate::confirm::{Confirm, Confirmed};
use crate::notify::NotificationManager;

/// Cooperative cancellation flag for one fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchToken(Arc<AtomicBool>);

impl FetchToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Finds orders that were not on the board at the previous refresh.
///
/// The first call only records what is there. Later calls report pending
/// orders whose ids were absent last time, then replace the remembered ids
/// with the current ones. An order that drops out of the filtered view is
/// forgotten and will be reported again if it comes back while pending.
#[derive(Debug, Default, Clone)]
pub struct NewOrderDetector {
    seen: HashSet<OrderId>,
    seeded: bool,
}

impl NewOrderDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known set of ids, as if a refresh had already happened.
    #[must_use]
    pub fn seeded_with(ids: impl IntoIterator<Item = OrderId>) -> Self {
        Self {
            seen: ids.into_iter().collect(),
            seeded: true,
        }
    }

    pub fn detect_new_orders(&mut self, current: &[Order]) -> Vec<Order> {
        let fresh = if self.seeded {
            current
                .iter()
                .filter(|o| o.is_pending() && !self.seen.contains(&o.id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        self.seen = current.iter().map(|o| o.id).collect();
        self.seeded = true;
        fresh
    }

    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.seeded
    }
}

/// What started a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Regular poll tick.
    Tick,
    /// Explicit user request.
    Manual,
    /// Coming back from the hidden state.
    Resume,
}

/// Result of a refresh that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The board was replaced; these orders are new since last time.
    Refreshed { new_orders: Vec<Order> },
    /// A newer refresh started first; this result was dropped.
    Discarded,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("session expired")]
    AuthExpired,

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for RefreshError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::AuthExpired => Self::AuthExpired,
            other => Self::Api(other),
        }
    }
}

/// Errors from a status change.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error("order {0} is not on the board")]
    UnknownOrder(OrderId),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("session expired")]
    AuthExpired,

    /// The backend refused the change. Its message is shown as is.
    #[error("{}", .0.user_message())]
    Rejected(ApiError),
}

impl From<ApiError> for StatusChangeError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::AuthExpired => Self::AuthExpired,
            other => Self::Rejected(other),
        }
    }
}

#[derive(Debug, Default)]
struct BoardState {
    orders: Vec<Order>,
    total: usize,
    filters: OrderFilters,
    detector: NewOrderDetector,
    in_flight: Option<FetchToken>,
}

/// The store's live order list.
#[derive(Debug, Clone)]
pub struct OrderBoard {
    api: ApiGateway,
    state: Arc<Mutex<BoardState>>,
    notifications: Arc<Mutex<NotificationManager>>,
}

impl OrderBoard {
    #[must_use]
    pub fn new(api: ApiGateway, notifications: NotificationManager) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(BoardState::default())),
            notifications: Arc::new(Mutex::new(notifications)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared notification manager.
    #[must_use]
    pub fn notifications(&self) -> MutexGuard<'_, NotificationManager> {
        self.notifications.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.state().orders.iter().find(|o| o.id == id).cloned()
    }

    #[must_use]
    pub fn counts(&self) -> OrderCounts {
        let state = self.state();
        OrderCounts::from_orders(&state.orders, state.total)
    }

    #[must_use]
    pub fn filters(&self) -> OrderFilters {
        self.state().filters.clone()
    }

    /// Replace the filters. Takes effect on the next refresh.
    pub fn set_filters(&self, filters: OrderFilters) {
        self.state().filters = filters;
    }

    /// Edit the filters in place. Takes effect on the next refresh.
    pub fn update_filters(&self, edit: impl FnOnce(&mut OrderFilters)) {
        edit(&mut self.state().filters);
    }

    /// Status choices for an order, or `None` if it is not on the board.
    #[must_use]
    pub fn status_control(&self, id: OrderId) -> Option<StatusControl> {
        self.order(id).map(|o| StatusControl::for_state(o.status))
    }

    /// Cancel the outstanding refresh, if any.
    pub fn cancel_in_flight(&self) {
        if let Some(token) = self.state().in_flight.take() {
            token.cancel();
        }
    }

    /// Fetch the board with the current filters and replace the list.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError::AuthExpired` if the session expired, or
    /// `RefreshError::Api` for other failures. A discarded refresh never errors.
    #[instrument(skip(self))]
    pub async fn refresh(&self, trigger: RefreshTrigger) -> Result<RefreshOutcome, RefreshError> {
        let (token, filters) = {
            let mut state = self.state();
            if let Some(previous) = state.in_flight.take() {
                debug!("Cancelling previous refresh");
                previous.cancel();
            }
            let token = FetchToken::new();
            state.in_flight = Some(token.clone());
            (token, state.filters.clone())
        };

        let result = self.api.store_orders(&filters).await;

        let new_orders = {
            let mut state = self.state();
            if token.is_cancelled() {
                debug!("Dropping result of cancelled refresh");
                return Ok(RefreshOutcome::Discarded);
            }
            state.in_flight = None;
            let (orders, total) = result?;
            let new_orders = state.detector.detect_new_orders(&orders);
            state.orders = orders;
            state.total = total;
            debug!(count = state.orders.len(), total, new = new_orders.len(), "Board refreshed");
            new_orders
        };

        if !new_orders.is_empty() {
            info!(count = new_orders.len(), "New orders arrived");
            let mut notifications = self.notifications();
            for order in &new_orders {
                notifications.notify_new_order(order);
            }
        }

        Ok(RefreshOutcome::Refreshed { new_orders })
    }

    /// Move an order to `to`.
    ///
    /// Illegal moves are rejected without a request. Cancelling asks for
    /// confirmation first. Moving an order out of `pending` marks one unread
    /// alert as handled.
    ///
    /// # Errors
    ///
    /// Returns `StatusChangeError`; on any error the board is unchanged.
    #[instrument(skip(self, confirm), fields(order_id = %id, to = %to))]
    pub async fn change_status(
        &self,
        id: OrderId,
        to: OrderStatus,
        confirm: &mut impl Confirm,
    ) -> Result<Confirmed<Order>, StatusChangeError> {
        let current = self.order(id).ok_or(StatusChangeError::UnknownOrder(id))?;
        current.status.check_transition(to)?;

        if to.is_destructive() && !confirm.confirm(&format!("Mark order #{id} as {}?", to.label())) {
            return Ok(Confirmed::Declined);
        }

        let updated = self.api.update_order_status(id, to).await.map_err(|e| {
            warn!(error = %e, "Status change rejected");
            StatusChangeError::from(e)
        })?;

        let left_pending = {
            let mut state = self.state();
            let mut left_pending = false;
            if let Some(slot) = state.orders.iter_mut().find(|o| o.id == id) {
                left_pending = slot.is_pending() && !updated.is_pending();
                *slot = updated.clone();
            }
            left_pending
        };
        if left_pending {
            self.notifications().decrement_unread();
        }

        info!(from = %current.status, to = %updated.status, "Order status changed");
        Ok(Confirmed::Done(updated))
    }

    /// Whether the order can still be moved by staff.
    #[must_use]
    pub fn is_actionable(state: OrderState) -> bool {
        !state.next_allowed().is_empty()
    }
}
