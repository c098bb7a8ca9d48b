//! A customer's own orders.

use bento_core::{Order, OrderStatus};
use tracing::{info, instrument};

use crate::api::ApiGateway;
use crate::board::StatusChangeError;
use crate::confirm::{Confirm, Confirmed};

/// Order history and cancellation for the signed-in customer.
#[derive(Debug, Clone)]
pub struct CustomerOrders {
    api: ApiGateway,
}

impl CustomerOrders {
    #[must_use]
    pub const fn new(api: ApiGateway) -> Self {
        Self { api }
    }

    /// Past orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn history(&self) -> Result<Vec<Order>, crate::api::ApiError> {
        self.api.customer_orders().await
    }

    /// Cancel a pending order after confirmation.
    ///
    /// # Errors
    ///
    /// Returns `StatusChangeError::InvalidTransition` without a request if the
    /// order is no longer pending, or the backend's rejection.
    #[instrument(skip(self, order, confirm), fields(order_id = %order.id))]
    pub async fn cancel(
        &self,
        order: &Order,
        confirm: &mut impl Confirm,
    ) -> Result<Confirmed<Order>, StatusChangeError> {
        order.status.check_transition(OrderStatus::Cancelled)?;
        if !confirm.confirm(&format!("Cancel your order #{} ({})?", order.id, order.menu_name)) {
            return Ok(Confirmed::Declined);
        }
        let updated = self.api.cancel_customer_order(order.id).await?;
        info!("Order cancelled by customer");
        Ok(Confirmed::Done(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::order;
    use crate::session::SessionStore;

    fn orders() -> CustomerOrders {
        let base = url::Url::parse("http://127.0.0.1:9/api/").expect("url");
        CustomerOrders::new(ApiGateway::with_client(
            reqwest::Client::new(),
            base,
            SessionStore::in_memory(),
        ))
    }

    #[tokio::test]
    async fn test_only_pending_orders_can_be_cancelled() {
        let mut asked = false;
        let result = orders()
            .cancel(&order(1, OrderStatus::Ready), &mut |_: &str| {
                asked = true;
                true
            })
            .await;
        assert!(matches!(result, Err(StatusChangeError::InvalidTransition(_))));
        assert!(!asked);
    }

    #[tokio::test]
    async fn test_declined_cancel_sends_nothing() {
        let result = orders()
            .cancel(&order(1, OrderStatus::Pending), &mut |_: &str| false)
            .await
            .expect("declined is not an error");
        assert!(result.is_declined());
    }
}
