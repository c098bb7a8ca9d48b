//! Store order board: status changes, new-order detection and stale refreshes.
//!
//! Run with: cargo test -p bento-integration-tests --test orders

use std::time::Duration;

use bento_client::{
    ApiGateway, AssumeYes, Confirmed, CustomerOrders, OrderBoard, RefreshOutcome, RefreshTrigger, StatusChangeError,
};
use bento_core::{OrderFilters, OrderId, OrderState, OrderStatus};
use bento_integration_tests::{CUSTOMER, FakeBackend, MENU_A, MENU_B, MENU_C, STAFF, silent_notifications};

const ORDERS: &str = "GET /api/store/orders";

async fn staff_board(backend: &FakeBackend) -> (ApiGateway, OrderBoard) {
    let api = backend.gateway();
    backend.sign_in(&api, STAFF).await;
    let board = OrderBoard::new(api.clone(), silent_notifications(api.session().clone()));
    (api, board)
}

/// A board showing every status.
async fn full_board(backend: &FakeBackend) -> OrderBoard {
    let (_, board) = staff_board(backend).await;
    board.update_filters(|f| f.statuses.clear());
    board
}

fn status_route(id: i64) -> String {
    format!("PUT /api/store/orders/{id}/status")
}

fn new_ids(outcome: &RefreshOutcome) -> Vec<OrderId> {
    match outcome {
        RefreshOutcome::Refreshed { new_orders } => new_orders.iter().map(|o| o.id).collect(),
        RefreshOutcome::Discarded => panic!("refresh was discarded"),
    }
}

async fn wait_for_hits(backend: &FakeBackend, route: &str, count: usize) {
    for _ in 0..200 {
        if backend.hits(route) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{route} never reached {count} request(s)");
}

// ============================================================================
// Status machine
// ============================================================================

#[tokio::test]
async fn test_pending_to_ready_to_completed() {
    let backend = FakeBackend::start().await;
    let id = backend.place_order(CUSTOMER, MENU_A, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    let ready = board
        .change_status(OrderId::new(id), OrderStatus::Ready, &mut AssumeYes)
        .await
        .expect("ready");
    assert_eq!(ready.done().map(|o| o.status), Some(OrderState::Live(OrderStatus::Ready)));

    board
        .change_status(OrderId::new(id), OrderStatus::Completed, &mut AssumeYes)
        .await
        .expect("completed");
    assert_eq!(backend.order_status(id).as_deref(), Some("completed"));
}

#[tokio::test]
async fn test_terminal_orders_have_disabled_control() {
    let backend = FakeBackend::start().await;
    let done = backend.place_order(CUSTOMER, MENU_A, 1);
    let dropped = backend.place_order(CUSTOMER, MENU_B, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    for status in [OrderStatus::Ready, OrderStatus::Completed] {
        board
            .change_status(OrderId::new(done), status, &mut AssumeYes)
            .await
            .expect("legal move");
    }
    board
        .change_status(OrderId::new(dropped), OrderStatus::Cancelled, &mut AssumeYes)
        .await
        .expect("cancel");

    for id in [done, dropped] {
        let order = board.order(OrderId::new(id)).expect("on board");
        assert!(order.status.next_allowed().is_empty());
        assert!(!OrderBoard::is_actionable(order.status));
        let control = board.status_control(OrderId::new(id)).expect("control");
        assert!(control.disabled);
        assert_eq!(control.values().len(), 1);
    }
}

#[tokio::test]
async fn test_illegal_transitions_send_no_request() {
    let backend = FakeBackend::start().await;
    let pending = backend.place_order(CUSTOMER, MENU_A, 1);
    let ready = backend.place_order(CUSTOMER, MENU_A, 1);
    let completed = backend.place_order(CUSTOMER, MENU_B, 1);
    let cancelled = backend.place_order(CUSTOMER, MENU_B, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    let moves = [
        (ready, vec![OrderStatus::Ready]),
        (completed, vec![OrderStatus::Ready, OrderStatus::Completed]),
        (cancelled, vec![OrderStatus::Cancelled]),
    ];
    for (id, steps) in &moves {
        for step in steps {
            board
                .change_status(OrderId::new(*id), *step, &mut AssumeYes)
                .await
                .expect("setup move");
        }
    }

    let states = [
        (pending, OrderStatus::Pending),
        (ready, OrderStatus::Ready),
        (completed, OrderStatus::Completed),
        (cancelled, OrderStatus::Cancelled),
    ];
    for (id, current) in states {
        let before = backend.hits(&status_route(id));
        for to in OrderStatus::ALL {
            if current.can_transition_to(to) {
                continue;
            }
            let err = board
                .change_status(OrderId::new(id), to, &mut AssumeYes)
                .await
                .expect_err("illegal move");
            assert!(matches!(err, StatusChangeError::InvalidTransition(_)), "{current} -> {to}");
        }
        assert_eq!(backend.hits(&status_route(id)), before, "order in {current}");
    }
}

#[tokio::test]
async fn test_backend_rejection_leaves_board_unchanged() {
    let backend = FakeBackend::start().await;
    let id = backend.place_order(CUSTOMER, MENU_A, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    backend.fail_next(&status_route(id), 400);
    let err = board
        .change_status(OrderId::new(id), OrderStatus::Ready, &mut AssumeYes)
        .await
        .expect_err("rejected");

    assert_eq!(err.to_string(), "Injected failure");
    let order = board.order(OrderId::new(id)).expect("still listed");
    assert_eq!(order.status, OrderState::Live(OrderStatus::Pending));
}

#[tokio::test]
async fn test_declined_cancel_sends_nothing() {
    let backend = FakeBackend::start().await;
    let id = backend.place_order(CUSTOMER, MENU_A, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    let mut no = |_: &str| false;
    let outcome = board
        .change_status(OrderId::new(id), OrderStatus::Cancelled, &mut no)
        .await
        .expect("declined");

    assert_eq!(outcome, Confirmed::Declined);
    assert_eq!(backend.hits(&status_route(id)), 0);
    assert_eq!(backend.order_status(id).as_deref(), Some("pending"));
}

#[tokio::test]
async fn test_cancel_pending_order_marks_alert_handled() {
    let backend = FakeBackend::start().await;
    backend.place_order(CUSTOMER, MENU_A, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Tick).await.expect("seed");

    let id = backend.place_order(CUSTOMER, MENU_B, 2);
    let outcome = board.refresh(RefreshTrigger::Tick).await.expect("refresh");
    assert_eq!(new_ids(&outcome), vec![OrderId::new(id)]);
    assert_eq!(board.notifications().unread_count(), 1);

    let mut prompts = Vec::new();
    let mut accept = |prompt: &str| {
        prompts.push(prompt.to_string());
        true
    };
    let updated = board
        .change_status(OrderId::new(id), OrderStatus::Cancelled, &mut accept)
        .await
        .expect("cancelled")
        .done()
        .expect("confirmed");

    assert_eq!(prompts.len(), 1);
    assert_eq!(updated.status, OrderState::Live(OrderStatus::Cancelled));
    let shown = board.order(OrderId::new(id)).expect("still on board");
    assert_eq!(shown.status, OrderState::Live(OrderStatus::Cancelled));
    assert!(board.status_control(OrderId::new(id)).expect("control").disabled);
    assert_eq!(board.notifications().unread_count(), 0);
    assert_eq!(backend.order_status(id).as_deref(), Some("cancelled"));
}

// ============================================================================
// New-order detection
// ============================================================================

#[tokio::test]
async fn test_first_refresh_reports_nothing_new() {
    let backend = FakeBackend::start().await;
    backend.place_order(CUSTOMER, MENU_A, 1);
    backend.place_order(CUSTOMER, MENU_B, 1);
    let (_, board) = staff_board(&backend).await;

    let outcome = board.refresh(RefreshTrigger::Tick).await.expect("refresh");

    assert!(new_ids(&outcome).is_empty());
    assert_eq!(board.orders().len(), 2);
    assert_eq!(board.notifications().unread_count(), 0);
}

#[tokio::test]
async fn test_only_new_pending_orders_are_reported() {
    let backend = FakeBackend::start().await;
    backend.place_order(CUSTOMER, MENU_A, 1);
    backend.place_order(CUSTOMER, MENU_A, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Tick).await.expect("seed");

    let fresh = backend.place_order(CUSTOMER, MENU_B, 1);
    let outcome = board.refresh(RefreshTrigger::Tick).await.expect("refresh");
    assert_eq!(new_ids(&outcome), vec![OrderId::new(fresh)]);

    let quick = backend.place_order(CUSTOMER, MENU_B, 1);
    let staff = backend.gateway();
    backend.sign_in(&staff, STAFF).await;
    staff
        .update_order_status(OrderId::new(quick), OrderStatus::Ready)
        .await
        .expect("ready elsewhere");
    let outcome = board.refresh(RefreshTrigger::Tick).await.expect("refresh");
    assert!(new_ids(&outcome).is_empty());
}

#[tokio::test]
async fn test_board_only_shows_own_store() {
    let backend = FakeBackend::start().await;
    backend.place_order(CUSTOMER, MENU_A, 1);
    backend.place_order(CUSTOMER, MENU_C, 1);
    let (_, board) = staff_board(&backend).await;

    board.refresh(RefreshTrigger::Manual).await.expect("refresh");

    assert_eq!(board.orders().len(), 1);
    assert_eq!(board.counts().pending, 1);
}

// ============================================================================
// Stale responses
// ============================================================================

#[tokio::test]
async fn test_slow_refresh_does_not_overwrite_newer_one() {
    let backend = FakeBackend::start().await;
    let first = backend.place_order(CUSTOMER, MENU_A, 1);
    let (_, board) = staff_board(&backend).await;

    backend.delay_next(ORDERS, Duration::from_millis(300));
    let slow = tokio::spawn({
        let board = board.clone();
        async move { board.refresh(RefreshTrigger::Tick).await }
    });
    wait_for_hits(&backend, ORDERS, 1).await;

    let second = backend.place_order(CUSTOMER, MENU_B, 1);
    board.refresh(RefreshTrigger::Manual).await.expect("fast refresh");

    let slow = slow.await.expect("task").expect("slow refresh");
    assert_eq!(slow, RefreshOutcome::Discarded);

    let ids: Vec<OrderId> = board.orders().iter().map(|o| o.id).collect();
    assert!(ids.contains(&OrderId::new(first)));
    assert!(ids.contains(&OrderId::new(second)));
}

#[tokio::test]
async fn test_filters_are_sent_with_refresh() {
    let backend = FakeBackend::start().await;
    let pending = backend.place_order(CUSTOMER, MENU_A, 1);
    let done = backend.place_order(CUSTOMER, MENU_B, 1);
    let board = full_board(&backend).await;
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");
    board
        .change_status(OrderId::new(done), OrderStatus::Cancelled, &mut AssumeYes)
        .await
        .expect("cancel");

    board.set_filters(OrderFilters::default());
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");
    let ids: Vec<OrderId> = board.orders().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![OrderId::new(pending)]);

    board.update_filters(|f| {
        f.statuses.clear();
        f.set_search("onigiri");
    });
    board.refresh(RefreshTrigger::Manual).await.expect("refresh");
    let ids: Vec<OrderId> = board.orders().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![OrderId::new(done)]);
}

// ============================================================================
// Customer history
// ============================================================================

#[tokio::test]
async fn test_customer_cancels_own_pending_order() {
    let backend = FakeBackend::start().await;
    let id = backend.place_order(CUSTOMER, MENU_A, 2);
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let orders = CustomerOrders::new(api);

    let history = orders.history().await.expect("history");
    let order = history.iter().find(|o| o.id == OrderId::new(id)).expect("listed");
    assert_eq!(order.menu_name, "Karaage bento");
    assert_eq!(order.store_id, None);

    let cancelled = orders
        .cancel(order, &mut AssumeYes)
        .await
        .expect("cancel")
        .done()
        .expect("confirmed");
    assert_eq!(cancelled.status, OrderState::Live(OrderStatus::Cancelled));

    let err = orders
        .cancel(&cancelled, &mut AssumeYes)
        .await
        .expect_err("already cancelled");
    assert!(matches!(err, StatusChangeError::InvalidTransition(_)));
}
