//! Cart behaviour against the fake backend.
//!
//! Run with: cargo test -p bento-integration-tests --test cart

use bento_client::{AssumeYes, CartError, CartModel, Confirmed, SessionStore};
use bento_core::{MenuId, MenuRef, StoreId, Yen};
use bento_integration_tests::{CUSTOMER, FakeBackend, MENU_A, MENU_B, MENU_C, STORE_1, STORE_2};

fn menu(id: i64, store: i64) -> MenuRef {
    MenuRef {
        id: MenuId::new(id),
        store_id: StoreId::new(store),
    }
}

// ============================================================================
// Totals
// ============================================================================

#[tokio::test]
async fn test_user_cart_total_follows_lines() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);

    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("add A");
    cart.add_item(menu(MENU_B, STORE_1), 1).await.expect("add B");
    assert_eq!(cart.total(), Yen::new(1300));
    assert_eq!(cart.item_count(), 3);

    let single = cart
        .snapshot()
        .item_for_menu(MenuId::new(MENU_B))
        .map(|i| i.id)
        .expect("line for B");
    let removed = cart.remove_item(single, &mut AssumeYes).await.expect("remove B");
    assert!(matches!(removed, Confirmed::Done(_)));
    assert_eq!(cart.total(), Yen::new(1000));
    assert_eq!(backend.user_cart_lines(CUSTOMER), vec![(MENU_A, 2)]);
}

#[tokio::test]
async fn test_guest_cart_total_follows_lines() {
    let backend = FakeBackend::start().await;
    let mut cart = CartModel::new(backend.gateway());

    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("add A");
    cart.add_item(menu(MENU_B, STORE_1), 1).await.expect("add B");

    assert_eq!(cart.total(), Yen::new(1300));
    assert_eq!(cart.snapshot().store_id(), Some(StoreId::new(STORE_1)));
}

#[tokio::test]
async fn test_adding_same_menu_merges_quantity() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);

    cart.add_item(menu(MENU_A, STORE_1), 1).await.expect("first add");
    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("second add");

    assert_eq!(cart.snapshot().items().len(), 1);
    assert_eq!(cart.item_count(), 3);
}

// ============================================================================
// Quantity floor
// ============================================================================

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);

    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("add A");
    let line = cart.snapshot().items().first().map(|i| i.id).expect("one line");

    cart.update_quantity(line, 0).await.expect("zero removes");

    assert!(cart.snapshot().is_empty());
    assert!(cart.snapshot().items().iter().all(|i| i.quantity > 0));
    assert!(backend.user_cart_lines(CUSTOMER).is_empty());
}

#[tokio::test]
async fn test_negative_quantity_removes_guest_line() {
    let backend = FakeBackend::start().await;
    let mut cart = CartModel::new(backend.gateway());

    cart.add_item(menu(MENU_A, STORE_1), 1).await.expect("add A");
    cart.add_item(menu(MENU_B, STORE_1), 1).await.expect("add B");
    let line = cart
        .snapshot()
        .item_for_menu(MenuId::new(MENU_A))
        .map(|i| i.id)
        .expect("line for A");

    cart.update_quantity(line, -3).await.expect("negative removes");

    assert_eq!(cart.snapshot().items().len(), 1);
    assert!(cart.snapshot().items().iter().all(|i| i.quantity > 0));
}

#[tokio::test]
async fn test_quantity_above_cap_is_rejected_locally() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);
    cart.add_item(menu(MENU_A, STORE_1), 1).await.expect("add A");
    let line = cart.snapshot().items().first().map(|i| i.id).expect("one line");

    let err = cart.update_quantity(line, 100).await.expect_err("over the cap");

    assert!(matches!(err, CartError::InvalidQuantity(100)));
    assert_eq!(backend.hits(&format!("PUT /api/customer/cart/{line}")), 0);
    assert_eq!(cart.item_count(), 1);
}

// ============================================================================
// Single-store rule and errors
// ============================================================================

#[tokio::test]
async fn test_other_store_item_is_rejected_before_request() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);
    cart.add_item(menu(MENU_A, STORE_1), 1).await.expect("add A");
    let adds_before = backend.hits("POST /api/customer/cart/add");

    let err = cart
        .add_item(menu(MENU_C, STORE_2), 1)
        .await
        .expect_err("different store");

    assert!(matches!(err, CartError::StoreMismatch(_)));
    assert_eq!(backend.hits("POST /api/customer/cart/add"), adds_before);
    assert_eq!(cart.total(), Yen::new(500));
}

#[tokio::test]
async fn test_user_cart_store_comes_from_its_items_not_the_selected_store() {
    let backend = FakeBackend::start().await;
    let first = backend.gateway();
    backend.sign_in(&first, CUSTOMER).await;
    CartModel::new(first)
        .add_item(menu(MENU_A, STORE_1), 1)
        .await
        .expect("add A on the first device");

    let session = SessionStore::in_memory();
    session.set_selected_store(StoreId::new(STORE_2)).expect("write");
    let second = backend.gateway_with(session);
    backend.sign_in(&second, CUSTOMER).await;
    let mut cart = CartModel::new(second);

    let loaded = cart.load().await.expect("load");
    assert_eq!(loaded.store_id(), Some(StoreId::new(STORE_1)));
    assert_eq!(loaded.items().len(), 1);

    let adds_before = backend.hits("POST /api/customer/cart/add");
    let err = cart
        .add_item(menu(MENU_C, STORE_2), 1)
        .await
        .expect_err("store 2 item into a store 1 cart");
    assert!(matches!(err, CartError::StoreMismatch(_)));
    assert_eq!(backend.hits("POST /api/customer/cart/add"), adds_before);

    cart.add_item(menu(MENU_B, STORE_1), 1).await.expect("same store");
    let mut lines = backend.user_cart_lines(CUSTOMER);
    lines.sort_unstable();
    assert_eq!(lines, vec![(MENU_A, 1), (MENU_B, 1)]);
}

#[tokio::test]
async fn test_user_cart_with_unknown_store_refuses_adds() {
    let backend = FakeBackend::start().await;
    let first = backend.gateway();
    backend.sign_in(&first, CUSTOMER).await;
    CartModel::new(first)
        .add_item(menu(MENU_A, STORE_1), 1)
        .await
        .expect("add A on the first device");

    let second = backend.gateway();
    backend.sign_in(&second, CUSTOMER).await;
    let mut cart = CartModel::new(second);
    backend.fail_next(&format!("GET /api/customer/menus/{MENU_A}"), 404);

    let loaded = cart.load().await.expect("load");
    assert_eq!(loaded.store_id(), None);

    let err = cart
        .add_item(menu(MENU_B, STORE_1), 1)
        .await
        .expect_err("store unknown");
    assert!(matches!(err, CartError::UnknownStore));
    assert_eq!(backend.user_cart_lines(CUSTOMER), vec![(MENU_A, 1)]);
}

#[tokio::test]
async fn test_backend_rejection_keeps_cart_unchanged() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);
    cart.add_item(menu(MENU_A, STORE_1), 1).await.expect("add A");

    backend.fail_next("POST /api/customer/cart/add", 400);
    let err = cart.add_item(menu(MENU_B, STORE_1), 1).await.expect_err("rejected");

    assert!(matches!(err, CartError::ConflictFailure(_)));
    assert_eq!(err.user_message(), "Injected failure");
    assert_eq!(cart.item_count(), 1);
}

#[tokio::test]
async fn test_server_error_is_a_network_failure() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;
    let mut cart = CartModel::new(api);
    cart.load().await.expect("empty cart loads");

    backend.fail_next("POST /api/customer/cart/add", 503);
    let err = cart.add_item(menu(MENU_A, STORE_1), 1).await.expect_err("server down");

    assert!(matches!(err, CartError::NetworkFailure(_)));
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn test_clear_guest_cart_removes_every_line() {
    let backend = FakeBackend::start().await;
    let mut cart = CartModel::new(backend.gateway());
    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("add A");
    cart.add_item(menu(MENU_B, STORE_1), 1).await.expect("add B");

    let mut declined = |_: &str| false;
    let kept = cart.clear(&mut declined).await.expect("declined clear");
    assert!(kept.is_declined());
    assert_eq!(cart.item_count(), 3);

    cart.clear(&mut AssumeYes).await.expect("clear");
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("session.json");
    let backend = FakeBackend::start().await;

    let mut cart = CartModel::new(backend.gateway_with(SessionStore::open(path.clone())));
    cart.add_item(menu(MENU_A, STORE_1), 2).await.expect("add A");
    drop(cart);

    let restored = CartModel::new(backend.gateway_with(SessionStore::open(path.clone())));
    assert_eq!(restored.item_count(), 2);
    assert_eq!(restored.total(), Yen::new(1000));

    let mut reloaded = restored;
    reloaded.load().await.expect("reload with stored guest session");
    assert_eq!(reloaded.item_count(), 2);
}
