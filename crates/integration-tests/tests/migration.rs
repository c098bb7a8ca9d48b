//! Guest cart migration at login.
//!
//! Run with: cargo test -p bento-integration-tests --test migration

use std::time::Duration;

use bento_client::auth::CUSTOMER_HOME;
use bento_client::{
    ApiGateway, AuthError, AuthService, CartMigrationService, CartModel, MigrationError, MigrationStatus,
    MigrationStrategy,
};
use bento_core::{MenuId, MenuRef, StoreId};
use bento_integration_tests::{
    CUSTOMER, FakeBackend, MENU_A, MENU_B, MENU_C, PASSWORD, STAFF, STORE_1, STORE_2,
};
use secrecy::SecretString;

/// Fill a guest cart with A x2 and B x1 and return the guest session id.
async fn fill_guest_cart(api: &ApiGateway) -> String {
    let mut cart = CartModel::new(api.clone());
    for (menu, quantity) in [(MENU_A, 2), (MENU_B, 1)] {
        let menu = MenuRef {
            id: MenuId::new(menu),
            store_id: StoreId::new(STORE_1),
        };
        cart.add_item(menu, quantity).await.expect("guest add");
    }
    api.session().guest_session_id().expect("guest session issued")
}

fn auth(api: &ApiGateway, strategy: MigrationStrategy) -> AuthService {
    AuthService::new(
        api.clone(),
        CartMigrationService::new(api.clone(), strategy),
        Duration::from_secs(5),
    )
}

fn sorted(mut lines: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
    lines.sort_unstable();
    lines
}

async fn login_moves_guest_cart(strategy: MigrationStrategy) {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    let guest = fill_guest_cart(&api).await;

    let outcome = auth(&api, strategy)
        .login(CUSTOMER, &SecretString::from(PASSWORD), None)
        .await
        .expect("login");

    match outcome.migration {
        MigrationStatus::Completed(report) => assert_eq!(report.migrated_lines, 2),
        other => panic!("migration did not complete: {other:?}"),
    }
    assert_eq!(outcome.redirect, CUSTOMER_HOME);
    assert_eq!(
        sorted(backend.user_cart_lines(CUSTOMER)),
        vec![(MENU_A, 2), (MENU_B, 1)]
    );
    assert!(backend.guest_cart_lines(&guest).is_empty());
}

#[tokio::test]
async fn test_login_replays_guest_cart_into_user_cart() {
    login_moves_guest_cart(MigrationStrategy::Replay).await;
}

#[tokio::test]
async fn test_login_merges_guest_cart_on_server() {
    login_moves_guest_cart(MigrationStrategy::Server).await;
}

async fn second_run_adds_nothing(strategy: MigrationStrategy) {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    fill_guest_cart(&api).await;
    backend.sign_in(&api, CUSTOMER).await;
    let service = CartMigrationService::new(api.clone(), strategy);

    service.migrate().await.expect("first run");
    let once = sorted(backend.user_cart_lines(CUSTOMER));
    service.migrate().await.expect("second run");

    assert_eq!(sorted(backend.user_cart_lines(CUSTOMER)), once);
    assert_eq!(once, vec![(MENU_A, 2), (MENU_B, 1)]);
}

#[tokio::test]
async fn test_replay_migration_twice_does_not_double_quantities() {
    second_run_adds_nothing(MigrationStrategy::Replay).await;
}

#[tokio::test]
async fn test_server_migration_twice_does_not_double_quantities() {
    second_run_adds_nothing(MigrationStrategy::Server).await;
}

#[tokio::test]
async fn test_replay_retry_after_failed_guest_removal_does_not_double_quantities() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    let guest = fill_guest_cart(&api).await;
    let line_a = api
        .guest_cart()
        .await
        .expect("guest cart")
        .item_for_menu(MenuId::new(MENU_A))
        .map(|item| item.id)
        .expect("line for A");
    backend.sign_in(&api, CUSTOMER).await;
    backend.fail_next(&format!("DELETE /api/guest/cart/item/{line_a}"), 500);
    let service = CartMigrationService::new(api.clone(), MigrationStrategy::Replay);

    let first = service.migrate().await.expect("copying both lines is a success");
    assert_eq!(first.migrated_lines, 2);
    assert_eq!(backend.guest_cart_lines(&guest), vec![(MENU_A, 2)]);

    let second = service.migrate().await.expect("retry");
    assert_eq!(second.migrated_lines, 0);

    assert_eq!(
        sorted(backend.user_cart_lines(CUSTOMER)),
        vec![(MENU_A, 2), (MENU_B, 1)]
    );
    assert!(backend.guest_cart_lines(&guest).is_empty());
    assert!(api.session().migrated_guest_lines().is_empty());
}

async fn other_store_guest_cart_is_not_merged(strategy: MigrationStrategy) {
    let backend = FakeBackend::start().await;
    let other_device = backend.gateway();
    backend.sign_in(&other_device, CUSTOMER).await;
    CartModel::new(other_device)
        .add_item(
            MenuRef {
                id: MenuId::new(MENU_A),
                store_id: StoreId::new(STORE_1),
            },
            1,
        )
        .await
        .expect("user cart holds store 1");

    let api = backend.gateway();
    CartModel::new(api.clone())
        .add_item(
            MenuRef {
                id: MenuId::new(MENU_C),
                store_id: StoreId::new(STORE_2),
            },
            1,
        )
        .await
        .expect("guest cart holds store 2");
    let guest = api.session().guest_session_id().expect("guest session");
    backend.sign_in(&api, CUSTOMER).await;

    let err = CartMigrationService::new(api, strategy)
        .migrate()
        .await
        .expect_err("stores differ");

    assert!(matches!(err, MigrationError::StoreMismatch(_)));
    assert_eq!(backend.user_cart_lines(CUSTOMER), vec![(MENU_A, 1)]);
    assert_eq!(backend.guest_cart_lines(&guest), vec![(MENU_C, 1)]);
    assert_eq!(backend.hits("POST /api/customer/cart/migrate"), 0);
}

#[tokio::test]
async fn test_replay_keeps_other_store_guest_cart_out_of_user_cart() {
    other_store_guest_cart_is_not_merged(MigrationStrategy::Replay).await;
}

#[tokio::test]
async fn test_server_merge_keeps_other_store_guest_cart_out_of_user_cart() {
    other_store_guest_cart_is_not_merged(MigrationStrategy::Server).await;
}

#[tokio::test]
async fn test_concurrent_migrations_do_not_double_quantities() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    fill_guest_cart(&api).await;
    backend.sign_in(&api, CUSTOMER).await;
    let service = CartMigrationService::new(api.clone(), MigrationStrategy::Replay);

    let (first, second) = futures::future::join(service.migrate(), service.migrate()).await;
    first.expect("first run");
    second.expect("second run");

    assert_eq!(
        sorted(backend.user_cart_lines(CUSTOMER)),
        vec![(MENU_A, 2), (MENU_B, 1)]
    );
}

#[tokio::test]
async fn test_migration_without_guest_session_sends_nothing() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    backend.sign_in(&api, CUSTOMER).await;

    let report = CartMigrationService::new(api, MigrationStrategy::Replay)
        .migrate()
        .await
        .expect("empty run");

    assert_eq!(report.migrated_lines, 0);
    assert_eq!(backend.hits("GET /api/guest/cart"), 0);
}

#[tokio::test]
async fn test_failed_migration_does_not_block_login() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();
    fill_guest_cart(&api).await;
    backend.fail_next("POST /api/customer/cart/migrate", 500);

    let outcome = auth(&api, MigrationStrategy::Server)
        .login(CUSTOMER, &SecretString::from(PASSWORD), Some("/cart"))
        .await
        .expect("login still succeeds");

    assert!(matches!(outcome.migration, MigrationStatus::Failed(_)));
    assert_eq!(outcome.redirect, "/cart");
    assert!(api.session().is_authenticated());
}

#[tokio::test]
async fn test_staff_login_skips_migration() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();

    let outcome = auth(&api, MigrationStrategy::Server)
        .login(STAFF, &SecretString::from(PASSWORD), None)
        .await
        .expect("staff login");

    assert!(matches!(outcome.migration, MigrationStatus::Skipped));
    assert_eq!(backend.hits("POST /api/customer/cart/migrate"), 0);
}

#[tokio::test]
async fn test_wrong_password_keeps_session_empty() {
    let backend = FakeBackend::start().await;
    let api = backend.gateway();

    let err = auth(&api, MigrationStrategy::Server)
        .login(CUSTOMER, &SecretString::from("wrong"), None)
        .await
        .expect_err("rejected");

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!api.session().is_authenticated());
}
