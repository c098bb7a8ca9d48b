//! Integration tests for the Bento client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bento-integration-tests
//! ```
//!
//! Every test starts its own [`FakeBackend`]: an in-process axum server on
//! `127.0.0.1:0` that speaks the ordering backend's REST contract from memory.
//! Tests can delay or fail individual routes and count requests per route.
//!
//! # Test Categories
//!
//! - `cart` - Cart totals, quantity floor, single-store rule
//! - `migration` - Guest cart migration at login
//! - `orders` - Status machine, new-order detection, stale refreshes
//! - `polling` - Poller lifecycle and session expiry

mod backend;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bento_client::notify::NullNotifier;
use bento_client::{ApiGateway, NotificationManager, SessionStore};
use secrecy::SecretString;
use tokio::task::JoinHandle;
use url::Url;

pub use backend::{MENU_A, MENU_B, MENU_C, MENU_SOLD_OUT, PASSWORD, STORE_1, STORE_2};
use backend::{Db, Shared};

/// Customer account.
pub const CUSTOMER: &str = "customer1";
/// Staff account of store 1.
pub const STAFF: &str = "store1";

/// In-memory ordering backend.
pub struct FakeBackend {
    addr: SocketAddr,
    db: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind on an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let db: Shared = Arc::new(Mutex::new(Db::seeded()));
        let app = backend::router(db.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to read local address");
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake backend stopped");
            }
        });
        Self { addr, db, server }
    }

    fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// API root, ending in `/api/`.
    ///
    /// # Panics
    ///
    /// Panics if the address does not form a URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("valid base url")
    }

    /// A gateway with its own empty in-memory session.
    #[must_use]
    pub fn gateway(&self) -> ApiGateway {
        self.gateway_with(SessionStore::in_memory())
    }

    #[must_use]
    pub fn gateway_with(&self, session: SessionStore) -> ApiGateway {
        ApiGateway::with_client(reqwest::Client::new(), self.base_url(), session)
    }

    /// Sign `username` in on `api` without going through cart migration.
    ///
    /// # Panics
    ///
    /// Panics if the backend rejects the login.
    #[allow(clippy::expect_used)]
    pub async fn sign_in(&self, api: &ApiGateway, username: &str) {
        let response = api
            .login(username, &SecretString::from(PASSWORD))
            .await
            .expect("login accepted");
        api.session()
            .sign_in(&response.token, &response.user)
            .expect("session stored");
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Hold the response of the next request to `route` for `delay`.
    ///
    /// The handler runs first, so the held response reflects the data at the
    /// time the request arrived. `route` is `"METHOD /api/path"`.
    pub fn delay_next(&self, route: &str, delay: Duration) {
        self.db().delays.entry(route.to_string()).or_default().push_back(delay);
    }

    /// Answer the next request to `route` with `status` and a `detail` body.
    pub fn fail_next(&self, route: &str, status: u16) {
        self.fail_after(route, 0, status);
    }

    /// Let `skip` requests to `route` through, then fail the next one.
    pub fn fail_after(&self, route: &str, skip: usize, status: u16) {
        let mut db = self.db();
        let queue = db.failures.entry(route.to_string()).or_default();
        queue.extend(std::iter::repeat_n(None, skip));
        queue.push_back(Some(status));
    }

    /// Requests seen for `route`.
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        self.db().hits.get(route).copied().unwrap_or(0)
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.db().tokens.clear();
    }

    /// Place an order directly, as if a customer had checked out.
    pub fn place_order(&self, customer: &str, menu_id: i64, quantity: i64) -> i64 {
        self.db().insert_order(customer, menu_id, quantity)
    }

    /// Current status of an order.
    #[must_use]
    pub fn order_status(&self, order_id: i64) -> Option<String> {
        self.db()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| o.status.clone())
    }

    /// `(menu_id, quantity)` lines of a guest cart.
    #[must_use]
    pub fn guest_cart_lines(&self, session_id: &str) -> Vec<(i64, i64)> {
        self.db()
            .guests
            .get(session_id)
            .map(|g| g.items.iter().map(|l| (l.menu_id, l.quantity)).collect())
            .unwrap_or_default()
    }

    /// `(menu_id, quantity)` lines of a user's cart.
    #[must_use]
    pub fn user_cart_lines(&self, username: &str) -> Vec<(i64, i64)> {
        let db = self.db();
        db.user_id(username)
            .and_then(|id| db.user_carts.get(&id))
            .map(|lines| lines.iter().map(|l| (l.menu_id, l.quantity)).collect())
            .unwrap_or_default()
    }
}

/// Notification manager that never shows anything but still counts unread.
#[must_use]
pub fn silent_notifications(session: SessionStore) -> NotificationManager {
    NotificationManager::new(Box::new(NullNotifier), session, "Orders")
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
