//! Bento Client - ordering services over the Bento REST backend.
//!
//! # Architecture
//!
//! - [`SessionStore`] persists identity and preferences; every service gets a clone
//! - [`ApiGateway`] is the only HTTP boundary and normalizes every response
//! - [`CartModel`] applies cart changes only after the backend confirms them
//! - [`AuthService`] signs in and migrates the guest cart with [`CartMigrationService`]
//! - [`OrderBoard`] and [`OrderPoller`] keep the store's order list current
//! - [`NotificationManager`] alerts staff about new orders
//!
//! # Example
//!
//! ```rust,ignore
//! use bento_client::{ApiGateway, ClientConfig, OrderBoard, OrderPoller, SessionStore};
//!
//! let config = ClientConfig::from_env()?;
//! let api = ApiGateway::new(&config, SessionStore::open(config.session_file()))?;
//! let mut poller = OrderPoller::new(OrderBoard::new(api, notifications), config.search_debounce);
//! let mut events = poller.start(config.poll_interval);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod board;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod confirm;
pub mod customer_orders;
pub mod migration;
pub mod notify;
pub mod poller;
pub mod session;

pub use api::{ApiError, ApiGateway};
pub use auth::{AuthError, AuthService, LoginOutcome, MigrationStatus};
pub use board::{
    NewOrderDetector, OrderBoard, RefreshError, RefreshOutcome, RefreshTrigger, StatusChangeError,
};
pub use cart::{CartError, CartModel};
pub use checkout::{CheckoutError, Receipt, checkout};
pub use config::{ClientConfig, ConfigError, MigrationStrategy};
pub use confirm::{AssumeYes, Confirm, Confirmed};
pub use customer_orders::CustomerOrders;
pub use migration::{CartMigrationService, MigrationError, MigrationReport};
pub use notify::{NotificationManager, Notifier, Permission};
pub use poller::{Debouncer, OrderPoller, PollEvent, Visibility};
pub use session::{SessionError, SessionStore};
